//! Environment store.
//!
//! String key/value pairs backing configuration lookups and working
//! directory tracking (`PWD`, `OLDPWD`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key holding the tracked working directory.
pub const PWD: &str = "PWD";

/// Key holding the previously tracked working directory.
pub const OLDPWD: &str = "OLDPWD";

/// Key holding the return code of the last executed unit.
pub const LAST_RETURN_CODE: &str = "LAST_RETURN_CODE";

/// Shell environment.
///
/// # Examples
///
/// ```
/// use incsh::core::Env;
///
/// let mut env = Env::new();
/// env.set("INCSH_ENCODING", "ascii");
/// assert_eq!(env.get("INCSH_ENCODING"), Some("ascii"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
    vars: BTreeMap<String, String>,
}

impl Env {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the process environment.
    ///
    /// Variables whose name or value is not valid Unicode are skipped.
    #[must_use]
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Gets a variable.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Gets a variable or a default.
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Interprets a variable as a boolean.
    ///
    /// Unset or empty values yield `default`; `0`, `false`, `no` and `off`
    /// (any case) are false; anything else is true.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(str::trim) {
            None | Some("") => default,
            Some(v) => !matches!(
                v.to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            ),
        }
    }

    /// Sets a variable, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars.insert(key.into(), value.into())
    }

    /// Removes a variable, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    /// Returns `true` if the variable is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns `true` if no variables are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Env {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_set_get_remove() {
        let mut env = Env::new();
        assert!(env.is_empty());
        assert_eq!(env.set("A", "1"), None);
        assert_eq!(env.set("A", "2"), Some("1".to_string()));
        assert_eq!(env.get("A"), Some("2"));
        assert!(env.contains("A"));
        assert_eq!(env.remove("A"), Some("2".to_string()));
        assert_eq!(env.get("A"), None);
    }

    #[test]
    fn test_get_or() {
        let env: Env = [("X", "set")].into_iter().collect();
        assert_eq!(env.get_or("X", "default"), "set");
        assert_eq!(env.get_or("Y", "default"), "default");
    }

    #[test_case("1", true ; "one")]
    #[test_case("yes", true ; "yes")]
    #[test_case("True", true ; "mixed case true")]
    #[test_case("0", false ; "zero")]
    #[test_case("OFF", false ; "upper off")]
    #[test_case("no", false ; "no")]
    #[test_case("", true ; "empty uses default")]
    fn test_get_bool(value: &str, expected: bool) {
        let env: Env = [("FLAG", value)].into_iter().collect();
        assert_eq!(env.get_bool("FLAG", true), expected);
    }

    #[test]
    fn test_get_bool_unset_uses_default() {
        let env = Env::new();
        assert!(!env.get_bool("MISSING", false));
        assert!(env.get_bool("MISSING", true));
    }

    #[test]
    fn test_from_process_matches_std() {
        let env = Env::from_process();
        if let Ok(path) = std::env::var("PATH") {
            assert_eq!(env.get("PATH"), Some(path.as_str()));
        }
    }
}
