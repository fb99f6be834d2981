//! Shell configuration read from the environment.

use crate::cache::CachePolicy;
use crate::core::Env;
use crate::error::{Error, Result};
use crate::tee::{Decoration, Encoding, ErrorPolicy, SinkKind, TeeConfig};

/// Encoding of captured and text-sink output.
pub const ENCODING: &str = "INCSH_ENCODING";
/// Policy for undecodable bytes.
pub const ENCODING_ERRORS: &str = "INCSH_ENCODING_ERRORS";
/// Written before each chunk of stdout.
pub const STDOUT_PREFIX: &str = "INCSH_STDOUT_PREFIX";
/// Written after each chunk of stdout.
pub const STDOUT_POSTFIX: &str = "INCSH_STDOUT_POSTFIX";
/// Written before each chunk of stderr.
pub const STDERR_PREFIX: &str = "INCSH_STDERR_PREFIX";
/// Written after each chunk of stderr.
pub const STDERR_POSTFIX: &str = "INCSH_STDERR_POSTFIX";
/// Cache interactive input.
pub const CACHE_EVERYTHING: &str = "INCSH_CACHE_EVERYTHING";
/// Cache script files.
pub const CACHE_SCRIPTS: &str = "INCSH_CACHE_SCRIPTS";

/// Settings the shell core reads from its environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellConfig {
    /// Output encoding.
    pub encoding: Encoding,
    /// Output decode-error policy.
    pub errors: ErrorPolicy,
    /// Stdout decoration.
    pub stdout: Decoration,
    /// Stderr decoration.
    pub stderr: Decoration,
    /// Which compile modes use the code cache.
    pub cache: CachePolicy,
}

impl ShellConfig {
    /// Reads the configuration from `env`, falling back to defaults for
    /// unset keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown encoding or error policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use incsh::config::ShellConfig;
    /// use incsh::core::Env;
    ///
    /// let env: Env = [("INCSH_ENCODING", "latin-1")].into_iter().collect();
    /// let config = ShellConfig::from_env(&env).unwrap();
    /// assert_eq!(config.encoding.name(), "latin-1");
    /// assert!(config.cache.cache_scripts);
    /// ```
    pub fn from_env(env: &Env) -> Result<Self> {
        let encoding = env
            .get_or(ENCODING, Encoding::default().name())
            .parse::<Encoding>()
            .map_err(|e| Error::Config {
                message: format!("{ENCODING}: {e}"),
            })?;
        let errors = env
            .get_or(ENCODING_ERRORS, ErrorPolicy::default().name())
            .parse::<ErrorPolicy>()
            .map_err(|e| Error::Config {
                message: format!("{ENCODING_ERRORS}: {e}"),
            })?;

        let defaults = CachePolicy::default();
        Ok(Self {
            encoding,
            errors,
            stdout: Decoration::new(env.get_or(STDOUT_PREFIX, ""), env.get_or(STDOUT_POSTFIX, "")),
            stderr: Decoration::new(env.get_or(STDERR_PREFIX, ""), env.get_or(STDERR_POSTFIX, "")),
            cache: CachePolicy {
                cache_everything: env.get_bool(CACHE_EVERYTHING, defaults.cache_everything),
                cache_scripts: env.get_bool(CACHE_SCRIPTS, defaults.cache_scripts),
            },
        })
    }

    /// Tee settings derived from this configuration.
    #[must_use]
    pub fn tee_config(&self) -> TeeConfig {
        TeeConfig {
            encoding: self.encoding,
            errors: self.errors,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }

    /// Sink kind for the process's real streams.
    #[must_use]
    pub const fn sink_kind(&self) -> SinkKind {
        SinkKind::Text {
            encoding: self.encoding,
            errors: self.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let config = ShellConfig::from_env(&Env::new()).unwrap();
        assert_eq!(config.encoding, Encoding::Utf8);
        assert_eq!(config.errors, ErrorPolicy::Replace);
        assert!(config.stdout.is_empty());
        assert!(!config.cache.cache_everything);
        assert!(config.cache.cache_scripts);
    }

    #[test]
    fn test_decorations_and_cache_flags() {
        let env: Env = [
            (STDERR_PREFIX, "\x1b[31m"),
            (STDERR_POSTFIX, "\x1b[0m"),
            (CACHE_EVERYTHING, "1"),
            (CACHE_SCRIPTS, "off"),
        ]
        .into_iter()
        .collect();
        let config = ShellConfig::from_env(&env).unwrap();
        assert_eq!(config.tee_config().stderr, Decoration::new("\x1b[31m", "\x1b[0m"));
        assert!(config.cache.cache_everything);
        assert!(!config.cache.cache_scripts);
    }

    #[test_case(ENCODING, "klingon" ; "bad encoding")]
    #[test_case(ENCODING_ERRORS, "shrug" ; "bad policy")]
    fn test_rejects_unknown_names(key: &str, value: &str) {
        let env: Env = [(key, value)].into_iter().collect();
        let err = ShellConfig::from_env(&env).unwrap_err();
        assert!(matches!(err, Error::Config { ref message } if message.starts_with(key)));
    }

    #[test]
    fn test_sink_kind_follows_encoding() {
        let env: Env = [(ENCODING, "ascii"), (ENCODING_ERRORS, "strict")]
            .into_iter()
            .collect();
        let config = ShellConfig::from_env(&env).unwrap();
        assert_eq!(
            config.sink_kind(),
            SinkKind::Text {
                encoding: Encoding::Ascii,
                errors: ErrorPolicy::Strict,
            }
        );
    }
}
