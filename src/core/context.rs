//! Shell execution context.
//!
//! The live variable namespace that compiled units run against. The caller
//! owns it and lends it to every execution, so state persists from one
//! statement to the next.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Variable namespace shared by all statements of a session.
///
/// # Examples
///
/// ```
/// use incsh::core::Context;
///
/// let mut ctx = Context::new();
/// ctx.set_variable("greeting".to_string(), "hello".into());
/// assert!(ctx.get_variable("greeting").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Variables defined by executed statements.
    pub variables: HashMap<String, Value>,

    /// Context metadata.
    pub metadata: ContextMetadata,
}

/// Metadata associated with a context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMetadata {
    /// Unix timestamp when context was created.
    pub created_at: i64,

    /// Unix timestamp when context was last modified.
    pub updated_at: i64,
}

/// Variable value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// String value.
    String(String),

    /// Integer value (i64).
    Integer(i64),

    /// Floating point value (f64).
    Float(f64),

    /// Boolean value.
    Boolean(bool),

    /// List of values.
    List(Vec<Self>),

    /// Null/None value.
    Null,
}

impl Context {
    /// Creates a new empty context with current timestamp.
    #[must_use]
    pub fn new() -> Self {
        let now = current_timestamp();
        Self {
            variables: HashMap::new(),
            metadata: ContextMetadata {
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Sets a variable.
    pub fn set_variable(&mut self, key: String, value: Value) {
        self.variables.insert(key, value);
        self.touch();
    }

    /// Gets a variable by name.
    #[must_use]
    pub fn get_variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Removes a variable, returning its value if it existed.
    pub fn remove_variable(&mut self, key: &str) -> Option<Value> {
        let result = self.variables.remove(key);
        if result.is_some() {
            self.touch();
        }
        result
    }

    /// Removes every variable, preserving metadata.
    pub fn reset(&mut self) {
        self.variables.clear();
        self.touch();
    }

    /// Returns the number of variables in the context.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    fn touch(&mut self) {
        self.metadata.updated_at = current_timestamp();
    }
}

impl fmt::Display for Value {
    /// Renders the value the way it appears when expanded into a command
    /// line: lists are space-separated and null is empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Null => Ok(()),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

#[allow(clippy::use_self)]
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

#[allow(clippy::use_self)]
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

/// Returns the current Unix timestamp in seconds.
#[allow(clippy::cast_possible_wrap)]
fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_new() {
        let ctx = Context::new();
        assert!(ctx.variables.is_empty());
        assert!(ctx.metadata.created_at > 0);
    }

    #[test]
    fn test_variable_operations() {
        let mut ctx = Context::new();

        ctx.set_variable("key1".to_string(), "value1".into());
        ctx.set_variable("key2".to_string(), 42i64.into());

        assert_eq!(
            ctx.get_variable("key1"),
            Some(&Value::String("value1".to_string()))
        );
        assert_eq!(ctx.get_variable("key2"), Some(&Value::Integer(42)));
        assert_eq!(ctx.get_variable("nonexistent"), None);
        assert_eq!(ctx.variable_count(), 2);

        let removed = ctx.remove_variable("key1");
        assert!(removed.is_some());
        assert!(ctx.remove_variable("key1").is_none());
        assert_eq!(ctx.variable_count(), 1);
    }

    #[test]
    fn test_context_reset() {
        let mut ctx = Context::new();
        ctx.set_variable("key".to_string(), "value".into());
        ctx.reset();
        assert!(ctx.variables.is_empty());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::from("abc").to_string(), "abc");
        assert_eq!(Value::from(7i64).to_string(), "7");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::from(vec![1i64, 2, 3]).to_string(), "1 2 3");
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn test_value_conversions() {
        let f: Value = std::f64::consts::PI.into();
        assert!(matches!(f, Value::Float(_)));

        let none: Value = Option::<String>::None.into();
        assert!(matches!(none, Value::Null));

        let some: Value = Some(42i32).into();
        assert!(matches!(some, Value::Integer(42)));
    }

    #[test]
    fn test_context_serialization() {
        let mut ctx = Context::new();
        ctx.set_variable("key".to_string(), "value".into());

        let json = serde_json::to_string(&ctx).unwrap();
        let deserialized: Context = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.get_variable("key"), ctx.get_variable("key"));
    }
}
