//! Collection names and entry keys.
//!
//! Collection names double as durable-store keys and must be non-blank.
//! Entry keys are either strings or numbers. Both forms are kept as given;
//! a number key is addressed by its JSON rendering, so `7` and `"7"` refer
//! to the same slot of the persisted JSON object.

use std::borrow::Cow;
use std::fmt;

use serde_json::{Number, Value};

use crate::error::{CoreError, CoreResult};

/// Validate a collection name, returning it unchanged if usable.
///
/// # Examples
///
/// ```
/// use docket_core::validate_collection_name;
///
/// assert!(validate_collection_name("orders").is_ok());
/// assert!(validate_collection_name("   ").is_err());
/// ```
pub fn validate_collection_name(name: &str) -> CoreResult<&str> {
    if name.trim().is_empty() {
        return Err(CoreError::InvalidName {
            name: name.to_string(),
            reason: "collection name must not be empty".into(),
        });
    }
    Ok(name)
}

/// Key of a single entry within a collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Text(String),
    Number(Number),
}

impl EntryKey {
    /// Generate a fresh random key for [`crate::Collection::add`].
    pub fn generate() -> Self {
        EntryKey::Text(uuid::Uuid::new_v4().to_string())
    }

    /// The form under which the entry is stored in the collection mapping.
    pub fn as_storage_key(&self) -> Cow<'_, str> {
        match self {
            EntryKey::Text(s) => Cow::Borrowed(s),
            EntryKey::Number(n) => Cow::Owned(n.to_string()),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_storage_key())
    }
}

impl From<String> for EntryKey {
    fn from(s: String) -> Self {
        EntryKey::Text(s)
    }
}

impl From<&str> for EntryKey {
    fn from(s: &str) -> Self {
        EntryKey::Text(s.to_string())
    }
}

impl From<i64> for EntryKey {
    fn from(n: i64) -> Self {
        EntryKey::Number(n.into())
    }
}

impl From<u64> for EntryKey {
    fn from(n: u64) -> Self {
        EntryKey::Number(n.into())
    }
}

impl TryFrom<&Value> for EntryKey {
    type Error = CoreError;

    fn try_from(value: &Value) -> CoreResult<Self> {
        match value {
            Value::String(s) => Ok(EntryKey::Text(s.clone())),
            Value::Number(n) => Ok(EntryKey::Number(n.clone())),
            other => Err(CoreError::InvalidKey(format!(
                "expected a string or a number, got {}",
                json_type_name(other)
            ))),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_names_rejected() {
        for name in ["", " ", "\t\n"] {
            let err = validate_collection_name(name).unwrap_err();
            assert!(matches!(err, CoreError::InvalidName { .. }));
        }
        assert_eq!(validate_collection_name("orders").unwrap(), "orders");
    }

    #[test]
    fn keys_from_json() {
        assert_eq!(EntryKey::try_from(&json!("a")).unwrap(), EntryKey::from("a"));
        assert_eq!(EntryKey::try_from(&json!(7)).unwrap(), EntryKey::from(7i64));
        for bad in [json!(null), json!(true), json!([1]), json!({"a": 1})] {
            assert!(matches!(EntryKey::try_from(&bad), Err(CoreError::InvalidKey(_))));
        }
    }

    #[test]
    fn number_and_text_share_storage_form() {
        assert_eq!(EntryKey::from(7i64).as_storage_key(), "7");
        assert_eq!(EntryKey::from("7").as_storage_key(), "7");
        assert_ne!(EntryKey::from(7i64), EntryKey::from("7"));
    }

    #[test]
    fn generated_keys_are_distinct_uuids() {
        let a = EntryKey::generate();
        let b = EntryKey::generate();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a.to_string()).is_ok());
    }
}
