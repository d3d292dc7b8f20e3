//! Structured override documents layered on top of URI-derived options.
//!
//! ```rust
//! use tessera_core::{ConnectOptions, OptionsOverride};
//! use serde_json::json;
//!
//! let base = ConnectOptions::builder().host("a").port(1521).user("scott").build();
//! let overrides = OptionsOverride::from_json(&json!({ "host": "b", "user": null })).unwrap();
//! let merged = base.apply_overrides(&overrides);
//!
//! assert_eq!(merged.host(), "b");
//! assert_eq!(merged.port(), 1521);
//! assert_eq!(merged.user(), None);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{DriverError, DriverResult};

/// One field of an override document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// The key was not present; keep the base value.
    #[default]
    Absent,
    /// The key was explicitly `null`; reset to unset.
    Null,
    /// The key carried a value; replace the base value.
    Value(T),
}

impl<T> Patch<T> {
    /// Whether the key was present in the document at all.
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Only reached for keys that are present; missing keys take `Default`.
        Option::<T>::deserialize(deserializer).map(|value| match value {
            Some(value) => Self::Value(value),
            None => Self::Null,
        })
    }
}

/// A scalar property value; numbers and booleans are kept in string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyValue(pub String);

impl<'de> Deserialize<'de> for PropertyValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Scalar {
            String(String),
            Bool(bool),
            Int(i64),
            Float(f64),
        }

        Ok(match Scalar::deserialize(deserializer)? {
            Scalar::String(s) => Self(s),
            Scalar::Bool(b) => Self(b.to_string()),
            Scalar::Int(i) => Self(i.to_string()),
            Scalar::Float(f) => Self(f.to_string()),
        })
    }
}

/// A parsed override document.
///
/// Keys use the camelCase JSON form. Unknown keys are rejected rather than
/// silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OptionsOverride {
    /// Host.
    #[serde(default)]
    pub host: Patch<String>,
    /// Port.
    #[serde(default)]
    pub port: Patch<u16>,
    /// Database or service name.
    #[serde(default)]
    pub database: Patch<String>,
    /// User.
    #[serde(default)]
    pub user: Patch<String>,
    /// Password.
    #[serde(default)]
    pub password: Patch<String>,
    /// TLS flag.
    #[serde(default)]
    pub ssl: Patch<bool>,
    /// Connect timeout in seconds.
    #[serde(default, alias = "connect_timeout")]
    pub connect_timeout: Patch<u64>,
    /// Extension properties; a `null` entry removes that key.
    #[serde(default)]
    pub properties: Patch<BTreeMap<String, Option<PropertyValue>>>,
}

impl OptionsOverride {
    /// Parse an override document.
    pub fn from_json(value: &Value) -> DriverResult<Self> {
        if !value.is_object() {
            return Err(DriverError::invalid_override(format!(
                "expected a JSON object, got {}",
                json_type(value)
            )));
        }
        Self::deserialize(value).map_err(|e| DriverError::invalid_override(e.to_string()))
    }

    /// Extension property changes as `key -> Some(value)` or `key -> None`.
    pub fn property_changes(&self) -> Vec<(&str, Option<&str>)> {
        match &self.properties {
            Patch::Value(props) => props
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_ref().map(|v| v.0.as_str())))
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectOptions;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn base() -> ConnectOptions {
        ConnectOptions::for_driver("oracle")
            .host("uri-host")
            .port(1521)
            .database("uri-db")
            .user("uri-user")
            .password("uri-pass")
            .connect_timeout(Duration::from_secs(5))
            .property("tnsAdmin", "/uri/tns")
            .property("keep", "yes")
            .build()
    }

    #[test]
    fn test_absent_keys_keep_base() {
        let overrides = OptionsOverride::from_json(&json!({})).unwrap();
        assert_eq!(base().apply_overrides(&overrides), base());
    }

    #[test]
    fn test_present_keys_replace_each_field() {
        let overrides = OptionsOverride::from_json(&json!({
            "host": "o-host",
            "port": 1600,
            "database": "o-db",
            "user": "o-user",
            "password": "o-pass",
            "ssl": true,
            "connectTimeout": 9,
        }))
        .unwrap();
        let merged = base().apply_overrides(&overrides);

        assert_eq!(merged.host(), "o-host");
        assert_eq!(merged.port(), 1600);
        assert_eq!(merged.database(), Some("o-db"));
        assert_eq!(merged.user(), Some("o-user"));
        assert_eq!(merged.password().unwrap().expose(), "o-pass");
        assert!(merged.ssl());
        assert_eq!(merged.connect_timeout(), Duration::from_secs(9));
        // untouched
        assert_eq!(merged.driver(), Some("oracle"));
        assert_eq!(merged.property("keep"), Some("yes"));
    }

    #[test]
    fn test_null_clears_field() {
        let overrides = OptionsOverride::from_json(&json!({
            "database": null,
            "port": null,
            "password": null,
            "connectTimeout": null,
        }))
        .unwrap();
        let merged = base().apply_overrides(&overrides);

        assert_eq!(merged.database(), None);
        assert_eq!(merged.port(), 0);
        assert!(merged.password().is_none());
        assert_eq!(merged.connect_timeout(), Duration::ZERO);
        assert_eq!(merged.user(), Some("uri-user"));
    }

    #[test]
    fn test_properties_merge_per_key() {
        let overrides = OptionsOverride::from_json(&json!({
            "properties": {
                "tnsAdmin": "/override/tns",
                "keep": null,
                "implicitStatementCacheSize": 50,
            }
        }))
        .unwrap();
        let merged = base().apply_overrides(&overrides);

        assert_eq!(merged.property("tnsAdmin"), Some("/override/tns"));
        assert_eq!(merged.property("keep"), None);
        assert_eq!(merged.property("implicitStatementCacheSize"), Some("50"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = OptionsOverride::from_json(&json!({ "hots": "typo" })).unwrap_err();
        assert!(matches!(err, DriverError::InvalidOverride(_)));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let err = OptionsOverride::from_json(&json!({ "port": "abc" })).unwrap_err();
        assert!(matches!(err, DriverError::InvalidOverride(_)));

        let err = OptionsOverride::from_json(&json!({ "port": 70000 })).unwrap_err();
        assert!(matches!(err, DriverError::InvalidOverride(_)));
    }

    #[test]
    fn test_non_object_document_is_rejected() {
        let err = OptionsOverride::from_json(&json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_patch_presence() {
        let overrides = OptionsOverride::from_json(&json!({ "user": null })).unwrap();
        assert!(overrides.user.is_present());
        assert!(!overrides.host.is_present());
    }
}
