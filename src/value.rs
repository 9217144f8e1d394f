//! Dynamically typed configuration values
//!
//! Extra configuration is declared as scalars but travels as untyped JSON.
//! `ConfigValue` is the closed set of shapes we accept on both sides.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// A scalar configuration value
///
/// Numbers keep their integer/float distinction, so `3` stays `3`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl ConfigValue {
    /// Convert an API value by its runtime type
    ///
    /// Arrays and objects have no scalar form and become compact JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.clone()),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::String(value.to_string()),
        }
    }

    /// Wire form of a declared value; `None` for `Null`
    ///
    /// Declared strings are re-typed, see [`retype_str`].
    pub fn to_wire(&self) -> Option<Value> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(Value::Bool(*b)),
            Self::Number(n) => Some(Value::Number(n.clone())),
            Self::String(s) => Some(retype_str(s)),
        }
    }

    /// Shape this value like `prior`
    ///
    /// A declared string that went out as a bool or number comes back as
    /// one; rendering it back to text keeps the declared shape stable.
    /// A remote value that is exactly what the prior string was sent as
    /// gives back the prior text, so `"1.10"` or `"007"` survive the trip.
    pub fn conform_to(self, prior: &ConfigValue) -> Self {
        match (prior, self) {
            (Self::String(p), value) if value.is_wire_of(p) => Self::String(p.clone()),
            (Self::String(_), Self::Bool(b)) => Self::String(b.to_string()),
            (Self::String(_), Self::Number(n)) => Self::String(n.to_string()),
            (_, value) => value,
        }
    }

    /// Whether this is what the declared string `s` goes out as
    fn is_wire_of(&self, s: &str) -> bool {
        match (self, retype_str(s)) {
            (Self::Bool(a), Value::Bool(b)) => *a == b,
            (Self::Number(a), Value::Number(b)) => *a == b,
            (Self::String(a), Value::String(b)) => *a == b,
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

/// Infer the natural JSON scalar of a string
///
/// `"true"`/`"false"` become booleans, then integers, then finite floats;
/// anything else stays a string.
pub fn retype_str(s: &str) -> Value {
    match s {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = s.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Some(n) = s
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
    {
        return Value::Number(n);
    }
    Value::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retype_str() {
        assert_eq!(retype_str("true"), json!(true));
        assert_eq!(retype_str("false"), json!(false));
        assert_eq!(retype_str("3"), json!(3));
        assert_eq!(retype_str("-12"), json!(-12));
        assert_eq!(retype_str("2.5"), json!(2.5));
        assert_eq!(retype_str("True"), json!("True"));
        assert_eq!(retype_str("NaN"), json!("NaN"));
        assert_eq!(retype_str("inf"), json!("inf"));
        assert_eq!(retype_str(""), json!(""));
        assert_eq!(retype_str("eu-west-1"), json!("eu-west-1"));
    }

    #[test]
    fn test_integer_is_not_written_as_float() {
        let wire = ConfigValue::from("3").to_wire().unwrap();
        assert_eq!(wire.to_string(), "3");
    }

    #[test]
    fn test_null_has_no_wire_form() {
        assert_eq!(ConfigValue::Null.to_wire(), None);
        assert_eq!(ConfigValue::from(true).to_wire(), Some(json!(true)));
    }

    #[test]
    fn test_from_json_runtime_types() {
        assert_eq!(ConfigValue::from_json(&json!(null)), ConfigValue::Null);
        assert_eq!(ConfigValue::from_json(&json!(7)), ConfigValue::from(7));
        assert_eq!(
            ConfigValue::from_json(&json!(["a", 1])),
            ConfigValue::from(r#"["a",1]"#)
        );
        assert_eq!(
            ConfigValue::from_json(&json!({"k": true})),
            ConfigValue::from(r#"{"k":true}"#)
        );
    }

    #[test]
    fn test_conform_to_declared_string() {
        let prior = ConfigValue::from("3");
        assert_eq!(ConfigValue::from(3).conform_to(&prior), ConfigValue::from("3"));
        assert_eq!(
            ConfigValue::from(false).conform_to(&prior),
            ConfigValue::from("false")
        );

        // Non-string declarations keep the API's shape
        assert_eq!(
            ConfigValue::from(3).conform_to(&ConfigValue::from(1)),
            ConfigValue::from(3)
        );
    }

    #[test]
    fn test_conform_to_keeps_non_canonical_numbers() {
        for declared in ["1.10", "007", "+5", "1e3"] {
            let prior = ConfigValue::from(declared);
            let wire = prior.to_wire().unwrap();
            // What the API echoes back after a JSON round trip
            let echoed: Value = serde_json::from_str(&wire.to_string()).unwrap();

            assert_eq!(
                ConfigValue::from_json(&echoed).conform_to(&prior),
                prior,
                "{declared} should read back verbatim"
            );
        }

        // A value changed remotely is still rendered as text
        let prior = ConfigValue::from("1.10");
        assert_eq!(
            ConfigValue::from_json(&json!(2)).conform_to(&prior),
            ConfigValue::from("2")
        );
    }

    #[test]
    fn test_deserialize_from_toml_scalars() {
        #[derive(Deserialize)]
        struct Table {
            values: std::collections::BTreeMap<String, ConfigValue>,
        }

        let table: Table = toml::from_str(
            r#"
[values]
region = "eu"
retries = 3
ratio = 0.5
enabled = true
"#,
        )
        .unwrap();

        assert_eq!(table.values["region"], ConfigValue::from("eu"));
        assert_eq!(table.values["retries"], ConfigValue::from(3));
        assert_eq!(table.values["enabled"], ConfigValue::from(true));
        assert!(matches!(table.values["ratio"], ConfigValue::Number(_)));
    }
}
