//! Object model for persisted configuration data.
//!
//! Persisted data follows the JSON object model ([`Value`]): primitives, arrays and
//! nested objects. This is the wire format shared by all storage agents regardless of
//! the textual encoding (YAML or JSON) chosen for the backing file.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Persisted value: a primitive, an array, or a nested object.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// `null`. Treated as absence when populating a record.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(serde_json::Number),
    /// String value.
    String(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Object / map of values.
    Object(Map),
}

/// Persisted object: an ordered mapping from field names to values.
///
/// Ordered so that rendered files are stable across save cycles.
pub type Map = BTreeMap<String, Value>;

/// Basic type of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
    /// Boolean value.
    Bool,
    /// Integer value.
    Integer,
    /// Floating-point value.
    Float,
    /// String.
    String,
    /// Array of values.
    Array,
    /// Object / map of values.
    Object,
}

impl fmt::Display for BasicType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Bool => "Boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        })
    }
}

impl Value {
    /// Returns the basic type of this value, or `None` for `null`.
    pub fn basic_type(&self) -> Option<BasicType> {
        Some(match self {
            Self::Null => return None,
            Self::Bool(_) => BasicType::Bool,
            Self::Number(number) if number.is_u64() || number.is_i64() => BasicType::Integer,
            Self::Number(_) => BasicType::Float,
            Self::String(_) => BasicType::String,
            Self::Array(_) => BasicType::Array,
            Self::Object(_) => BasicType::Object,
        })
    }

    /// Attempts to view this value as an object.
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Parses a string literal into the most specific value it can represent:
    /// a Boolean, then a number, then a plain string. Used when ingesting inputs
    /// that are inherently stringly-typed (CLI defaults, form submissions).
    pub fn from_literal(literal: &str) -> Self {
        if let Ok(bool_value) = literal.parse::<bool>() {
            Self::Bool(bool_value)
        } else if let Ok(number) = literal.parse::<serde_json::Number>() {
            Self::Number(number)
        } else {
            Self::String(literal.to_owned())
        }
    }

    /// Merges `other` into this value. Only objects are meaningfully merged;
    /// all other values are replaced.
    pub fn deep_merge(&mut self, other: Self) {
        match (self, other) {
            (Self::Object(this), Self::Object(other)) => {
                for (key, value) in other {
                    if let Some(existing) = this.get_mut(&key) {
                        existing.deep_merge(value);
                    } else {
                        this.insert(key, value);
                    }
                }
            }
            (this, other) => *this = other,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Bool(value),
            serde_json::Value::Number(value) => Self::Number(value),
            serde_json::Value::String(value) => Self::String(value),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(items) => Self::Object(
                items
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(value) => Self::Bool(value),
            Value::Number(value) => Self::Number(value),
            Value::String(value) => Self::String(value),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(items) => Self::Object(
                items
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl Value {
    /// Maps a YAML value into the object model.
    ///
    /// # Errors
    ///
    /// Returns an error if the input doesn't conform to the JSON object model; e.g., if it
    /// has mappings with array or object keys, or numbers not representable in JSON.
    pub(crate) fn from_yaml(value: serde_yaml::Value) -> anyhow::Result<Self> {
        Ok(match value {
            serde_yaml::Value::Null => Self::Null,
            serde_yaml::Value::Bool(value) => Self::Bool(value),
            serde_yaml::Value::Number(value) => Self::Number(Self::map_yaml_number(&value)?),
            serde_yaml::Value::String(value) => Self::String(value),
            serde_yaml::Value::Sequence(items) => Self::Array(
                items
                    .into_iter()
                    .map(Self::from_yaml)
                    .collect::<anyhow::Result<_>>()?,
            ),
            serde_yaml::Value::Mapping(items) => Self::Object(
                items
                    .into_iter()
                    .map(|(key, value)| {
                        anyhow::Ok((Self::map_yaml_key(key)?, Self::from_yaml(value)?))
                    })
                    .collect::<anyhow::Result<_>>()?,
            ),
            serde_yaml::Value::Tagged(tagged) => Self::from_yaml(tagged.value)?,
        })
    }

    fn map_yaml_key(key: serde_yaml::Value) -> anyhow::Result<String> {
        Ok(match key {
            serde_yaml::Value::String(value) => value,
            serde_yaml::Value::Number(value) => value.to_string(),
            serde_yaml::Value::Bool(value) => value.to_string(),
            serde_yaml::Value::Null => "null".into(),
            _ => anyhow::bail!(
                "unsupported key: {key:?}; only primitive value types are supported as keys"
            ),
        })
    }

    fn map_yaml_number(number: &serde_yaml::Number) -> anyhow::Result<serde_json::Number> {
        Ok(if let Some(number) = number.as_u64() {
            number.into()
        } else if let Some(number) = number.as_i64() {
            number.into()
        } else if let Some(number) = number.as_f64() {
            serde_json::Number::from_f64(number)
                .ok_or_else(|| anyhow::anyhow!("unsupported number: {number:?}"))?
        } else {
            anyhow::bail!("unsupported number: {number:?}")
        })
    }

    pub(crate) fn into_yaml(self) -> serde_yaml::Value {
        match self {
            Self::Null => serde_yaml::Value::Null,
            Self::Bool(value) => serde_yaml::Value::Bool(value),
            Self::Number(value) => {
                if let Some(value) = value.as_u64() {
                    serde_yaml::Value::Number(value.into())
                } else if let Some(value) = value.as_i64() {
                    serde_yaml::Value::Number(value.into())
                } else {
                    serde_yaml::Value::Number(value.as_f64().unwrap_or(f64::NAN).into())
                }
            }
            Self::String(value) => serde_yaml::Value::String(value),
            Self::Array(items) => {
                serde_yaml::Value::Sequence(items.into_iter().map(Self::into_yaml).collect())
            }
            Self::Object(items) => serde_yaml::Value::Mapping(
                items
                    .into_iter()
                    .map(|(key, value)| (serde_yaml::Value::String(key), value.into_yaml()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_json::Value::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

/// Serializes a Rust value into the persisted object model.
pub(crate) fn to_value<T: Serialize>(value: &T) -> serde_json::Result<Value> {
    serde_json::to_value(value).map(Value::from)
}

/// Deserializes a Rust value from the persisted object model.
pub(crate) fn from_value<T: DeserializeOwned>(value: &Value) -> serde_json::Result<T> {
    serde_json::from_value(serde_json::Value::from(value.clone()))
}
