//! # Dynamic Values
//!
//! This module defines `Value`, the dynamic data type flowing through the
//! engine: domain-model nodes, actors, expression results and scope variables
//! are all `Value`s. The engine never inspects the domain metamodel beyond
//! this representation; richer model types are flattened into maps before
//! generation.
//!
//! The one piece of policy that lives here is scalar-to-collection coercion:
//! a factory expression may return either a collection or a single element,
//! and [`Value::into_collection`] treats a non-collection value as a
//! one-element collection so that unit authors never special-case the shape.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

/// A dynamically typed value used for model entities and expression results.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The absence of a value inside a structure (distinct from an absent
    /// expression result, which is `None` at the evaluator boundary).
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Build a map value from `(name, value)` pairs.
    pub fn object<I, K>(entries: I) -> Value
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Parse a value from a YAML document.
    ///
    /// Convenient for loading domain-model fixtures; the engine itself does
    /// not prescribe how model instances are produced.
    pub fn from_yaml_str(yaml: &str) -> Result<Value> {
        let raw: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        Ok(Value::from(raw))
    }

    /// Get an entry of a map value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// View the value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// View the value as a list slice, if it is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Coerce the value into a collection.
    ///
    /// Collections pass through; every other value becomes a singleton
    /// collection. Factory expressions rely on this so that a scalar result
    /// and a one-element collection are interchangeable.
    pub fn into_collection(self) -> Vec<Value> {
        match self {
            Value::List(items) => items,
            other => vec![other],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", rendered.join(","))
            }
            Value::Map(entries) => {
                let rendered: Vec<String> =
                    entries.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write!(f, "{}", rendered.join(","))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(raw: serde_yaml::Value) -> Self {
        match raw {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Str(n.to_string()),
            },
            serde_yaml::Value::String(s) => Value::Str(s),
            serde_yaml::Value::Sequence(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_yaml::Value::Mapping(entries) => {
                let mut map = BTreeMap::new();
                for (k, v) in entries {
                    let key = match k {
                        serde_yaml::Value::String(s) => s,
                        other => serde_yaml::to_string(&other)
                            .map(|s| s.trim_end().to_string())
                            .unwrap_or_default(),
                    };
                    map.insert(key, Value::from(v));
                }
                Value::Map(map)
            }
            serde_yaml::Value::Tagged(tagged) => Value::from(tagged.value),
        }
    }
}
