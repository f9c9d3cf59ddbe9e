//! Values crossing the host/script boundary.
//!
//! Conversions are total: anything a script can produce maps to exactly one
//! [`Value`], with unsupported interpreter types collapsing to [`Value::Absent`].

use std::collections::{BTreeMap, HashMap};

use rhai::{Dynamic, Map};
use serde::Serialize;

/// A value returned by a program or passed to it as an input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// No value (`()` in scripts).
    Absent,
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Table(BTreeMap<String, Value>),
}

impl Value {
    /// Reinterpret an integer as the unsigned 64-bit value it carries.
    ///
    /// `capability::hash` returns its `u64` result in a script integer; this
    /// recovers the original bits.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Integer(i) => Some(*i as u64),
            _ => None,
        }
    }

    /// Numeric view of integers and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Native interpreter form: arrays and tables become rhai arrays and
    /// object maps, so scripts can index and compute on them directly.
    pub(crate) fn to_dynamic(&self) -> Dynamic {
        match self {
            Value::Absent => Dynamic::UNIT,
            Value::Bool(b) => Dynamic::from_bool(*b),
            Value::Integer(i) => Dynamic::from_int(*i),
            Value::Number(n) => Dynamic::from_float(*n),
            Value::String(s) => Dynamic::from(s.clone()),
            Value::Array(items) => {
                Dynamic::from_array(items.iter().map(Value::to_dynamic).collect())
            }
            Value::Table(entries) => {
                let mut map = Map::new();
                for (k, v) in entries {
                    map.insert(k.as_str().into(), v.to_dynamic());
                }
                Dynamic::from_map(map)
            }
        }
    }
}

impl From<Dynamic> for Value {
    fn from(value: Dynamic) -> Self {
        if value.is_unit() {
            return Value::Absent;
        }
        if let Ok(b) = value.as_bool() {
            return Value::Bool(b);
        }
        if let Ok(i) = value.as_int() {
            return Value::Integer(i);
        }
        if let Ok(f) = value.as_float() {
            return Value::Number(f);
        }
        if let Ok(c) = value.as_char() {
            return Value::String(c.to_string());
        }
        if value.is_string() {
            return value
                .into_string()
                .map(Value::String)
                .unwrap_or(Value::Absent);
        }
        if value.is_array() {
            return value
                .into_array()
                .map(|items| Value::Array(items.into_iter().map(Value::from).collect()))
                .unwrap_or(Value::Absent);
        }
        if value.is_map() {
            return value
                .try_cast::<Map>()
                .map(|map| {
                    Value::Table(
                        map.into_iter()
                            .map(|(k, v)| (k.to_string(), Value::from(v)))
                            .collect(),
                    )
                })
                .unwrap_or(Value::Absent);
        }
        Value::Absent
    }
}

impl From<&Value> for Dynamic {
    fn from(value: &Value) -> Self {
        value.to_dynamic()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// A single model input after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Number(f64),
    Text(String),
}

/// Feature map handed to a decision-tree model.
pub type Features = HashMap<String, Feature>;

/// Coerce a script map into model features.
///
/// Numbers (integer or float) become [`Feature::Number`], strings are kept
/// as [`Feature::Text`], and every other value type is dropped silently.
pub fn coerce_features(map: &Map) -> Features {
    let mut features = Features::with_capacity(map.len());
    for (key, value) in map {
        let feature = if let Ok(i) = value.as_int() {
            Feature::Number(i as f64)
        } else if let Ok(f) = value.as_float() {
            Feature::Number(f)
        } else if value.is_string() {
            match value.clone().into_string() {
                Ok(s) => Feature::Text(s),
                Err(_) => continue,
            }
        } else {
            continue;
        };
        features.insert(key.to_string(), feature);
    }
    features
}
