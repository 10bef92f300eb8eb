use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::state::PersistedState;

/// The value a driver returns: desired spec fields with observed fields
/// overlaid.
///
/// A fresh `Instance` is built on every call; nothing is mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instance(Map<String, Value>);

impl Instance {
    /// The result of a no-op `remove` / `get`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Spec fields, then every observed field on top.
    pub fn merged<S: Serialize>(spec: &S, observed: &PersistedState) -> Result<Self, CoreError> {
        let mut fields = spec_fields(spec)?;
        for (key, value) in observed.as_map() {
            fields.insert(key.clone(), value.clone());
        }
        Ok(Self(fields))
    }

    /// Spec fields with every output field explicitly reset to `null`, so
    /// a removed instance can't be mistaken for a never-reconciled one.
    pub fn removed<S: Serialize>(spec: &S, output_fields: &[&str]) -> Result<Self, CoreError> {
        let mut fields = spec_fields(spec)?;
        for field in output_fields {
            fields.insert((*field).to_string(), Value::Null);
        }
        Ok(Self(fields))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

fn spec_fields<S: Serialize>(spec: &S) -> Result<Map<String, Value>, CoreError> {
    match serde_json::to_value(spec)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}
