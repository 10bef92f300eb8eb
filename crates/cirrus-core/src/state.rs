use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Last-known observed state of one remote resource.
///
/// The only source of truth for whether a resource exists and under which
/// identity. An empty object means "never recorded" (or cleared by a remove).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedState(Map<String, Value>);

impl PersistedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `key` is recorded with a non-null value.
    pub fn has(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn i64_field(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for PersistedState {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
