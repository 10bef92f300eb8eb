use std::collections::BTreeMap;

use cirrus_core::{PersistedState, ResourceAddr};
use serde::{Deserialize, Serialize};

/// The whole state document, persisted to local disk and optionally S3.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionerState {
    /// Map of `ResourceAddr` display form (`Type.instance`) -> persisted state.
    #[serde(default)]
    pub resources: BTreeMap<String, PersistedState>,
}

impl ProvisionerState {
    pub fn get(&self, addr: &ResourceAddr) -> PersistedState {
        self.resources
            .get(&addr.to_string())
            .cloned()
            .unwrap_or_default()
    }

    /// Record `state` for `addr`; an empty state removes the entry.
    pub fn set(&mut self, addr: &ResourceAddr, state: PersistedState) {
        if state.is_empty() {
            self.resources.remove(&addr.to_string());
        } else {
            self.resources.insert(addr.to_string(), state);
        }
    }
}
