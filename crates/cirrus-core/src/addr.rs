use std::fmt;

use serde::{Deserialize, Serialize};

/// Composite key for addressing a resource instance in the state store.
///
/// This names the *instance* the orchestrator manages, not the remote
/// object: a service instance keeps its address when its `serviceName`
/// changes and the remote service is replaced.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ResourceAddr {
    pub resource_type: String,
    pub instance_id: String,
}

impl ResourceAddr {
    pub fn new(resource_type: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            instance_id: instance_id.into(),
        }
    }
}

impl fmt::Display for ResourceAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.instance_id)
    }
}
