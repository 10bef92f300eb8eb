//! Typed desired-state specs, one per resource kind.

mod function;
mod service;
mod task_definition;

pub use function::{CodeSource, FunctionSpec};
pub use service::{
    AwsVpcConfiguration, DeploymentConfiguration, LoadBalancer, NetworkConfiguration,
    PlacementStrategy, ServiceRegistry, ServiceSpec, TaskDefinitionRef,
};
pub use task_definition::{
    ContainerDefinition, HostVolumeProperties, KeyValuePair, LogConfiguration, PortMapping,
    TaskDefinitionSpec, Volume,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::registry::{self, ResourceKind};

/// Placement constraint, shared by services and task definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementConstraint {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

/// A desired spec tagged with its resource kind, dispatched by the
/// orchestrator to the matching driver.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSpec {
    Service(ServiceSpec),
    TaskDefinition(TaskDefinitionSpec),
    Function(FunctionSpec),
}

impl ResourceSpec {
    /// Resolve `type_name` and deserialize `inputs` into the matching spec.
    pub fn from_inputs(type_name: &str, inputs: Value) -> Result<Self, CoreError> {
        let kind = registry::resolve(type_name)?;
        let invalid = |e: serde_json::Error| CoreError::InvalidInputs {
            type_name: type_name.to_string(),
            message: e.to_string(),
        };

        let spec = match kind {
            ResourceKind::EcsService => {
                Self::Service(serde_json::from_value(inputs).map_err(invalid)?)
            }
            ResourceKind::EcsTaskDefinition => {
                Self::TaskDefinition(serde_json::from_value(inputs).map_err(invalid)?)
            }
            ResourceKind::Function => {
                Self::Function(serde_json::from_value(inputs).map_err(invalid)?)
            }
        };
        Ok(spec)
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Service(_) => ResourceKind::EcsService,
            Self::TaskDefinition(_) => ResourceKind::EcsTaskDefinition,
            Self::Function(_) => ResourceKind::Function,
        }
    }
}
