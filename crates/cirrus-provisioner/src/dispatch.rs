use std::sync::Arc;

use cirrus_core::{Instance, ResourceAddr, ResourceSpec};

use crate::context::{Context, StateStore};
use crate::driver::Driver;
use crate::error::ProvisionerError;
use crate::remote::{AwsEcs, AwsEvents, AwsLambda, EcsApi, EventsApi, FunctionApi};
use crate::resources::{FunctionDriver, ServiceDriver, TaskDefinitionDriver};

/// One driver per resource kind, routed by the [`ResourceSpec`] variant.
pub struct Drivers {
    pub service: ServiceDriver,
    pub task_definition: TaskDefinitionDriver,
    pub function: FunctionDriver,
}

impl Drivers {
    pub fn new(
        ecs: Arc<dyn EcsApi>,
        functions: Arc<dyn FunctionApi>,
        events: Arc<dyn EventsApi>,
    ) -> Self {
        Self {
            service: ServiceDriver::new(Arc::clone(&ecs)),
            task_definition: TaskDefinitionDriver::new(ecs),
            function: FunctionDriver::new(functions, events),
        }
    }

    /// Drivers backed by the AWS SDK clients for `config`.
    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(
            Arc::new(AwsEcs::from_conf(config)),
            Arc::new(AwsLambda::from_conf(config)),
            Arc::new(AwsEvents::from_conf(config)),
        )
    }

    /// Context for `instance_id`, keyed under the spec's canonical type name.
    pub fn context(spec: &ResourceSpec, instance_id: &str, store: Arc<dyn StateStore>) -> Context {
        Context::new(ResourceAddr::new(spec.kind().type_name(), instance_id), store)
    }

    pub async fn deploy(
        &self,
        spec: &ResourceSpec,
        previous: Option<&Instance>,
        ctx: &Context,
    ) -> Result<Instance, ProvisionerError> {
        tracing::debug!(addr = %ctx.addr(), "deploy");
        match spec {
            ResourceSpec::Service(s) => self.service.deploy(s, previous, ctx).await,
            ResourceSpec::TaskDefinition(s) => self.task_definition.deploy(s, previous, ctx).await,
            ResourceSpec::Function(s) => self.function.deploy(s, previous, ctx).await,
        }
    }

    pub async fn remove(
        &self,
        spec: &ResourceSpec,
        previous: Option<&Instance>,
        ctx: &Context,
    ) -> Result<Instance, ProvisionerError> {
        tracing::debug!(addr = %ctx.addr(), "remove");
        match spec {
            ResourceSpec::Service(s) => self.service.remove(s, previous, ctx).await,
            ResourceSpec::TaskDefinition(s) => self.task_definition.remove(s, previous, ctx).await,
            ResourceSpec::Function(s) => self.function.remove(s, previous, ctx).await,
        }
    }

    pub async fn get(
        &self,
        spec: &ResourceSpec,
        previous: Option<&Instance>,
        ctx: &Context,
    ) -> Result<Instance, ProvisionerError> {
        match spec {
            ResourceSpec::Service(s) => self.service.get(s, previous, ctx).await,
            ResourceSpec::TaskDefinition(s) => self.task_definition.get(s, previous, ctx).await,
            ResourceSpec::Function(s) => self.function.get(s, previous, ctx).await,
        }
    }
}
