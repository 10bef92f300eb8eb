//! Remote API seams for each resource kind.
//!
//! Drivers talk to these traits, never to an SDK client directly; the
//! AWS-backed implementations live in [`ecs`], [`lambda`], and [`events`]. Requests are
//! typed so that a create-only field cannot leak into an update payload.

pub mod ecs;
pub mod events;
pub mod lambda;

use std::collections::BTreeMap;

use cirrus_core::spec::{
    DeploymentConfiguration, LoadBalancer, NetworkConfiguration, PlacementConstraint,
    PlacementStrategy, ServiceRegistry, TaskDefinitionSpec,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::driver::BoxFuture;
use crate::error::ProvisionerError;

pub use self::ecs::AwsEcs;
pub use self::events::AwsEvents;
pub use self::lambda::AwsLambda;

/// Observed remote state as returned by describe/create/update calls.
pub type Observed = Map<String, Value>;

/// Status value ECS reports for a usable service.
pub const ACTIVE_STATUS: &str = "ACTIVE";

/// ECS operations used by the service and task-definition drivers.
pub trait EcsApi: Send + Sync {
    /// `None` when no service of that name exists.
    fn describe_service<'a>(
        &'a self,
        cluster: Option<&'a str>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>>;

    fn create_service<'a>(
        &'a self,
        request: &'a CreateServiceRequest,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>>;

    fn update_service<'a>(
        &'a self,
        request: &'a UpdateServiceRequest,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>>;

    fn delete_service<'a>(
        &'a self,
        cluster: Option<&'a str>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    /// ARNs of every task currently attached to `service`.
    fn list_tasks<'a>(
        &'a self,
        cluster: Option<&'a str>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ProvisionerError>>;

    fn stop_task<'a>(
        &'a self,
        cluster: Option<&'a str>,
        task: &'a str,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    fn register_task_definition<'a>(
        &'a self,
        spec: &'a TaskDefinitionSpec,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>>;

    /// `task_definition` is `family:revision` or an ARN.
    fn deregister_task_definition<'a>(
        &'a self,
        task_definition: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    fn describe_task_definition<'a>(
        &'a self,
        task_definition: &'a str,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>>;
}

/// Function operations used by the function driver.
pub trait FunctionApi: Send + Sync {
    /// `None` when no function of that name exists.
    fn get_function<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>>;

    fn create_function<'a>(
        &'a self,
        config: &'a FunctionConfig,
        code: &'a [u8],
    ) -> BoxFuture<'a, Result<Observed, ProvisionerError>>;

    fn update_function_code<'a>(
        &'a self,
        name: &'a str,
        code: &'a [u8],
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    fn update_function_configuration<'a>(
        &'a self,
        config: &'a FunctionConfig,
    ) -> BoxFuture<'a, Result<Observed, ProvisionerError>>;

    /// Fails with [`ProvisionerError::ResourceNotFound`] if the function is gone.
    fn delete_function<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    /// Let the scheduler rule `source_arn` invoke `name`. A statement that
    /// already exists under `statement_id` counts as success.
    fn allow_invoke<'a>(
        &'a self,
        name: &'a str,
        statement_id: &'a str,
        source_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;
}

/// Scheduled-rule operations backing a function's `schedule`.
pub trait EventsApi: Send + Sync {
    /// Create or update an enabled rule firing on `expression`; returns its ARN.
    fn put_schedule_rule<'a>(
        &'a self,
        rule: &'a str,
        expression: &'a str,
    ) -> BoxFuture<'a, Result<String, ProvisionerError>>;

    /// Point `rule` at `target_arn`, replacing any target with the same id.
    fn put_target<'a>(
        &'a self,
        rule: &'a str,
        target_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    /// Detach the target and delete `rule`; a missing rule is not an error.
    fn delete_rule<'a>(&'a self, rule: &'a str) -> BoxFuture<'a, Result<(), ProvisionerError>>;
}

/// Full create payload, identity and launch type included.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_configuration: Option<DeploymentConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_grace_period_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_configuration: Option<NetworkConfiguration>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub placement_constraints: Vec<PlacementConstraint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub placement_strategy: Vec<PlacementStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduling_strategy: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub service_registries: Vec<ServiceRegistry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub load_balancers: Vec<LoadBalancer>,
}

/// Mutable subset only. ECS rejects in-place changes to the service name,
/// launch type, role, and scheduling strategy, so this type has no field
/// for them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceRequest {
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_configuration: Option<DeploymentConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_grace_period_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_configuration: Option<NetworkConfiguration>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub placement_constraints: Vec<PlacementConstraint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub placement_strategy: Vec<PlacementStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub service_registries: Vec<ServiceRegistry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub load_balancers: Vec<LoadBalancer>,
}

impl UpdateServiceRequest {
    /// Tell the scheduler to stop replacing tasks.
    pub fn scale_to_zero(cluster: Option<&str>, service: &str) -> Self {
        Self {
            service: service.to_string(),
            cluster: cluster.map(String::from),
            desired_count: Some(0),
            ..Self::default()
        }
    }
}

/// Function configuration shared by create and configuration-update calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionConfig {
    pub function_name: String,
    pub handler: String,
    pub runtime: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub environment: BTreeMap<String, String>,
}

/// Turn a JSON object into [`Observed`], dropping null fields.
pub(crate) fn observed(value: Value) -> Observed {
    match value {
        Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        _ => Observed::new(),
    }
}

pub(crate) fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}
