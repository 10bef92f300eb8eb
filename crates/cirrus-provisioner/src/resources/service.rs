use std::sync::Arc;

use cirrus_core::spec::ServiceSpec;
use cirrus_core::{Instance, PersistedState};
use futures::future::join_all;

use crate::context::Context;
use crate::driver::{BoxFuture, Driver};
use crate::error::{ProvisionerError, format_err_chain};
use crate::remote::{ACTIVE_STATUS, CreateServiceRequest, EcsApi, UpdateServiceRequest};

/// Output fields reset to `null` when a service is removed.
pub const SERVICE_OUTPUT_FIELDS: &[&str] = &[
    "serviceArn",
    "serviceName",
    "events",
    "clusterArn",
    "loadBalancers",
    "serviceRegistries",
    "status",
    "desiredCount",
    "runningCount",
    "pendingCount",
    "launchType",
    "platformVersion",
    "taskDefinition",
    "deploymentConfiguration",
    "deployments",
    "roleArn",
    "createdAt",
    "placementConstraints",
    "placementStrategy",
    "networkConfiguration",
    "healthCheckGracePeriodSeconds",
    "schedulingStrategy",
];

const STOP_REASON: &str = "Removing service";

/// Outcome of stopping every task attached to a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub stopped: usize,
    pub failed: usize,
}

pub struct ServiceDriver {
    ecs: Arc<dyn EcsApi>,
}

impl ServiceDriver {
    pub fn new(ecs: Arc<dyn EcsApi>) -> Self {
        Self { ecs }
    }

    fn create_request(spec: &ServiceSpec, service_name: String) -> CreateServiceRequest {
        CreateServiceRequest {
            service_name,
            cluster: spec.cluster.clone(),
            launch_type: spec.launch_type.clone(),
            task_definition: spec.task_definition.as_ref().map(|td| td.identity()),
            desired_count: spec.desired_count,
            deployment_configuration: spec.deployment_configuration.clone(),
            health_check_grace_period_seconds: spec.health_check_grace_period_seconds,
            network_configuration: spec.network_configuration.clone(),
            placement_constraints: spec.placement_constraints.clone(),
            placement_strategy: spec.placement_strategy.clone(),
            platform_version: spec.platform_version.clone(),
            role: spec.role.clone(),
            scheduling_strategy: spec.scheduling_strategy.clone(),
            service_registries: spec.service_registries.clone(),
            load_balancers: spec.load_balancers.clone(),
        }
    }

    fn update_request(spec: &ServiceSpec, service_name: String) -> UpdateServiceRequest {
        UpdateServiceRequest {
            service: service_name,
            cluster: spec.cluster.clone(),
            task_definition: spec.task_definition.as_ref().map(|td| td.identity()),
            desired_count: spec.desired_count,
            deployment_configuration: spec.deployment_configuration.clone(),
            health_check_grace_period_seconds: spec.health_check_grace_period_seconds,
            network_configuration: spec.network_configuration.clone(),
            placement_constraints: spec.placement_constraints.clone(),
            placement_strategy: spec.placement_strategy.clone(),
            platform_version: spec.platform_version.clone(),
            service_registries: spec.service_registries.clone(),
            load_balancers: spec.load_balancers.clone(),
        }
    }

    /// List attached tasks, scale to zero, then stop every task concurrently.
    ///
    /// Returns only after every stop call has settled. Individual stop
    /// failures are logged and counted; they do not abort the drain.
    pub async fn drain(
        &self,
        cluster: Option<&str>,
        service_name: &str,
    ) -> Result<DrainReport, ProvisionerError> {
        let tasks = self.ecs.list_tasks(cluster, service_name).await?;

        self.ecs
            .update_service(&UpdateServiceRequest::scale_to_zero(cluster, service_name))
            .await?;

        let stops = tasks.iter().map(|task| async move {
            tracing::info!(service_name = %service_name, task = %task, "stopping task");
            (task, self.ecs.stop_task(cluster, task, STOP_REASON).await)
        });

        let mut report = DrainReport::default();
        for (task, outcome) in join_all(stops).await {
            match outcome {
                Ok(()) => report.stopped += 1,
                Err(e) => {
                    tracing::warn!(
                        service_name = %service_name,
                        task = %task,
                        error = %format_err_chain(&e),
                        "failed to stop task, continuing drain"
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            service_name = %service_name,
            stopped = report.stopped,
            failed = report.failed,
            "service drained"
        );
        Ok(report)
    }
}

impl Driver for ServiceDriver {
    type Spec = ServiceSpec;

    fn type_name(&self) -> &'static str {
        "AwsEcsService"
    }

    fn deploy<'a>(
        &'a self,
        spec: &'a ServiceSpec,
        previous: Option<&'a Instance>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Instance, ProvisionerError>> {
        Box::pin(async move {
            let state = ctx.get_state().await?;
            let service_name = spec.identity(ctx.instance_id());

            if let Some(old_name) = state.str_field("serviceName")
                && old_name != service_name
            {
                tracing::info!(
                    old = %old_name,
                    new = %service_name,
                    "change to ECS service name requires replacement"
                );
                self.remove(spec, previous, ctx).await?;
            }

            let existing = self
                .ecs
                .describe_service(spec.cluster.as_deref(), &service_name)
                .await?;
            let is_active = existing
                .as_ref()
                .and_then(|s| s.get("status"))
                .and_then(|v| v.as_str())
                == Some(ACTIVE_STATUS);

            let result = if is_active {
                tracing::info!(service_name = %service_name, "updating ECS service");
                let request = Self::update_request(spec, service_name.clone());
                self.ecs.update_service(&request).await
            } else {
                tracing::info!(service_name = %service_name, "creating ECS service");
                let request = Self::create_request(spec, service_name.clone());
                self.ecs.create_service(&request).await
            };
            let observed = result.map_err(|e| e.with_resource("ECS service", &service_name))?;

            let observed = PersistedState::from(observed.unwrap_or_default());
            ctx.save_state(observed.clone()).await?;
            tracing::info!(service_name = %service_name, "ECS service deployed");

            Ok(Instance::merged(spec, &observed)?)
        })
    }

    fn remove<'a>(
        &'a self,
        spec: &'a ServiceSpec,
        _previous: Option<&'a Instance>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Instance, ProvisionerError>> {
        Box::pin(async move {
            let state = ctx.get_state().await?;
            let Some(service_name) = state.str_field("serviceName") else {
                return Ok(Instance::empty());
            };
            let cluster = state.str_field("clusterArn");

            self.drain(cluster, service_name)
                .await
                .map_err(|e| e.with_resource("ECS service", service_name))?;

            self.ecs
                .delete_service(cluster, service_name)
                .await
                .map_err(|e| e.with_resource("ECS service", service_name))?;
            tracing::info!(service_name = %service_name, "ECS service removed");

            ctx.clear_state().await?;
            Ok(Instance::removed(spec, SERVICE_OUTPUT_FIELDS)?)
        })
    }

    fn get<'a>(
        &'a self,
        spec: &'a ServiceSpec,
        _previous: Option<&'a Instance>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Instance, ProvisionerError>> {
        Box::pin(async move {
            let state = ctx.get_state().await?;
            let Some(service_name) = state.str_field("serviceName") else {
                return Ok(Instance::empty());
            };

            let observed = self
                .ecs
                .describe_service(state.str_field("clusterArn"), service_name)
                .await?
                .unwrap_or_default();

            let observed = PersistedState::from(observed);
            ctx.save_state(observed.clone()).await?;
            Ok(Instance::merged(spec, &observed)?)
        })
    }
}
