use aws_sdk_ecs::Client;
use aws_sdk_ecs::error::ProvideErrorMetadata;
use aws_sdk_ecs::types::{
    self as ecs, AssignPublicIp, Compatibility, LaunchType, LogDriver, NetworkMode,
    PlacementConstraintType, PlacementStrategyType, SchedulingStrategy,
    TaskDefinitionPlacementConstraintType, TransportProtocol,
};
use cirrus_core::spec::{self, TaskDefinitionSpec};
use serde_json::{Value, json};

use super::{
    CreateServiceRequest, EcsApi, Observed, UpdateServiceRequest, non_empty, observed,
};
use crate::driver::BoxFuture;
use crate::error::{ProvisionerError, remote_err};

/// [`EcsApi`] backed by the AWS ECS SDK.
pub struct AwsEcs {
    client: Client,
}

impl AwsEcs {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

impl EcsApi for AwsEcs {
    fn describe_service<'a>(
        &'a self,
        cluster: Option<&'a str>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>> {
        Box::pin(async move {
            let result = self
                .client
                .describe_services()
                .set_cluster(cluster.map(String::from))
                .services(service)
                .send()
                .await;

            match result {
                // Missing services come back as `failures`, not errors.
                Ok(resp) => Ok(resp.services().first().map(service_observed)),
                Err(e)
                    if e
                        .as_service_error()
                        .is_some_and(|se| se.is_cluster_not_found_exception()) =>
                {
                    Ok(None)
                }
                Err(e) => Err(remote_err("ecs:DescribeServices", &e)),
            }
        })
    }

    fn create_service<'a>(
        &'a self,
        request: &'a CreateServiceRequest,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>> {
        Box::pin(async move {
            let network_configuration = request
                .network_configuration
                .as_ref()
                .map(network_configuration)
                .transpose()?;

            let resp = self
                .client
                .create_service()
                .service_name(&request.service_name)
                .set_cluster(request.cluster.clone())
                .set_launch_type(request.launch_type.as_deref().map(LaunchType::from))
                .set_task_definition(request.task_definition.clone())
                .set_desired_count(request.desired_count)
                .set_deployment_configuration(
                    request
                        .deployment_configuration
                        .as_ref()
                        .map(deployment_configuration),
                )
                .set_health_check_grace_period_seconds(request.health_check_grace_period_seconds)
                .set_network_configuration(network_configuration)
                .set_placement_constraints(non_empty(
                    request.placement_constraints.iter().map(placement_constraint).collect(),
                ))
                .set_placement_strategy(non_empty(
                    request.placement_strategy.iter().map(placement_strategy).collect(),
                ))
                .set_platform_version(request.platform_version.clone())
                .set_role(request.role.clone())
                .set_scheduling_strategy(
                    request
                        .scheduling_strategy
                        .as_deref()
                        .map(SchedulingStrategy::from),
                )
                .set_service_registries(non_empty(
                    request.service_registries.iter().map(service_registry).collect(),
                ))
                .set_load_balancers(non_empty(
                    request.load_balancers.iter().map(load_balancer).collect(),
                ))
                .send()
                .await
                .map_err(|e| remote_err("ecs:CreateService", &e))?;

            Ok(resp.service().map(service_observed))
        })
    }

    fn update_service<'a>(
        &'a self,
        request: &'a UpdateServiceRequest,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>> {
        Box::pin(async move {
            let network_configuration = request
                .network_configuration
                .as_ref()
                .map(network_configuration)
                .transpose()?;

            let resp = self
                .client
                .update_service()
                .service(&request.service)
                .set_cluster(request.cluster.clone())
                .set_task_definition(request.task_definition.clone())
                .set_desired_count(request.desired_count)
                .set_deployment_configuration(
                    request
                        .deployment_configuration
                        .as_ref()
                        .map(deployment_configuration),
                )
                .set_health_check_grace_period_seconds(request.health_check_grace_period_seconds)
                .set_network_configuration(network_configuration)
                .set_placement_constraints(non_empty(
                    request.placement_constraints.iter().map(placement_constraint).collect(),
                ))
                .set_placement_strategy(non_empty(
                    request.placement_strategy.iter().map(placement_strategy).collect(),
                ))
                .set_platform_version(request.platform_version.clone())
                .set_service_registries(non_empty(
                    request.service_registries.iter().map(service_registry).collect(),
                ))
                .set_load_balancers(non_empty(
                    request.load_balancers.iter().map(load_balancer).collect(),
                ))
                .send()
                .await
                .map_err(|e| remote_err("ecs:UpdateService", &e))?;

            Ok(resp.service().map(service_observed))
        })
    }

    fn delete_service<'a>(
        &'a self,
        cluster: Option<&'a str>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.client
                .delete_service()
                .set_cluster(cluster.map(String::from))
                .service(service)
                .send()
                .await
                .map_err(|e| remote_err("ecs:DeleteService", &e))?;
            Ok(())
        })
    }

    fn list_tasks<'a>(
        &'a self,
        cluster: Option<&'a str>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ProvisionerError>> {
        Box::pin(async move {
            let mut task_arns = Vec::new();
            let mut next_token = None;
            loop {
                let resp = self
                    .client
                    .list_tasks()
                    .set_cluster(cluster.map(String::from))
                    .service_name(service)
                    .set_next_token(next_token.take())
                    .send()
                    .await
                    .map_err(|e| remote_err("ecs:ListTasks", &e))?;

                task_arns.extend(resp.task_arns().iter().cloned());

                match resp.next_token() {
                    Some(token) => next_token = Some(token.to_string()),
                    None => break,
                }
            }
            Ok(task_arns)
        })
    }

    fn stop_task<'a>(
        &'a self,
        cluster: Option<&'a str>,
        task: &'a str,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.client
                .stop_task()
                .set_cluster(cluster.map(String::from))
                .task(task)
                .reason(reason)
                .send()
                .await
                .map_err(|e| remote_err("ecs:StopTask", &e))?;
            Ok(())
        })
    }

    fn register_task_definition<'a>(
        &'a self,
        spec: &'a TaskDefinitionSpec,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>> {
        Box::pin(async move {
            let containers = spec
                .container_definitions
                .iter()
                .map(container_definition)
                .collect::<Result<Vec<_>, _>>()?;

            let resp = self
                .client
                .register_task_definition()
                .family(&spec.family)
                .set_cpu(spec.cpu.clone())
                .set_memory(spec.memory.clone())
                .set_network_mode(spec.network_mode.as_deref().map(NetworkMode::from))
                .set_placement_constraints(non_empty(
                    spec.placement_constraints
                        .iter()
                        .map(task_placement_constraint)
                        .collect(),
                ))
                .set_requires_compatibilities(non_empty(
                    spec.requires_compatibilities
                        .iter()
                        .map(|c| Compatibility::from(c.as_str()))
                        .collect(),
                ))
                .set_execution_role_arn(spec.execution_role_arn.clone())
                .set_task_role_arn(spec.task_role_arn.clone())
                .set_container_definitions(non_empty(containers))
                .set_volumes(non_empty(spec.volumes.iter().map(volume).collect()))
                .send()
                .await
                .map_err(|e| remote_err("ecs:RegisterTaskDefinition", &e))?;

            Ok(resp.task_definition().map(task_definition_observed))
        })
    }

    fn deregister_task_definition<'a>(
        &'a self,
        task_definition: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.client
                .deregister_task_definition()
                .task_definition(task_definition)
                .send()
                .await
                .map_err(|e| remote_err("ecs:DeregisterTaskDefinition", &e))?;
            Ok(())
        })
    }

    fn describe_task_definition<'a>(
        &'a self,
        task_definition: &'a str,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>> {
        Box::pin(async move {
            let result = self
                .client
                .describe_task_definition()
                .task_definition(task_definition)
                .send()
                .await;

            match result {
                Ok(resp) => Ok(resp.task_definition().map(task_definition_observed)),
                // ECS reports unknown revisions as a generic client exception.
                Err(e)
                    if e.as_service_error().is_some_and(|se| {
                        se.is_client_exception()
                            && se.message().is_some_and(|m| m.contains("Unable to describe"))
                    }) =>
                {
                    Ok(None)
                }
                Err(e) => Err(remote_err("ecs:DescribeTaskDefinition", &e)),
            }
        })
    }
}

// ── SDK → observed state ─────────────────────────────────────────────────────

fn service_observed(service: &ecs::Service) -> Observed {
    let load_balancers: Vec<Value> = service
        .load_balancers()
        .iter()
        .map(|lb| {
            json!({
                "targetGroupArn": lb.target_group_arn(),
                "loadBalancerName": lb.load_balancer_name(),
                "containerName": lb.container_name(),
                "containerPort": lb.container_port(),
            })
        })
        .collect();

    let deployments: Vec<Value> = service
        .deployments()
        .iter()
        .map(|d| {
            json!({
                "id": d.id(),
                "status": d.status(),
                "taskDefinition": d.task_definition(),
                "desiredCount": d.desired_count(),
                "runningCount": d.running_count(),
                "rolloutState": d.rollout_state().map(|r| r.as_str()),
            })
        })
        .collect();

    observed(json!({
        "serviceArn": service.service_arn(),
        "serviceName": service.service_name(),
        "clusterArn": service.cluster_arn(),
        "status": service.status(),
        "desiredCount": service.desired_count(),
        "runningCount": service.running_count(),
        "pendingCount": service.pending_count(),
        "launchType": service.launch_type().map(|l| l.as_str()),
        "platformVersion": service.platform_version(),
        "taskDefinition": service.task_definition(),
        "roleArn": service.role_arn(),
        "createdAt": service.created_at().map(|t| t.secs()),
        "healthCheckGracePeriodSeconds": service.health_check_grace_period_seconds(),
        "schedulingStrategy": service.scheduling_strategy().map(|s| s.as_str()),
        "loadBalancers": load_balancers,
        "deployments": deployments,
    }))
}

fn task_definition_observed(td: &ecs::TaskDefinition) -> Observed {
    let containers: Vec<Value> = td
        .container_definitions()
        .iter()
        .map(|c| json!({ "name": c.name(), "image": c.image() }))
        .collect();
    let volumes: Vec<Value> = td
        .volumes()
        .iter()
        .map(|v| json!({ "name": v.name() }))
        .collect();
    let requires_compatibilities: Vec<&str> = td
        .requires_compatibilities()
        .iter()
        .map(|c| c.as_str())
        .collect();
    let compatibilities: Vec<&str> = td.compatibilities().iter().map(|c| c.as_str()).collect();
    let requires_attributes: Vec<Value> = td
        .requires_attributes()
        .iter()
        .map(|a| json!(a.name()))
        .collect();

    observed(json!({
        "taskDefinitionArn": td.task_definition_arn(),
        "family": td.family(),
        "revision": td.revision(),
        "status": td.status().map(|s| s.as_str()),
        "cpu": td.cpu(),
        "memory": td.memory(),
        "networkMode": td.network_mode().map(|m| m.as_str()),
        "taskRoleArn": td.task_role_arn(),
        "executionRoleArn": td.execution_role_arn(),
        "containerDefinitions": containers,
        "volumes": volumes,
        "requiresCompatibilities": requires_compatibilities,
        "compatibilities": compatibilities,
        "requiresAttributes": requires_attributes,
    }))
}

// ── spec → SDK types ─────────────────────────────────────────────────────────

fn deployment_configuration(c: &spec::DeploymentConfiguration) -> ecs::DeploymentConfiguration {
    ecs::DeploymentConfiguration::builder()
        .set_maximum_percent(c.maximum_percent)
        .set_minimum_healthy_percent(c.minimum_healthy_percent)
        .build()
}

fn network_configuration(
    c: &spec::NetworkConfiguration,
) -> Result<ecs::NetworkConfiguration, ProvisionerError> {
    let awsvpc = match &c.awsvpc_configuration {
        Some(vpc) => Some(
            ecs::AwsVpcConfiguration::builder()
                .set_subnets(Some(vpc.subnets.clone()))
                .set_security_groups(non_empty(vpc.security_groups.clone()))
                .set_assign_public_ip(vpc.assign_public_ip.as_deref().map(AssignPublicIp::from))
                .build()
                .map_err(|e| remote_err("ecs:AwsVpcConfiguration", &e))?,
        ),
        None => None,
    };
    Ok(ecs::NetworkConfiguration::builder()
        .set_awsvpc_configuration(awsvpc)
        .build())
}

fn placement_constraint(c: &spec::PlacementConstraint) -> ecs::PlacementConstraint {
    ecs::PlacementConstraint::builder()
        .set_type(c.kind.as_deref().map(PlacementConstraintType::from))
        .set_expression(c.expression.clone())
        .build()
}

fn task_placement_constraint(
    c: &spec::PlacementConstraint,
) -> ecs::TaskDefinitionPlacementConstraint {
    ecs::TaskDefinitionPlacementConstraint::builder()
        .set_type(
            c.kind
                .as_deref()
                .map(TaskDefinitionPlacementConstraintType::from),
        )
        .set_expression(c.expression.clone())
        .build()
}

fn placement_strategy(s: &spec::PlacementStrategy) -> ecs::PlacementStrategy {
    ecs::PlacementStrategy::builder()
        .set_type(s.kind.as_deref().map(PlacementStrategyType::from))
        .set_field(s.field.clone())
        .build()
}

fn service_registry(r: &spec::ServiceRegistry) -> ecs::ServiceRegistry {
    ecs::ServiceRegistry::builder()
        .set_registry_arn(r.registry_arn.clone())
        .set_port(r.port)
        .set_container_name(r.container_name.clone())
        .set_container_port(r.container_port)
        .build()
}

fn load_balancer(lb: &spec::LoadBalancer) -> ecs::LoadBalancer {
    ecs::LoadBalancer::builder()
        .set_target_group_arn(lb.target_group_arn.clone())
        .set_load_balancer_name(lb.load_balancer_name.clone())
        .set_container_name(lb.container_name.clone())
        .set_container_port(lb.container_port)
        .build()
}

fn container_definition(
    c: &spec::ContainerDefinition,
) -> Result<ecs::ContainerDefinition, ProvisionerError> {
    let log_configuration = match &c.log_configuration {
        Some(log) => Some(
            ecs::LogConfiguration::builder()
                .log_driver(LogDriver::from(log.log_driver.as_str()))
                .set_options(if log.options.is_empty() {
                    None
                } else {
                    Some(log.options.clone().into_iter().collect())
                })
                .build()
                .map_err(|e| remote_err("ecs:LogConfiguration", &e))?,
        ),
        None => None,
    };

    let port_mappings = c
        .port_mappings
        .iter()
        .map(|p| {
            ecs::PortMapping::builder()
                .set_container_port(p.container_port)
                .set_host_port(p.host_port)
                .set_protocol(p.protocol.as_deref().map(TransportProtocol::from))
                .build()
        })
        .collect();

    let environment = c
        .environment
        .iter()
        .map(|kv| {
            ecs::KeyValuePair::builder()
                .name(&kv.name)
                .value(&kv.value)
                .build()
        })
        .collect();

    Ok(ecs::ContainerDefinition::builder()
        .name(&c.name)
        .image(&c.image)
        .set_cpu(c.cpu)
        .set_memory(c.memory)
        .set_memory_reservation(c.memory_reservation)
        .set_essential(c.essential)
        .set_port_mappings(non_empty(port_mappings))
        .set_environment(non_empty(environment))
        .set_command(non_empty(c.command.clone()))
        .set_entry_point(non_empty(c.entry_point.clone()))
        .set_log_configuration(log_configuration)
        .build())
}

fn volume(v: &spec::Volume) -> ecs::Volume {
    let host = v.host.as_ref().map(|h| {
        ecs::HostVolumeProperties::builder()
            .set_source_path(h.source_path.clone())
            .build()
    });
    ecs::Volume::builder().name(&v.name).set_host(host).build()
}
