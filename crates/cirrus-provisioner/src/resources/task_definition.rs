use std::sync::Arc;

use cirrus_core::spec::TaskDefinitionSpec;
use cirrus_core::{Instance, PersistedState};

use crate::context::Context;
use crate::driver::{BoxFuture, Driver};
use crate::error::ProvisionerError;
use crate::remote::EcsApi;

/// Output fields reset to `null` when a task definition is removed.
pub const TASK_DEFINITION_OUTPUT_FIELDS: &[&str] = &[
    "taskDefinitionArn",
    "containerDefinitions",
    "family",
    "taskRoleArn",
    "executionRoleArn",
    "networkMode",
    "revision",
    "volumes",
    "status",
    "requiresAttributes",
    "placementConstraints",
    "compatibilities",
    "requiresCompatibilities",
    "cpu",
    "memory",
];

/// `family:revision` of the recorded revision, if both are recorded.
fn recorded_revision(state: &PersistedState) -> Option<String> {
    let family = state.str_field("family")?;
    let revision = state.i64_field("revision")?;
    Some(format!("{family}:{revision}"))
}

/// Append-only revisions: every deploy registers a new revision and only
/// then deregisters the one it replaces. A failure in between leaves two
/// usable revisions, never zero.
pub struct TaskDefinitionDriver {
    ecs: Arc<dyn EcsApi>,
}

impl TaskDefinitionDriver {
    pub fn new(ecs: Arc<dyn EcsApi>) -> Self {
        Self { ecs }
    }
}

impl Driver for TaskDefinitionDriver {
    type Spec = TaskDefinitionSpec;

    fn type_name(&self) -> &'static str {
        "AwsEcsTaskDefinition"
    }

    fn deploy<'a>(
        &'a self,
        spec: &'a TaskDefinitionSpec,
        previous: Option<&'a Instance>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Instance, ProvisionerError>> {
        Box::pin(async move {
            let mut state = ctx.get_state().await?;

            if let Some(old_family) = state.str_field("family")
                && old_family != spec.family
            {
                tracing::info!(
                    old = %old_family,
                    new = %spec.family,
                    "change to ECS task definition family requires replacement"
                );
                self.remove(spec, previous, ctx).await?;
                state = PersistedState::new();
            }
            let superseded = recorded_revision(&state);

            let observed = self
                .ecs
                .register_task_definition(spec)
                .await
                .map_err(|e| e.with_resource("ECS task definition", &spec.family))?
                .unwrap_or_default();
            let observed = PersistedState::from(observed);

            // Record the new revision before touching the old one, so a failed
            // deregistration still leaves state pointing at a usable revision.
            ctx.save_state(observed.clone()).await?;
            tracing::info!(
                family = %spec.family,
                revision = ?observed.i64_field("revision"),
                "ECS task definition registered"
            );

            if let Some(old) = superseded
                && Some(&old) != recorded_revision(&observed).as_ref()
            {
                self.ecs
                    .deregister_task_definition(&old)
                    .await
                    .map_err(|e| e.with_resource("ECS task definition", &old))?;
                tracing::info!(task_definition = %old, "superseded ECS task definition revision deregistered");
            }

            Ok(Instance::merged(spec, &observed)?)
        })
    }

    fn remove<'a>(
        &'a self,
        spec: &'a TaskDefinitionSpec,
        _previous: Option<&'a Instance>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Instance, ProvisionerError>> {
        Box::pin(async move {
            let state = ctx.get_state().await?;
            let Some(task_definition) = recorded_revision(&state) else {
                return Ok(Instance::empty());
            };

            self.ecs
                .deregister_task_definition(&task_definition)
                .await
                .map_err(|e| e.with_resource("ECS task definition", &task_definition))?;
            tracing::info!(task_definition = %task_definition, "ECS task definition revision deregistered");

            ctx.clear_state().await?;
            Ok(Instance::removed(spec, TASK_DEFINITION_OUTPUT_FIELDS)?)
        })
    }

    fn get<'a>(
        &'a self,
        spec: &'a TaskDefinitionSpec,
        _previous: Option<&'a Instance>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Instance, ProvisionerError>> {
        Box::pin(async move {
            let state = ctx.get_state().await?;
            let Some(task_definition) = recorded_revision(&state) else {
                return Ok(Instance::empty());
            };

            let observed = self
                .ecs
                .describe_task_definition(&task_definition)
                .await?
                .unwrap_or_default();

            let observed = PersistedState::from(observed);
            ctx.save_state(observed.clone()).await?;
            Ok(Instance::merged(spec, &observed)?)
        })
    }
}
