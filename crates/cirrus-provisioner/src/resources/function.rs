use std::sync::Arc;

use cirrus_core::spec::FunctionSpec;
use cirrus_core::{Instance, PersistedState};
use serde::Serialize;

use crate::context::Context;
use crate::driver::{BoxFuture, Driver};
use crate::error::ProvisionerError;
use crate::package;
use crate::remote::{EventsApi, FunctionApi, FunctionConfig, Observed};

/// Output fields reset to `null` when a function is removed.
pub const FUNCTION_OUTPUT_FIELDS: &[&str] = &[
    "name",
    "handler",
    "memory",
    "timeout",
    "description",
    "runtime",
    "arn",
    "roleArn",
    "scheduleRule",
];

/// State keys describing the scheduling rule a function owns.
const SCHEDULE_FIELDS: &[&str] = &["scheduleRule", "scheduleRuleArn", "schedule"];

/// Where a deployed function can be wired as an event target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkConfig {
    pub uri: String,
    pub protocol: &'static str,
}

pub struct FunctionDriver {
    functions: Arc<dyn FunctionApi>,
    events: Arc<dyn EventsApi>,
}

/// Rule name for the schedule owned by function `name`.
pub fn schedule_rule_name(name: &str) -> String {
    format!("{name}-schedule")
}

impl FunctionDriver {
    pub fn new(functions: Arc<dyn FunctionApi>, events: Arc<dyn EventsApi>) -> Self {
        Self { functions, events }
    }

    /// Sink config for a deployed instance; `None` until it has an ARN.
    pub fn sink_config(&self, instance: &Instance) -> Option<SinkConfig> {
        instance.str_field("arn").map(|arn| SinkConfig {
            uri: arn.to_string(),
            protocol: self.type_name(),
        })
    }

    fn config(spec: &FunctionSpec, name: &str) -> FunctionConfig {
        FunctionConfig {
            function_name: name.to_string(),
            handler: spec.handler.clone(),
            runtime: spec.runtime.clone(),
            role: spec.role.clone(),
            memory_size: spec.memory,
            timeout: spec.timeout,
            description: spec.description.clone(),
            environment: spec.environment.clone(),
        }
    }

    /// Delete `name`, treating an already-deleted function as success.
    async fn delete(&self, name: &str) -> Result<(), ProvisionerError> {
        tracing::info!(function_name = %name, "removing function");
        match self.functions.delete_function(name).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!(function_name = %name, "function already gone");
                Ok(())
            }
            Err(e) => Err(e.with_resource("function", name)),
        }
    }

    async fn create(
        &self,
        spec: &FunctionSpec,
        name: &str,
        code: &[u8],
    ) -> Result<Observed, ProvisionerError> {
        tracing::info!(function_name = %name, "creating function");
        self.functions
            .create_function(&Self::config(spec, name), code)
            .await
            .map_err(|e| e.with_resource("function", name))
    }

    /// Code first: the configuration update may reference metadata that
    /// is only valid for code already in place.
    async fn update(
        &self,
        spec: &FunctionSpec,
        name: &str,
        code: &[u8],
    ) -> Result<Observed, ProvisionerError> {
        tracing::info!(function_name = %name, "updating function");
        self.functions
            .update_function_code(name, code)
            .await
            .map_err(|e| e.with_resource("function", name))?;
        self.functions
            .update_function_configuration(&Self::config(spec, name))
            .await
            .map_err(|e| e.with_resource("function", name))
    }

    /// Upsert the rule for `expression`, allow it to invoke `name`, and
    /// attach the function as its target. Records the rule in `observed`.
    async fn schedule(
        &self,
        name: &str,
        expression: &str,
        observed: &mut Observed,
    ) -> Result<(), ProvisionerError> {
        let function_arn = observed
            .get("arn")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| {
                ProvisionerError::State(format!("function ({name}): no ARN to schedule"))
            })?;
        let rule = schedule_rule_name(name);
        tracing::info!(function_name = %name, rule = %rule, schedule = %expression, "scheduling function");

        let rule_arn = self
            .events
            .put_schedule_rule(&rule, expression)
            .await
            .map_err(|e| e.with_resource("schedule", &rule))?;
        self.functions
            .allow_invoke(name, &rule, &rule_arn)
            .await
            .map_err(|e| e.with_resource("function", name))?;
        self.events
            .put_target(&rule, &function_arn)
            .await
            .map_err(|e| e.with_resource("schedule", &rule))?;

        observed.insert("scheduleRule".into(), rule.into());
        observed.insert("scheduleRuleArn".into(), rule_arn.into());
        observed.insert("schedule".into(), expression.into());
        Ok(())
    }

    /// Delete the rule recorded in `state`, if any.
    async fn unschedule(&self, state: &PersistedState) -> Result<(), ProvisionerError> {
        let Some(rule) = state.str_field("scheduleRule") else {
            return Ok(());
        };
        tracing::info!(rule = %rule, "removing function schedule");
        self.events
            .delete_rule(rule)
            .await
            .map_err(|e| e.with_resource("schedule", rule))
    }
}

/// Copy the recorded schedule fields onto a freshly observed function.
fn carry_schedule(state: &PersistedState, observed: &mut Observed) {
    for field in SCHEDULE_FIELDS {
        if let Some(value) = state.get(field) {
            observed.insert((*field).to_string(), value.clone());
        }
    }
}

impl Driver for FunctionDriver {
    type Spec = FunctionSpec;

    fn type_name(&self) -> &'static str {
        "AwsFargateFunction"
    }

    fn deploy<'a>(
        &'a self,
        spec: &'a FunctionSpec,
        previous: Option<&'a Instance>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Instance, ProvisionerError>> {
        Box::pin(async move {
            // Packaging failures must surface before any remote mutation.
            let code = package::pack(&spec.code)?;

            let state = ctx.get_state().await?;
            let previous_name = state
                .str_field("name")
                .or_else(|| previous.and_then(|p| p.str_field("name")))
                .map(String::from);

            let (name, mut observed) = match (previous_name.as_deref(), spec.name.as_deref()) {
                (None, None) => return Ok(Instance::merged(spec, &state)?),
                (None, Some(name)) => (name, self.create(spec, name, &code).await?),
                (Some(old), None) => {
                    self.unschedule(&state).await?;
                    self.delete(old).await?;
                    ctx.clear_state().await?;
                    return Ok(Instance::removed(spec, FUNCTION_OUTPUT_FIELDS)?);
                }
                (Some(old), Some(name)) if old != name => {
                    self.unschedule(&state).await?;
                    self.delete(old).await?;
                    (name, self.create(spec, name, &code).await?)
                }
                (Some(_), Some(name)) => (name, self.update(spec, name, &code).await?),
            };

            // A rename has already removed the recorded rule.
            let scheduled = match spec.schedule.as_deref() {
                Some(expression) => self.schedule(name, expression, &mut observed).await,
                None if previous_name.as_deref() == Some(name) => self.unschedule(&state).await,
                None => Ok(()),
            };
            if let Err(e) = scheduled {
                // The function itself changed; record it so the next deploy
                // updates rather than recreates it.
                carry_schedule(&state, &mut observed);
                ctx.save_state(PersistedState::from(observed)).await?;
                return Err(e);
            }

            let observed = PersistedState::from(observed);
            ctx.save_state(observed.clone()).await?;
            Ok(Instance::merged(spec, &observed)?)
        })
    }

    fn remove<'a>(
        &'a self,
        spec: &'a FunctionSpec,
        _previous: Option<&'a Instance>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Instance, ProvisionerError>> {
        Box::pin(async move {
            let state = ctx.get_state().await?;
            let Some(name) = state.str_field("name") else {
                return Ok(Instance::empty());
            };

            self.unschedule(&state).await?;
            self.delete(name).await?;
            ctx.clear_state().await?;
            Ok(Instance::removed(spec, FUNCTION_OUTPUT_FIELDS)?)
        })
    }

    fn get<'a>(
        &'a self,
        spec: &'a FunctionSpec,
        _previous: Option<&'a Instance>,
        ctx: &'a Context,
    ) -> BoxFuture<'a, Result<Instance, ProvisionerError>> {
        Box::pin(async move {
            let state = ctx.get_state().await?;
            let Some(name) = state.str_field("name") else {
                return Ok(Instance::empty());
            };

            let mut observed = self.functions.get_function(name).await?.unwrap_or_default();
            carry_schedule(&state, &mut observed);
            let observed = PersistedState::from(observed);
            ctx.save_state(observed.clone()).await?;
            Ok(Instance::merged(spec, &observed)?)
        })
    }
}
