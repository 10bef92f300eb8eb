use aws_sdk_eventbridge::Client;
use aws_sdk_eventbridge::types::{RuleState, Target};

use super::EventsApi;
use crate::driver::BoxFuture;
use crate::error::{ProvisionerError, remote_err};

/// Target id used for the single function a schedule rule invokes.
const TARGET_ID: &str = "function";

/// [`EventsApi`] backed by the Amazon EventBridge SDK.
pub struct AwsEvents {
    client: Client,
}

impl AwsEvents {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

impl EventsApi for AwsEvents {
    fn put_schedule_rule<'a>(
        &'a self,
        rule: &'a str,
        expression: &'a str,
    ) -> BoxFuture<'a, Result<String, ProvisionerError>> {
        Box::pin(async move {
            let resp = self
                .client
                .put_rule()
                .name(rule)
                .schedule_expression(expression)
                .state(RuleState::Enabled)
                .send()
                .await
                .map_err(|e| remote_err("events:PutRule", &e))?;

            resp.rule_arn().map(String::from).ok_or_else(|| ProvisionerError::RemoteCall {
                operation: "events:PutRule".to_string(),
                message: format!("no ARN returned for rule {rule}"),
            })
        })
    }

    fn put_target<'a>(
        &'a self,
        rule: &'a str,
        target_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            let target = Target::builder()
                .id(TARGET_ID)
                .arn(target_arn)
                .build()
                .map_err(|e| remote_err("events:Target", &e))?;

            let resp = self
                .client
                .put_targets()
                .rule(rule)
                .targets(target)
                .send()
                .await
                .map_err(|e| remote_err("events:PutTargets", &e))?;

            // PutTargets reports per-entry failures in a 200 response.
            if resp.failed_entry_count() > 0 {
                let message = resp
                    .failed_entries()
                    .iter()
                    .filter_map(|entry| entry.error_message())
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(ProvisionerError::RemoteCall {
                    operation: "events:PutTargets".to_string(),
                    message,
                });
            }
            Ok(())
        })
    }

    fn delete_rule<'a>(&'a self, rule: &'a str) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            match self
                .client
                .remove_targets()
                .rule(rule)
                .ids(TARGET_ID)
                .send()
                .await
            {
                Ok(_) => {}
                Err(e)
                    if e
                        .as_service_error()
                        .is_some_and(|se| se.is_resource_not_found_exception()) =>
                {
                    tracing::debug!(rule = %rule, "schedule rule already gone");
                    return Ok(());
                }
                Err(e) => return Err(remote_err("events:RemoveTargets", &e)),
            }

            match self.client.delete_rule().name(rule).send().await {
                Ok(_) => Ok(()),
                Err(e)
                    if e
                        .as_service_error()
                        .is_some_and(|se| se.is_resource_not_found_exception()) =>
                {
                    Ok(())
                }
                Err(e) => Err(remote_err("events:DeleteRule", &e)),
            }
        })
    }
}
