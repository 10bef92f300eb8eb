use std::collections::HashMap;

use aws_sdk_lambda::Client;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Environment, FunctionCode, Runtime};
use serde_json::json;

use super::{FunctionApi, FunctionConfig, Observed, observed};
use crate::driver::BoxFuture;
use crate::error::{ProvisionerError, remote_err};

/// Same getters exist on `FunctionConfiguration`, `CreateFunctionOutput`,
/// and `UpdateFunctionConfigurationOutput`.
macro_rules! function_observed {
    ($config:expr) => {{
        let config = $config;
        observed(json!({
            "name": config.function_name(),
            "arn": config.function_arn(),
            "handler": config.handler(),
            "runtime": config.runtime().map(|r| r.as_str()),
            "memory": config.memory_size(),
            "timeout": config.timeout(),
            "description": config.description(),
            "roleArn": config.role(),
        }))
    }};
}

/// [`FunctionApi`] backed by the AWS Lambda SDK.
pub struct AwsLambda {
    client: Client,
}

impl AwsLambda {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

fn environment(config: &FunctionConfig) -> Environment {
    let variables: HashMap<String, String> = config
        .environment
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Environment::builder().set_variables(Some(variables)).build()
}

impl FunctionApi for AwsLambda {
    fn get_function<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>> {
        Box::pin(async move {
            match self.client.get_function().function_name(name).send().await {
                Ok(resp) => Ok(resp.configuration().map(|c| function_observed!(c))),
                Err(e)
                    if e
                        .as_service_error()
                        .is_some_and(|se| se.is_resource_not_found_exception()) =>
                {
                    Ok(None)
                }
                Err(e) => Err(remote_err("lambda:GetFunction", &e)),
            }
        })
    }

    fn create_function<'a>(
        &'a self,
        config: &'a FunctionConfig,
        code: &'a [u8],
    ) -> BoxFuture<'a, Result<Observed, ProvisionerError>> {
        Box::pin(async move {
            let resp = self
                .client
                .create_function()
                .function_name(&config.function_name)
                .handler(&config.handler)
                .runtime(Runtime::from(config.runtime.as_str()))
                .role(&config.role)
                .set_memory_size(config.memory_size)
                .set_timeout(config.timeout)
                .set_description(config.description.clone())
                .environment(environment(config))
                .code(FunctionCode::builder().zip_file(Blob::new(code.to_vec())).build())
                .publish(true)
                .send()
                .await
                .map_err(|e| remote_err("lambda:CreateFunction", &e))?;

            Ok(function_observed!(&resp))
        })
    }

    fn update_function_code<'a>(
        &'a self,
        name: &'a str,
        code: &'a [u8],
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.client
                .update_function_code()
                .function_name(name)
                .zip_file(Blob::new(code.to_vec()))
                .publish(true)
                .send()
                .await
                .map_err(|e| remote_err("lambda:UpdateFunctionCode", &e))?;
            Ok(())
        })
    }

    fn update_function_configuration<'a>(
        &'a self,
        config: &'a FunctionConfig,
    ) -> BoxFuture<'a, Result<Observed, ProvisionerError>> {
        Box::pin(async move {
            let resp = self
                .client
                .update_function_configuration()
                .function_name(&config.function_name)
                .handler(&config.handler)
                .runtime(Runtime::from(config.runtime.as_str()))
                .role(&config.role)
                .set_memory_size(config.memory_size)
                .set_timeout(config.timeout)
                .set_description(config.description.clone())
                .environment(environment(config))
                .send()
                .await
                .map_err(|e| remote_err("lambda:UpdateFunctionConfiguration", &e))?;

            Ok(function_observed!(&resp))
        })
    }

    fn delete_function<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            match self.client.delete_function().function_name(name).send().await {
                Ok(_) => Ok(()),
                Err(e)
                    if e
                        .as_service_error()
                        .is_some_and(|se| se.is_resource_not_found_exception()) =>
                {
                    Err(ProvisionerError::ResourceNotFound {
                        resource_type: "AwsFargateFunction".to_string(),
                        resource_id: name.to_string(),
                    })
                }
                Err(e) => Err(remote_err("lambda:DeleteFunction", &e)),
            }
        })
    }

    fn allow_invoke<'a>(
        &'a self,
        name: &'a str,
        statement_id: &'a str,
        source_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            match self
                .client
                .add_permission()
                .function_name(name)
                .statement_id(statement_id)
                .action("lambda:InvokeFunction")
                .principal("events.amazonaws.com")
                .source_arn(source_arn)
                .send()
                .await
            {
                Ok(_) => Ok(()),
                Err(e)
                    if e
                        .as_service_error()
                        .is_some_and(|se| se.is_resource_conflict_exception()) =>
                {
                    Ok(())
                }
                Err(e) => Err(remote_err("lambda:AddPermission", &e)),
            }
        })
    }
}
