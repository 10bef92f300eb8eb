//! Recording test doubles for the remote API seams and the state store.
//!
//! Each mock records every call in order so tests can assert on call
//! sequences (drain before delete, register before deregister, ...).
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cirrus_core::spec::TaskDefinitionSpec;
use cirrus_core::{PersistedState, ResourceAddr};
use cirrus_provisioner::remote::{
    CreateServiceRequest, EcsApi, EventsApi, FunctionApi, FunctionConfig, Observed,
    UpdateServiceRequest,
};
use cirrus_provisioner::{BoxFuture, Context, ProvisionerError, StateStore};
use serde_json::{Value, json};

fn object(value: Value) -> Observed {
    match value {
        Value::Object(map) => map,
        _ => Observed::new(),
    }
}

fn failure(operation: &str, message: &str) -> ProvisionerError {
    ProvisionerError::RemoteCall {
        operation: operation.to_string(),
        message: message.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EcsCall {
    DescribeService(String),
    CreateService(CreateServiceRequest),
    UpdateService(UpdateServiceRequest),
    DeleteService(String),
    ListTasks(String),
    StopTask(String),
    RegisterTaskDefinition(String),
    DeregisterTaskDefinition(String),
    DescribeTaskDefinition(String),
}

/// In-memory ECS: services keyed by name, task definitions by family.
#[derive(Default)]
pub struct MockEcs {
    calls: Mutex<Vec<EcsCall>>,
    services: Mutex<HashMap<String, Observed>>,
    revisions: Mutex<HashMap<String, i64>>,
    tasks: Mutex<Vec<String>>,
    failing_stops: Mutex<HashSet<String>>,
    fail_register: AtomicBool,
    fail_deregister: AtomicBool,
    fail_create: AtomicBool,
    stops_in_flight: AtomicUsize,
    peak_stops: AtomicUsize,
}

impl MockEcs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<EcsCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Tasks reported as attached to any service.
    pub fn set_tasks(&self, tasks: &[&str]) {
        *self.tasks.lock().unwrap() = tasks.iter().map(|t| t.to_string()).collect();
    }

    pub fn fail_stop(&self, task: &str) {
        self.failing_stops.lock().unwrap().insert(task.to_string());
    }

    pub fn fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deregister(&self, fail: bool) {
        self.fail_deregister.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Highest number of `stop_task` calls observed running at once.
    pub fn peak_concurrent_stops(&self) -> usize {
        self.peak_stops.load(Ordering::SeqCst)
    }

    pub fn service(&self, name: &str) -> Option<Observed> {
        self.services.lock().unwrap().get(name).cloned()
    }

    fn record(&self, call: EcsCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl EcsApi for MockEcs {
    fn describe_service<'a>(
        &'a self,
        _cluster: Option<&'a str>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>> {
        Box::pin(async move {
            self.record(EcsCall::DescribeService(service.to_string()));
            Ok(self.service(service))
        })
    }

    fn create_service<'a>(
        &'a self,
        request: &'a CreateServiceRequest,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>> {
        Box::pin(async move {
            self.record(EcsCall::CreateService(request.clone()));
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(failure("ecs:CreateService", "ClusterNotFoundException"));
            }
            let name = &request.service_name;
            let service = object(json!({
                "serviceName": name,
                "serviceArn": format!("arn:aws:ecs:us-east-1:123456789012:service/{name}"),
                "clusterArn": request.cluster.as_deref().unwrap_or("default"),
                "status": "ACTIVE",
                "desiredCount": request.desired_count.unwrap_or(0),
                "launchType": request.launch_type,
                "taskDefinition": request.task_definition,
            }));
            self.services
                .lock()
                .unwrap()
                .insert(name.clone(), service.clone());
            Ok(Some(service))
        })
    }

    fn update_service<'a>(
        &'a self,
        request: &'a UpdateServiceRequest,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>> {
        Box::pin(async move {
            self.record(EcsCall::UpdateService(request.clone()));
            let mut services = self.services.lock().unwrap();
            let Some(service) = services.get_mut(&request.service) else {
                return Err(failure("ecs:UpdateService", "ServiceNotFoundException"));
            };
            if let Some(count) = request.desired_count {
                service.insert("desiredCount".into(), json!(count));
            }
            if let Some(td) = &request.task_definition {
                service.insert("taskDefinition".into(), json!(td));
            }
            Ok(Some(service.clone()))
        })
    }

    fn delete_service<'a>(
        &'a self,
        _cluster: Option<&'a str>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(EcsCall::DeleteService(service.to_string()));
            self.services.lock().unwrap().remove(service);
            Ok(())
        })
    }

    fn list_tasks<'a>(
        &'a self,
        _cluster: Option<&'a str>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ProvisionerError>> {
        Box::pin(async move {
            self.record(EcsCall::ListTasks(service.to_string()));
            Ok(self.tasks.lock().unwrap().clone())
        })
    }

    fn stop_task<'a>(
        &'a self,
        _cluster: Option<&'a str>,
        task: &'a str,
        _reason: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(EcsCall::StopTask(task.to_string()));
            let running = self.stops_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_stops.fetch_max(running, Ordering::SeqCst);
            // Stay in flight long enough for every sibling stop to start.
            for _ in 0..8 {
                tokio::task::yield_now().await;
            }
            self.stops_in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.failing_stops.lock().unwrap().contains(task) {
                return Err(failure("ecs:StopTask", "task is already stopping"));
            }
            Ok(())
        })
    }

    fn register_task_definition<'a>(
        &'a self,
        spec: &'a TaskDefinitionSpec,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>> {
        Box::pin(async move {
            self.record(EcsCall::RegisterTaskDefinition(spec.family.clone()));
            if self.fail_register.load(Ordering::SeqCst) {
                return Err(failure("ecs:RegisterTaskDefinition", "invalid container definition"));
            }
            let mut revisions = self.revisions.lock().unwrap();
            let revision = revisions.entry(spec.family.clone()).or_insert(0);
            *revision += 1;
            Ok(Some(object(json!({
                "family": spec.family,
                "revision": *revision,
                "taskDefinitionArn": format!(
                    "arn:aws:ecs:us-east-1:123456789012:task-definition/{}:{}",
                    spec.family, revision
                ),
                "status": "ACTIVE",
            }))))
        })
    }

    fn deregister_task_definition<'a>(
        &'a self,
        task_definition: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(EcsCall::DeregisterTaskDefinition(task_definition.to_string()));
            if self.fail_deregister.load(Ordering::SeqCst) {
                return Err(failure("ecs:DeregisterTaskDefinition", "throttled"));
            }
            Ok(())
        })
    }

    fn describe_task_definition<'a>(
        &'a self,
        task_definition: &'a str,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>> {
        Box::pin(async move {
            self.record(EcsCall::DescribeTaskDefinition(task_definition.to_string()));
            let Some((family, revision)) = task_definition.rsplit_once(':') else {
                return Ok(None);
            };
            let Ok(revision) = revision.parse::<i64>() else {
                return Ok(None);
            };
            Ok(Some(object(json!({
                "family": family,
                "revision": revision,
                "status": "ACTIVE",
            }))))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionCall {
    Get(String),
    Create(String),
    UpdateCode(String),
    UpdateConfiguration(String),
    Delete(String),
    AllowInvoke(String),
}

/// In-memory function service keyed by function name.
#[derive(Default)]
pub struct MockFunctions {
    calls: Mutex<Vec<FunctionCall>>,
    functions: Mutex<HashMap<String, Observed>>,
    code_sizes: Mutex<HashMap<String, usize>>,
}

impl MockFunctions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<FunctionCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn exists(&self, name: &str) -> bool {
        self.functions.lock().unwrap().contains_key(name)
    }

    /// Delete a function behind the driver's back.
    pub fn delete_out_of_band(&self, name: &str) {
        self.functions.lock().unwrap().remove(name);
    }

    pub fn code_size(&self, name: &str) -> Option<usize> {
        self.code_sizes.lock().unwrap().get(name).copied()
    }

    fn record(&self, call: FunctionCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn store(&self, config: &FunctionConfig) -> Observed {
        let name = &config.function_name;
        let function = object(json!({
            "name": name,
            "arn": format!("arn:aws:lambda:us-east-1:123456789012:function:{name}"),
            "handler": config.handler,
            "runtime": config.runtime,
            "roleArn": config.role,
            "memory": config.memory_size.unwrap_or(128),
            "timeout": config.timeout.unwrap_or(3),
        }));
        self.functions
            .lock()
            .unwrap()
            .insert(name.clone(), function.clone());
        function
    }
}

impl FunctionApi for MockFunctions {
    fn get_function<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<Observed>, ProvisionerError>> {
        Box::pin(async move {
            self.record(FunctionCall::Get(name.to_string()));
            Ok(self.functions.lock().unwrap().get(name).cloned())
        })
    }

    fn create_function<'a>(
        &'a self,
        config: &'a FunctionConfig,
        code: &'a [u8],
    ) -> BoxFuture<'a, Result<Observed, ProvisionerError>> {
        Box::pin(async move {
            self.record(FunctionCall::Create(config.function_name.clone()));
            if self.exists(&config.function_name) {
                return Err(failure("lambda:CreateFunction", "ResourceConflictException"));
            }
            self.code_sizes
                .lock()
                .unwrap()
                .insert(config.function_name.clone(), code.len());
            Ok(self.store(config))
        })
    }

    fn update_function_code<'a>(
        &'a self,
        name: &'a str,
        code: &'a [u8],
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(FunctionCall::UpdateCode(name.to_string()));
            self.code_sizes
                .lock()
                .unwrap()
                .insert(name.to_string(), code.len());
            Ok(())
        })
    }

    fn update_function_configuration<'a>(
        &'a self,
        config: &'a FunctionConfig,
    ) -> BoxFuture<'a, Result<Observed, ProvisionerError>> {
        Box::pin(async move {
            self.record(FunctionCall::UpdateConfiguration(config.function_name.clone()));
            Ok(self.store(config))
        })
    }

    fn delete_function<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(FunctionCall::Delete(name.to_string()));
            match self.functions.lock().unwrap().remove(name) {
                Some(_) => Ok(()),
                None => Err(ProvisionerError::ResourceNotFound {
                    resource_type: "AwsFargateFunction".to_string(),
                    resource_id: name.to_string(),
                }),
            }
        })
    }

    fn allow_invoke<'a>(
        &'a self,
        name: &'a str,
        _statement_id: &'a str,
        _source_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(FunctionCall::AllowInvoke(name.to_string()));
            Ok(())
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventsCall {
    PutRule { rule: String, expression: String },
    PutTarget { rule: String, target: String },
    DeleteRule(String),
}

/// In-memory scheduler: rule name to (expression, target ARN).
#[derive(Default)]
pub struct MockEvents {
    calls: Mutex<Vec<EventsCall>>,
    rules: Mutex<HashMap<String, (String, Option<String>)>>,
    fail_put_rule: AtomicBool,
}

impl MockEvents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<EventsCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_put_rule(&self, fail: bool) {
        self.fail_put_rule.store(fail, Ordering::SeqCst);
    }

    /// Expression and target of `rule`, if it exists.
    pub fn rule(&self, rule: &str) -> Option<(String, Option<String>)> {
        self.rules.lock().unwrap().get(rule).cloned()
    }

    fn record(&self, call: EventsCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl EventsApi for MockEvents {
    fn put_schedule_rule<'a>(
        &'a self,
        rule: &'a str,
        expression: &'a str,
    ) -> BoxFuture<'a, Result<String, ProvisionerError>> {
        Box::pin(async move {
            self.record(EventsCall::PutRule {
                rule: rule.to_string(),
                expression: expression.to_string(),
            });
            if self.fail_put_rule.load(Ordering::SeqCst) {
                return Err(failure("events:PutRule", "ValidationException"));
            }
            let mut rules = self.rules.lock().unwrap();
            let entry = rules.entry(rule.to_string()).or_insert((String::new(), None));
            entry.0 = expression.to_string();
            Ok(format!("arn:aws:events:us-east-1:123456789012:rule/{rule}"))
        })
    }

    fn put_target<'a>(
        &'a self,
        rule: &'a str,
        target_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(EventsCall::PutTarget {
                rule: rule.to_string(),
                target: target_arn.to_string(),
            });
            match self.rules.lock().unwrap().get_mut(rule) {
                Some(entry) => {
                    entry.1 = Some(target_arn.to_string());
                    Ok(())
                }
                None => Err(failure("events:PutTargets", "ResourceNotFoundException")),
            }
        })
    }

    fn delete_rule<'a>(&'a self, rule: &'a str) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record(EventsCall::DeleteRule(rule.to_string()));
            self.rules.lock().unwrap().remove(rule);
            Ok(())
        })
    }
}

/// In-memory [`StateStore`] with a write counter.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<ResourceAddr, PersistedState>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self, addr: &ResourceAddr) -> PersistedState {
        self.entries
            .lock()
            .unwrap()
            .get(addr)
            .cloned()
            .unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl StateStore for MemoryStore {
    fn get_state<'a>(
        &'a self,
        addr: &'a ResourceAddr,
    ) -> BoxFuture<'a, Result<PersistedState, ProvisionerError>> {
        Box::pin(async move { Ok(self.state(addr)) })
    }

    fn save_state<'a>(
        &'a self,
        addr: &'a ResourceAddr,
        state: PersistedState,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.saves.fetch_add(1, Ordering::SeqCst);
            let mut entries = self.entries.lock().unwrap();
            if state.is_empty() {
                entries.remove(addr);
            } else {
                entries.insert(addr.clone(), state);
            }
            Ok(())
        })
    }
}

pub fn context(resource_type: &str, instance_id: &str, store: &Arc<MemoryStore>) -> Context {
    let store: Arc<dyn StateStore> = store.clone();
    Context::new(ResourceAddr::new(resource_type, instance_id), store)
}

/// A minimal function source tree under `dir`.
pub fn write_function_source(dir: &Path) {
    std::fs::create_dir_all(dir.join("lib")).unwrap();
    std::fs::write(dir.join("index.js"), "exports.handler = async () => 'ok';\n").unwrap();
    std::fs::write(dir.join("lib/util.js"), "module.exports = {};\n").unwrap();
}
