//! Function driver contract: packaging before any remote call, identity
//! transitions, and idempotent removal.

mod common;

use std::collections::BTreeMap;
use std::path::Path;

use cirrus_core::spec::{CodeSource, FunctionSpec};
use cirrus_core::{Instance, ResourceAddr};
use cirrus_provisioner::resources::{FUNCTION_OUTPUT_FIELDS, FunctionDriver, schedule_rule_name};
use cirrus_provisioner::{Driver, PackagingError, ProvisionerError};
use common::{
    EventsCall, FunctionCall, MemoryStore, MockEvents, MockFunctions, context,
    write_function_source,
};
use serde_json::{Value, json};

fn spec(name: Option<&str>, code: &Path) -> FunctionSpec {
    FunctionSpec {
        name: name.map(String::from),
        handler: "index.handler".into(),
        runtime: "nodejs18.x".into(),
        role: "arn:aws:iam::123456789012:role/fn".into(),
        memory: Some(256),
        timeout: Some(10),
        description: None,
        environment: BTreeMap::from([("STAGE".to_string(), "prod".to_string())]),
        code: CodeSource::Directory(code.to_path_buf()),
        schedule: None,
    }
}

fn scheduled(name: &str, code: &Path, expression: &str) -> FunctionSpec {
    FunctionSpec {
        schedule: Some(expression.into()),
        ..spec(Some(name), code)
    }
}

fn addr() -> ResourceAddr {
    ResourceAddr::new("AwsFargateFunction", "resize")
}

#[tokio::test]
async fn packaging_failure_makes_no_remote_calls() {
    let functions = MockFunctions::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), MockEvents::new());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");

    let err = driver
        .deploy(&spec(Some("resize"), &missing), None, &ctx)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProvisionerError::Packaging(PackagingError::SourceNotFound(_))
    ));
    assert!(functions.calls().is_empty());
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn deploy_creates_then_updates_code_before_configuration() {
    let functions = MockFunctions::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), MockEvents::new());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    write_function_source(dir.path());

    let created = driver
        .deploy(&spec(Some("resize"), dir.path()), None, &ctx)
        .await
        .unwrap();
    assert_eq!(functions.calls(), vec![FunctionCall::Create("resize".into())]);
    assert!(functions.code_size("resize").is_some_and(|n| n > 0));
    assert_eq!(created.str_field("name"), Some("resize"));
    assert_eq!(store.state(&addr()).str_field("name"), Some("resize"));

    functions.clear_calls();
    driver
        .deploy(&spec(Some("resize"), dir.path()), Some(&created), &ctx)
        .await
        .unwrap();
    assert_eq!(
        functions.calls(),
        vec![
            FunctionCall::UpdateCode("resize".into()),
            FunctionCall::UpdateConfiguration("resize".into()),
        ]
    );
}

#[tokio::test]
async fn rename_deletes_old_function_before_creating_new() {
    let functions = MockFunctions::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), MockEvents::new());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    write_function_source(dir.path());

    driver
        .deploy(&spec(Some("a"), dir.path()), None, &ctx)
        .await
        .unwrap();
    functions.clear_calls();
    let instance = driver
        .deploy(&spec(Some("b"), dir.path()), None, &ctx)
        .await
        .unwrap();

    assert_eq!(
        functions.calls(),
        vec![FunctionCall::Delete("a".into()), FunctionCall::Create("b".into())]
    );
    assert!(!functions.exists("a"));
    assert_eq!(instance.str_field("name"), Some("b"));
}

#[tokio::test]
async fn dropping_the_name_deletes_the_function() {
    let functions = MockFunctions::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), MockEvents::new());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    write_function_source(dir.path());

    driver
        .deploy(&spec(Some("resize"), dir.path()), None, &ctx)
        .await
        .unwrap();
    functions.clear_calls();
    let instance = driver
        .deploy(&spec(None, dir.path()), None, &ctx)
        .await
        .unwrap();

    assert_eq!(functions.calls(), vec![FunctionCall::Delete("resize".into())]);
    assert_eq!(instance.get("arn"), Some(&Value::Null));
    assert!(store.state(&addr()).is_empty());
}

#[tokio::test]
async fn no_name_and_nothing_recorded_is_a_no_op() {
    let functions = MockFunctions::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), MockEvents::new());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    write_function_source(dir.path());

    driver
        .deploy(&spec(None, dir.path()), None, &ctx)
        .await
        .unwrap();

    assert!(functions.calls().is_empty());
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn previous_instance_name_is_used_when_nothing_is_recorded() {
    let functions = MockFunctions::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), MockEvents::new());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    write_function_source(dir.path());

    let previous: Instance = serde_json::from_value(json!({"name": "legacy"})).unwrap();
    driver
        .deploy(&spec(Some("resize"), dir.path()), Some(&previous), &ctx)
        .await
        .unwrap();

    // The legacy function is already gone; its delete is tolerated.
    assert_eq!(
        functions.calls(),
        vec![
            FunctionCall::Delete("legacy".into()),
            FunctionCall::Create("resize".into()),
        ]
    );
}

#[tokio::test]
async fn remove_tolerates_out_of_band_deletion() {
    let functions = MockFunctions::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), MockEvents::new());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    write_function_source(dir.path());
    let spec = spec(Some("resize"), dir.path());

    driver.deploy(&spec, None, &ctx).await.unwrap();
    functions.delete_out_of_band("resize");

    let instance = driver.remove(&spec, None, &ctx).await.unwrap();

    for field in FUNCTION_OUTPUT_FIELDS {
        assert_eq!(instance.get(field), Some(&Value::Null), "{field} should be null");
    }
    assert!(store.state(&addr()).is_empty());

    functions.clear_calls();
    let again = driver.remove(&spec, None, &ctx).await.unwrap();
    assert!(functions.calls().is_empty());
    assert!(again.is_empty());
}

#[tokio::test]
async fn sink_config_points_at_function_arn() {
    let functions = MockFunctions::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), MockEvents::new());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    write_function_source(dir.path());

    let instance = driver
        .deploy(&spec(Some("resize"), dir.path()), None, &ctx)
        .await
        .unwrap();

    let sink = driver.sink_config(&instance).unwrap();
    assert_eq!(sink.uri, "arn:aws:lambda:us-east-1:123456789012:function:resize");
    assert_eq!(sink.protocol, "AwsFargateFunction");
    assert!(driver.sink_config(&Instance::empty()).is_none());
}

#[tokio::test]
async fn get_after_deploy_reports_the_same_function() {
    let functions = MockFunctions::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), MockEvents::new());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    write_function_source(dir.path());
    let spec = spec(Some("resize"), dir.path());

    let deployed = driver.deploy(&spec, None, &ctx).await.unwrap();
    let recorded = store.state(&addr());
    functions.clear_calls();

    let fetched = driver.get(&spec, Some(&deployed), &ctx).await.unwrap();

    assert_eq!(functions.calls(), vec![FunctionCall::Get("resize".into())]);
    for field in ["name", "arn", "handler", "runtime", "roleArn", "memory", "timeout"] {
        assert_eq!(fetched.get(field), deployed.get(field), "{field}");
    }
    assert_eq!(store.state(&addr()), recorded);
}

#[tokio::test]
async fn schedule_is_attached_after_the_function_exists() {
    let functions = MockFunctions::new();
    let events = MockEvents::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), events.clone());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    write_function_source(dir.path());

    let instance = driver
        .deploy(&scheduled("resize", dir.path(), "rate(5 minutes)"), None, &ctx)
        .await
        .unwrap();

    let rule = schedule_rule_name("resize");
    let arn = "arn:aws:lambda:us-east-1:123456789012:function:resize";
    assert_eq!(
        functions.calls(),
        vec![
            FunctionCall::Create("resize".into()),
            FunctionCall::AllowInvoke("resize".into()),
        ]
    );
    assert_eq!(
        events.calls(),
        vec![
            EventsCall::PutRule {
                rule: rule.clone(),
                expression: "rate(5 minutes)".into(),
            },
            EventsCall::PutTarget {
                rule: rule.clone(),
                target: arn.into(),
            },
        ]
    );
    assert_eq!(
        events.rule(&rule),
        Some(("rate(5 minutes)".to_string(), Some(arn.to_string())))
    );
    assert_eq!(instance.str_field("scheduleRule"), Some(rule.as_str()));
    assert_eq!(store.state(&addr()).str_field("scheduleRule"), Some(rule.as_str()));
}

#[tokio::test]
async fn packaging_failure_leaves_schedule_untouched() {
    let functions = MockFunctions::new();
    let events = MockEvents::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), events.clone());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();

    driver
        .deploy(&scheduled("resize", &dir.path().join("missing"), "rate(1 day)"), None, &ctx)
        .await
        .unwrap_err();

    assert!(events.calls().is_empty());
    assert!(functions.calls().is_empty());
}

#[tokio::test]
async fn dropping_the_schedule_deletes_the_rule() {
    let functions = MockFunctions::new();
    let events = MockEvents::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), events.clone());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    write_function_source(dir.path());

    driver
        .deploy(&scheduled("resize", dir.path(), "rate(1 hour)"), None, &ctx)
        .await
        .unwrap();
    events.clear_calls();

    driver
        .deploy(&spec(Some("resize"), dir.path()), None, &ctx)
        .await
        .unwrap();

    let rule = schedule_rule_name("resize");
    assert_eq!(events.calls(), vec![EventsCall::DeleteRule(rule.clone())]);
    assert!(events.rule(&rule).is_none());
    assert_eq!(store.state(&addr()).str_field("scheduleRule"), None);
}

#[tokio::test]
async fn remove_deletes_schedule_before_function() {
    let functions = MockFunctions::new();
    let events = MockEvents::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), events.clone());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    write_function_source(dir.path());
    let spec = scheduled("resize", dir.path(), "cron(0 12 * * ? *)");

    driver.deploy(&spec, None, &ctx).await.unwrap();
    events.clear_calls();
    functions.clear_calls();

    driver.remove(&spec, None, &ctx).await.unwrap();

    let rule = schedule_rule_name("resize");
    assert_eq!(events.calls(), vec![EventsCall::DeleteRule(rule.clone())]);
    assert_eq!(functions.calls(), vec![FunctionCall::Delete("resize".into())]);
    assert!(events.rule(&rule).is_none());
    assert!(store.state(&addr()).is_empty());
}

#[tokio::test]
async fn rename_moves_schedule_to_new_function() {
    let functions = MockFunctions::new();
    let events = MockEvents::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), events.clone());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    write_function_source(dir.path());

    driver
        .deploy(&scheduled("a", dir.path(), "rate(1 hour)"), None, &ctx)
        .await
        .unwrap();
    events.clear_calls();
    functions.clear_calls();

    driver
        .deploy(&scheduled("b", dir.path(), "rate(1 hour)"), None, &ctx)
        .await
        .unwrap();

    let old_rule = schedule_rule_name("a");
    let new_rule = schedule_rule_name("b");
    assert_eq!(events.calls()[0], EventsCall::DeleteRule(old_rule.clone()));
    assert_eq!(functions.calls()[0], FunctionCall::Delete("a".into()));
    assert!(events.rule(&old_rule).is_none());
    assert_eq!(
        events.rule(&new_rule).and_then(|(_, target)| target).as_deref(),
        Some("arn:aws:lambda:us-east-1:123456789012:function:b")
    );
    assert_eq!(store.state(&addr()).str_field("scheduleRule"), Some(new_rule.as_str()));
}

#[tokio::test]
async fn get_keeps_the_recorded_schedule() {
    let functions = MockFunctions::new();
    let events = MockEvents::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), events.clone());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    write_function_source(dir.path());
    let spec = scheduled("resize", dir.path(), "rate(1 hour)");

    driver.deploy(&spec, None, &ctx).await.unwrap();
    events.clear_calls();

    driver.get(&spec, None, &ctx).await.unwrap();

    assert!(events.calls().is_empty());
    let rule = schedule_rule_name("resize");
    assert_eq!(store.state(&addr()).str_field("scheduleRule"), Some(rule.as_str()));
}

#[tokio::test]
async fn failed_schedule_still_records_the_function() {
    let functions = MockFunctions::new();
    let events = MockEvents::new();
    let store = MemoryStore::new();
    let driver = FunctionDriver::new(functions.clone(), events.clone());
    let ctx = context("AwsFargateFunction", "resize", &store);
    let dir = tempfile::tempdir().unwrap();
    write_function_source(dir.path());
    events.fail_put_rule(true);

    let err = driver
        .deploy(&scheduled("resize", dir.path(), "rate(bogus)"), None, &ctx)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("ValidationException"), "{err}");
    let state = store.state(&addr());
    assert_eq!(state.str_field("name"), Some("resize"));
    assert_eq!(state.str_field("scheduleRule"), None);

    // The retry updates the existing function instead of recreating it.
    events.fail_put_rule(false);
    functions.clear_calls();
    driver
        .deploy(&scheduled("resize", dir.path(), "rate(1 hour)"), None, &ctx)
        .await
        .unwrap();
    assert_eq!(functions.calls()[0], FunctionCall::UpdateCode("resize".into()));
}
