//! Integration tests for realizing composed plans.
//!
//! Covers:
//! 1. Cross-stack plans realized through the local provider
//! 2. Idempotent re-apply
//! 3. Provider failures aborting the apply with their retry hint

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Mutex;

use stackweave_common::config::ProviderConfig;
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::{ResourceId, ResourceKind};
use stackweave_compose::composer::Composer;
use stackweave_compose::descriptor::{AttributeValue, DescriptorBuilder, ResourceDescriptor};
use stackweave_compose::plan::Plan;
use stackweave_compose::reference::Outputs;
use stackweave_compose::stack::StackBuilder;
use stackweave_runtime::engine::Engine;
use stackweave_runtime::provider::local::LocalProvider;
use stackweave_runtime::provider::{Change, Provider, Realization, ResolvedAttributes};

fn registry_and_compute(tag: &str) -> Plan {
    let mut registry = StackBuilder::new("registry");
    let repo = registry
        .add(DescriptorBuilder::new("Repo", ResourceKind::Repository).attribute("repositoryName", "app"))
        .expect("repo");
    registry
        .export("repositoryUri", &repo, "repositoryUri")
        .expect("export");

    let mut compute = StackBuilder::new("compute");
    let uri = compute
        .import("repositoryUri", "registry", "repositoryUri", ResourceKind::Repository)
        .expect("import");
    let _ = compute
        .add(
            DescriptorBuilder::new("TaskDef", ResourceKind::TaskDefinition)
                .attribute("family", "app")
                .attribute("image", AttributeValue::join([uri, ":".into(), tag.into()])),
        )
        .expect("task");

    Composer::new()
        .with_stack(compute.build().expect("compute"))
        .with_stack(registry.build().expect("registry"))
        .compose()
        .expect("compose")
}

fn local(dir: &tempfile::TempDir) -> LocalProvider {
    LocalProvider::open(dir.path().join("state.json"), &ProviderConfig::default()).expect("open")
}

// ── Cross-stack realization ─────────────────────────────────────────

#[test]
fn imported_uri_flows_into_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let provider = local(&dir);
    let plan = registry_and_compute("v2");
    let engine = Engine::new(Box::new(provider));
    let deployment = engine.apply(&plan).expect("apply");

    let uri = deployment.exports["registry.repositoryUri"]
        .as_str()
        .expect("uri")
        .to_string();
    assert!(uri.ends_with("/app"), "got: {uri}");

    let attributes = plan
        .step("TaskDef")
        .expect("task")
        .descriptor
        .resolve_attributes(deployment.realized())
        .expect("resolve");
    assert_eq!(attributes["image"], serde_json::json!(format!("{uri}:v2")));
}

// ── Idempotence ─────────────────────────────────────────────────────

#[test]
fn second_apply_is_unchanged_and_keeps_physical_ids() {
    let dir = tempfile::tempdir().expect("tempdir");
    let plan = registry_and_compute("v2");

    let first = Engine::new(Box::new(local(&dir))).apply(&plan).expect("first");
    assert_eq!(first.count(Change::Created), plan.len());

    let second = Engine::new(Box::new(local(&dir))).apply(&plan).expect("second");
    assert_eq!(second.count(Change::Unchanged), plan.len());
    for resource in &first.resources {
        let again = second.resource(resource.id.as_str()).expect("resource");
        assert_eq!(again.physical_id, resource.physical_id);
    }
}

#[test]
fn new_image_tag_updates_only_the_task_definition() {
    let dir = tempfile::tempdir().expect("tempdir");
    let _ = Engine::new(Box::new(local(&dir)))
        .apply(&registry_and_compute("v1"))
        .expect("v1");
    let deployment = Engine::new(Box::new(local(&dir)))
        .apply(&registry_and_compute("v2"))
        .expect("v2");
    assert_eq!(deployment.resource("Repo").expect("repo").change, Change::Unchanged);
    assert_eq!(deployment.resource("TaskDef").expect("task").change, Change::Updated);
}

#[test]
fn outputs_reads_exports_from_provider_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let plan = registry_and_compute("v2");
    let engine = Engine::new(Box::new(local(&dir)));
    assert!(engine.outputs(&plan).expect("before").is_empty());
    let _ = engine.apply(&plan).expect("apply");
    let outputs = Engine::new(Box::new(local(&dir))).outputs(&plan).expect("after");
    assert!(outputs.contains_key("registry.repositoryUri"));
}

#[test]
fn outputs_reports_an_export_the_realized_resource_lacks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut registry = StackBuilder::new("registry");
    let repo = registry
        .add(DescriptorBuilder::new("Repo", ResourceKind::Repository).attribute("repositoryName", "app"))
        .expect("repo");
    registry.export("missing", &repo, "noSuchAttribute").expect("export");
    let plan = Composer::new()
        .with_stack(registry.build().expect("registry"))
        .compose()
        .expect("compose");

    let apply_err = Engine::new(Box::new(local(&dir))).apply(&plan).unwrap_err();
    assert!(matches!(apply_err, StackweaveError::NotFound { .. }), "got: {apply_err}");

    let err = Engine::new(Box::new(local(&dir))).outputs(&plan).unwrap_err();
    assert!(err.to_string().contains("Repo.noSuchAttribute"), "got: {err}");
}

// ── Provider failures ───────────────────────────────────────────────

struct FailingProvider {
    fail_on: &'static str,
    retryable: bool,
    calls: Mutex<Vec<String>>,
}

impl Provider for FailingProvider {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn realize(
        &self,
        descriptor: &ResourceDescriptor,
        _attributes: &ResolvedAttributes,
    ) -> Result<Realization> {
        self.calls.lock().unwrap().push(descriptor.id().to_string());
        if descriptor.id().as_str() == self.fail_on {
            return Err(StackweaveError::Provider {
                resource: descriptor.id().to_string(),
                message: "throttled".into(),
                retryable: self.retryable,
            });
        }
        let mut attributes = Outputs::new();
        let _ = attributes.insert(
            "repositoryUri".into(),
            serde_json::json!("000000000000.dkr.ecr.us-east-1.amazonaws.com/app"),
        );
        Ok(Realization {
            physical_id: format!("fake-{}", descriptor.id()),
            attributes,
            change: Change::Created,
        })
    }

    fn destroy(&self, _id: &ResourceId) -> Result<bool> {
        Ok(true)
    }

    fn outputs(&self, _id: &ResourceId) -> Result<Option<Outputs>> {
        Ok(None)
    }
}

#[test]
fn provider_failure_aborts_and_keeps_retry_hint() {
    for retryable in [true, false] {
        let provider = FailingProvider {
            fail_on: "Repo",
            retryable,
            calls: Mutex::new(Vec::new()),
        };
        let engine = Engine::new(Box::new(provider));
        let err = engine.apply(&registry_and_compute("v2")).unwrap_err();
        assert_eq!(err.is_retryable(), retryable);
        assert!(err.to_string().contains("Repo"), "got: {err}");
    }
}

#[test]
fn steps_after_a_failure_are_not_attempted() {
    let provider = std::sync::Arc::new(FailingProvider {
        fail_on: "Repo",
        retryable: true,
        calls: Mutex::new(Vec::new()),
    });

    struct Shared(std::sync::Arc<FailingProvider>);
    impl Provider for Shared {
        fn name(&self) -> &'static str {
            self.0.name()
        }
        fn realize(
            &self,
            descriptor: &ResourceDescriptor,
            attributes: &ResolvedAttributes,
        ) -> Result<Realization> {
            self.0.realize(descriptor, attributes)
        }
        fn destroy(&self, id: &ResourceId) -> Result<bool> {
            self.0.destroy(id)
        }
        fn outputs(&self, id: &ResourceId) -> Result<Option<Outputs>> {
            self.0.outputs(id)
        }
    }

    let engine = Engine::new(Box::new(Shared(std::sync::Arc::clone(&provider))));
    assert!(engine.apply(&registry_and_compute("v2")).is_err());
    assert_eq!(*provider.calls.lock().unwrap(), vec!["Repo".to_string()]);
}
