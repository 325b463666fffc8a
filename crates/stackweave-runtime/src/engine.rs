//! Realization engine that walks a plan against a provider.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use stackweave_common::error::Result;
use stackweave_common::types::{ResourceId, ResourceKind};
use stackweave_compose::plan::Plan;
use stackweave_compose::reference::Realized;

use crate::provider::{Change, Provider};

/// Result of realizing one plan step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealizedResource {
    /// Logical identifier.
    pub id: ResourceId,
    /// Owning stack.
    pub stack: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Identifier assigned by the provider.
    pub physical_id: String,
    /// What the provider did.
    pub change: Change,
}

/// Outcome of a successful apply.
#[derive(Debug, Clone)]
pub struct Deployment {
    /// Realized resources in plan order.
    pub resources: Vec<RealizedResource>,
    /// Stack exports resolved to concrete values, keyed by `<stack>.<export>`.
    pub exports: BTreeMap<String, Value>,
    realized: Realized,
}

impl Deployment {
    /// Returns how many resources saw the given change.
    #[must_use]
    pub fn count(&self, change: Change) -> usize {
        self.resources.iter().filter(|r| r.change == change).count()
    }

    /// Returns the realized resource with the given logical id.
    #[must_use]
    pub fn resource(&self, id: &str) -> Option<&RealizedResource> {
        self.resources.iter().find(|r| r.id.as_str() == id)
    }

    /// Returns one output attribute of a realized resource.
    #[must_use]
    pub fn output(&self, id: &str, attribute: &str) -> Option<&Value> {
        self.realized
            .get(&ResourceId::new(id))
            .and_then(|outputs| outputs.get(attribute))
    }

    /// Returns the resolved attributes of the realized outputs.
    #[must_use]
    pub const fn realized(&self) -> &Realized {
        &self.realized
    }
}

/// The engine that coordinates realization.
///
/// Walks plan steps strictly in order, so every reference target has been
/// realized before it is resolved. The first provider error aborts the
/// apply and is returned unchanged.
pub struct Engine {
    provider: Box<dyn Provider>,
}

impl Engine {
    /// Creates an engine over the given provider.
    #[must_use]
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Returns the provider's name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Realizes every step of the plan.
    ///
    /// # Errors
    ///
    /// Returns the first resolution or provider error.
    pub fn apply(&self, plan: &Plan) -> Result<Deployment> {
        tracing::info!(provider = self.provider.name(), resources = plan.len(), "applying plan");
        let mut realized = Realized::new();
        let mut resources = Vec::with_capacity(plan.len());

        for step in &plan.steps {
            let descriptor = &step.descriptor;
            let attributes = descriptor.resolve_attributes(&realized)?;
            let realization = self
                .provider
                .realize(descriptor, &attributes)
                .inspect_err(|e| {
                    tracing::error!(
                        id = %descriptor.id(),
                        retryable = e.is_retryable(),
                        error = %e,
                        "realization failed, aborting apply"
                    );
                })?;
            tracing::info!(
                stack = %step.stack,
                id = %descriptor.id(),
                kind = %descriptor.kind(),
                change = %realization.change,
                "step realized"
            );
            realized.insert(descriptor.id().clone(), realization.attributes);
            resources.push(RealizedResource {
                id: descriptor.id().clone(),
                stack: step.stack.clone(),
                kind: descriptor.kind(),
                physical_id: realization.physical_id,
                change: realization.change,
            });
        }

        let exports = resolve_exports(plan, &realized)?;
        Ok(Deployment {
            resources,
            exports,
            realized,
        })
    }

    /// Destroys every resource of the plan in reverse order.
    ///
    /// Returns the ids that were actually removed.
    ///
    /// # Errors
    ///
    /// Returns the first provider error.
    pub fn destroy(&self, plan: &Plan) -> Result<Vec<ResourceId>> {
        tracing::info!(provider = self.provider.name(), resources = plan.len(), "destroying plan");
        let mut removed = Vec::new();
        for step in plan.steps.iter().rev() {
            let id = step.descriptor.id();
            if self.provider.destroy(id)? {
                removed.push(id.clone());
            }
        }
        Ok(removed)
    }

    /// Resolves stack exports from what the provider has already realized.
    ///
    /// Exports whose resource was never realized are omitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider state cannot be read or a realized
    /// resource does not report the exported attribute.
    pub fn outputs(&self, plan: &Plan) -> Result<BTreeMap<String, Value>> {
        let mut realized = Realized::new();
        for export in plan.exports.values() {
            let target = export.reference.target();
            if let Some(outputs) = self.provider.outputs(target)? {
                realized.insert(target.clone(), outputs);
            }
        }

        let mut exports = BTreeMap::new();
        for (name, export) in &plan.exports {
            if !realized.contains(export.reference.target()) {
                tracing::debug!(export = %name, "export target not realized yet");
                continue;
            }
            let _ = exports.insert(name.clone(), export.reference.resolve(&realized)?);
        }
        Ok(exports)
    }
}

fn resolve_exports(plan: &Plan, realized: &Realized) -> Result<BTreeMap<String, Value>> {
    plan.exports
        .iter()
        .map(|(name, export)| Ok((name.clone(), export.reference.resolve(realized)?)))
        .collect()
}
