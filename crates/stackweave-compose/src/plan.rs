//! The synthesized resource plan.
//!
//! A plan is the ordered list of frozen descriptors produced by one
//! composition. It is handed to the realization engine as-is; the same
//! declared input always yields the same plan and the same fingerprint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stackweave_common::error::Result;
use stackweave_common::types::{Fingerprint, ResourceId, ResourceKind};

use crate::descriptor::ResourceDescriptor;
use crate::stack::Export;

/// One resource in plan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Stack that owns the resource.
    pub stack: String,
    /// Frozen descriptor with imports bound.
    pub descriptor: ResourceDescriptor,
    /// Resources that must be realized before this one.
    pub depends_on: Vec<ResourceId>,
}

/// Ordered output of a composition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Plan {
    /// Stacks in realization order.
    pub stack_order: Vec<String>,
    /// Resources in realization order.
    pub steps: Vec<PlanStep>,
    /// Exports of every stack, keyed by `<stack>.<export>`.
    pub exports: BTreeMap<String, Export>,
}

impl Plan {
    /// Returns the step for a resource.
    #[must_use]
    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.descriptor.id().as_str() == id)
    }

    /// Returns the position of a resource in plan order.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.descriptor.id().as_str() == id)
    }

    /// Returns the steps owned by a stack, in plan order.
    pub fn steps_for<'a>(&'a self, stack: &'a str) -> impl Iterator<Item = &'a PlanStep> + 'a {
        self.steps.iter().filter(move |s| s.stack == stack)
    }

    /// Returns the descriptors of one kind, in plan order.
    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceDescriptor> {
        self.steps
            .iter()
            .map(|s| &s.descriptor)
            .filter(move |d| d.kind() == kind)
    }

    /// Returns the number of resources in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns whether the plan declares no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Serializes the plan to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Computes the SHA-256 fingerprint of the plan's canonical JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        let canonical = serde_json::to_vec(self)?;
        let digest = Sha256::digest(&canonical);
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Fingerprint::from_hex(hex)
    }
}
