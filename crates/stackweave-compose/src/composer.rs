//! Topology composition.
//!
//! Orders stacks by their imports, binds each import to the exporting
//! stack's reference, orders every stack's resources, and concatenates the
//! result into one [`Plan`]. All checks run here, before any provider call.

use std::collections::{BTreeMap, BTreeSet};

use stackweave_common::error::{Result, StackweaveError};

use crate::graph::{DependencyGraph, order_descriptors};
use crate::plan::{Plan, PlanStep};
use crate::reference::Reference;
use crate::stack::{Export, Stack};

/// Assembles stacks into a single ordered plan.
#[derive(Debug, Default)]
pub struct Composer {
    stacks: Vec<Stack>,
}

impl Composer {
    /// Creates a composer with no stacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stack. Declaration order breaks ties between independent
    /// stacks.
    #[must_use]
    pub fn with_stack(mut self, stack: Stack) -> Self {
        self.stacks.push(stack);
        self
    }

    /// Adds a stack in place.
    pub fn add_stack(&mut self, stack: Stack) {
        self.stacks.push(stack);
    }

    /// Returns the declared stacks.
    #[must_use]
    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// Synthesizes the plan.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateResource` for repeated stack names or resource
    /// ids, `UnresolvedExport` for an import nobody provides,
    /// `ExportTypeMismatch` for an import of the wrong kind, and
    /// `CyclicDependency` for cycles between stacks or between resources.
    pub fn compose(&self) -> Result<Plan> {
        tracing::info!(stacks = self.stacks.len(), "composing topology");
        self.check_unique_identifiers()?;

        let stack_order = self.resolve_stack_order()?;
        tracing::info!(order = ?stack_order, "stack order resolved");

        let mut published: BTreeMap<String, Export> = BTreeMap::new();
        let mut steps = Vec::new();

        for name in &stack_order {
            let Some(stack) = self.stacks.iter().find(|s| s.name() == name) else {
                continue;
            };
            let stack_steps = synthesize_stack(stack, &published)?;
            tracing::info!(stack = %name, resources = stack_steps.len(), "stack synthesized");
            steps.extend(stack_steps);

            for export in stack.exports().values() {
                let _ = published.insert(format!("{name}.{}", export.name), export.clone());
            }
        }

        Ok(Plan {
            stack_order,
            steps,
            exports: published,
        })
    }

    fn check_unique_identifiers(&self) -> Result<()> {
        let mut stack_names = BTreeSet::new();
        let mut resource_ids = BTreeSet::new();
        for stack in &self.stacks {
            if !stack_names.insert(stack.name()) {
                return Err(StackweaveError::DuplicateResource {
                    kind: "stack",
                    id: stack.name().to_string(),
                });
            }
            for resource in stack.resources() {
                if !resource_ids.insert(resource.id()) {
                    return Err(StackweaveError::DuplicateResource {
                        kind: "resource",
                        id: format!("{} (in stack \"{}\")", resource.id(), stack.name()),
                    });
                }
            }
        }
        Ok(())
    }

    /// Validates every import against the exporting stack and orders
    /// stacks so that exporters come before importers.
    fn resolve_stack_order(&self) -> Result<Vec<String>> {
        let mut graph = DependencyGraph::new();
        for stack in &self.stacks {
            let _ = graph.add_node(stack.name());
        }

        for stack in &self.stacks {
            let consumer = graph.add_node(stack.name());
            for import in stack.imports() {
                let export = self
                    .stacks
                    .iter()
                    .find(|s| s.name() == import.from_stack)
                    .and_then(|s| s.exports().get(&import.export))
                    .ok_or_else(|| StackweaveError::UnresolvedExport {
                        stack: stack.name().to_string(),
                        export: import.qualified_export(),
                    })?;

                if export.kind != import.expected_kind {
                    return Err(StackweaveError::ExportTypeMismatch {
                        export: import.qualified_export(),
                        expected: import.expected_kind.to_string(),
                        actual: export.kind.to_string(),
                    });
                }

                if let Some(producer) = graph.node(&import.from_stack) {
                    graph.add_dependency(consumer, producer);
                }
            }
        }

        graph.resolve_order()
    }
}

/// Binds a stack's imports to already-published exports and orders its
/// resources.
fn synthesize_stack(stack: &Stack, published: &BTreeMap<String, Export>) -> Result<Vec<PlanStep>> {
    let mut bindings: BTreeMap<String, Reference> = BTreeMap::new();
    let mut external: BTreeSet<Reference> = BTreeSet::new();

    for import in stack.imports() {
        let export = published
            .get(&import.qualified_export())
            .ok_or_else(|| StackweaveError::UnresolvedExport {
                stack: stack.name().to_string(),
                export: import.qualified_export(),
            })?;
        let _ = external.insert(export.reference.clone());
        let _ = bindings.insert(import.local_name.clone(), export.reference.clone());
    }

    let bound: Vec<_> = stack
        .resources()
        .iter()
        .map(|r| r.with_imports_bound(&bindings))
        .collect::<Result<_>>()?;

    let ordered = order_descriptors(&bound, &external)?;
    Ok(ordered
        .into_iter()
        .map(|descriptor| PlanStep {
            stack: stack.name().to_string(),
            depends_on: descriptor.dependencies().into_iter().cloned().collect(),
            descriptor: descriptor.clone(),
        })
        .collect())
}
