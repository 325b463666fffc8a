//! Stacks: named, exclusively-owned collections of resources.
//!
//! Other stacks only see a stack through its named exports. Imports are
//! declared by name and expected kind and appear in descriptors as
//! [`AttributeValue::Import`] placeholders until the composer binds them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use stackweave_common::constants;
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::{ResourceId, ResourceKind};

use crate::descriptor::{AttributeValue, DescriptorBuilder, ResourceDescriptor};
use crate::reference::Reference;

/// A named value a stack offers to other stacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    /// Export name, unique within its stack.
    pub name: String,
    /// Reference to the exported attribute.
    pub reference: Reference,
    /// Kind of the resource the reference points at.
    pub kind: ResourceKind,
}

/// A declared dependency on another stack's export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Name used by this stack's descriptors.
    pub local_name: String,
    /// Stack providing the export.
    pub from_stack: String,
    /// Export name within the providing stack.
    pub export: String,
    /// Kind the importer expects the exported resource to have.
    pub expected_kind: ResourceKind,
}

impl Import {
    /// Returns the qualified export name (`<stack>.<export>`).
    #[must_use]
    pub fn qualified_export(&self) -> String {
        format!("{}.{}", self.from_stack, self.export)
    }
}

/// One deployable unit of resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    name: String,
    resources: Vec<ResourceDescriptor>,
    exports: BTreeMap<String, Export>,
    imports: Vec<Import>,
}

impl Stack {
    /// Returns the stack name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the resources in declaration order.
    #[must_use]
    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    /// Returns a resource by identifier.
    #[must_use]
    pub fn resource(&self, id: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|r| r.id().as_str() == id)
    }

    /// Returns the named exports.
    #[must_use]
    pub const fn exports(&self) -> &BTreeMap<String, Export> {
        &self.exports
    }

    /// Returns the declared imports.
    #[must_use]
    pub fn imports(&self) -> &[Import] {
        &self.imports
    }
}

/// Accumulates the resources, exports, and imports of a [`Stack`].
#[derive(Debug)]
pub struct StackBuilder {
    name: String,
    resources: Vec<ResourceDescriptor>,
    ids: BTreeSet<ResourceId>,
    exports: BTreeMap<String, Export>,
    imports: Vec<Import>,
}

impl StackBuilder {
    /// Starts an empty stack.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
            ids: BTreeSet::new(),
            exports: BTreeMap::new(),
            imports: Vec::new(),
        }
    }

    /// Returns the stack name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tags and freezes a descriptor, then adds it to the stack.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an invalid identifier and `DuplicateResource`
    /// if the identifier is already declared in this stack.
    pub fn add(&mut self, mut builder: DescriptorBuilder) -> Result<ResourceId> {
        let id = builder.id().clone();
        id.validate()?;
        if !self.ids.insert(id.clone()) {
            return Err(StackweaveError::DuplicateResource {
                kind: "resource",
                id: id.to_string(),
            });
        }
        builder.set_tag(constants::TAG_STACK, self.name.clone());
        builder.set_tag(constants::TAG_MANAGED_BY, constants::APP_NAME);
        tracing::debug!(stack = %self.name, id = %id, kind = %builder.kind(), "resource declared");
        self.resources.push(builder.freeze());
        Ok(id)
    }

    /// Adds every builder in order.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by [`add`](Self::add).
    pub fn add_all(&mut self, builders: impl IntoIterator<Item = DescriptorBuilder>) -> Result<()> {
        for builder in builders {
            let _ = self.add(builder)?;
        }
        Ok(())
    }

    /// Exports `attribute` of a declared resource under `name`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the resource is not declared in this stack and
    /// `DuplicateResource` if the export name is taken.
    pub fn export(
        &mut self,
        name: impl Into<String>,
        resource: &ResourceId,
        attribute: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        let descriptor = self
            .resources
            .iter()
            .find(|r| r.id() == resource)
            .ok_or_else(|| StackweaveError::NotFound {
                kind: "exported resource",
                id: format!("{resource} in stack \"{}\"", self.name),
            })?;
        if self.exports.contains_key(&name) {
            return Err(StackweaveError::DuplicateResource {
                kind: "export",
                id: format!("{}.{name}", self.name),
            });
        }
        let export = Export {
            name: name.clone(),
            reference: Reference::new(resource.clone(), attribute),
            kind: descriptor.kind(),
        };
        let _ = self.exports.insert(name, export);
        Ok(())
    }

    /// Declares an import and returns the placeholder to embed in
    /// descriptors.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateResource` if `local_name` is already imported.
    pub fn import(
        &mut self,
        local_name: impl Into<String>,
        from_stack: impl Into<String>,
        export: impl Into<String>,
        expected_kind: ResourceKind,
    ) -> Result<AttributeValue> {
        let local_name = local_name.into();
        if self.imports.iter().any(|i| i.local_name == local_name) {
            return Err(StackweaveError::DuplicateResource {
                kind: "import",
                id: format!("{}.{local_name}", self.name),
            });
        }
        self.imports.push(Import {
            local_name: local_name.clone(),
            from_stack: from_stack.into(),
            export: export.into(),
            expected_kind,
        });
        Ok(AttributeValue::Import(local_name))
    }

    /// Finishes the stack.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an empty stack name and `UnresolvedExport` if a
    /// descriptor uses an import placeholder that was never declared.
    pub fn build(self) -> Result<Stack> {
        if self.name.trim().is_empty() {
            return Err(StackweaveError::Config {
                message: "stack name must not be empty".into(),
            });
        }
        let declared: BTreeSet<&str> = self.imports.iter().map(|i| i.local_name.as_str()).collect();
        for resource in &self.resources {
            if let Some(missing) = resource.imports().into_iter().find(|n| !declared.contains(n)) {
                return Err(StackweaveError::UnresolvedExport {
                    stack: self.name.clone(),
                    export: format!("{missing} (used by {})", resource.id()),
                });
            }
        }
        tracing::info!(
            stack = %self.name,
            resources = self.resources.len(),
            exports = self.exports.len(),
            imports = self.imports.len(),
            "stack built"
        );
        Ok(Stack {
            name: self.name,
            resources: self.resources,
            exports: self.exports,
            imports: self.imports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_tags_resources_with_stack_name() {
        let mut builder = StackBuilder::new("registry");
        let _ = builder
            .add(DescriptorBuilder::new("Repo", ResourceKind::Repository))
            .expect("add");
        let stack = builder.build().expect("build");
        let repo = stack.resource("Repo").expect("repo");
        assert_eq!(repo.tag(constants::TAG_STACK), Some("registry"));
        assert_eq!(repo.tag(constants::TAG_MANAGED_BY), Some(constants::APP_NAME));
    }

    #[test]
    fn duplicate_resource_rejected() {
        let mut builder = StackBuilder::new("app");
        let _ = builder
            .add(DescriptorBuilder::new("Vpc", ResourceKind::Network))
            .expect("first");
        let err = builder
            .add(DescriptorBuilder::new("Vpc", ResourceKind::Network))
            .unwrap_err();
        assert!(matches!(err, StackweaveError::DuplicateResource { .. }), "got: {err}");
    }

    #[test]
    fn export_records_kind_of_target() {
        let mut builder = StackBuilder::new("registry");
        let repo = builder
            .add(DescriptorBuilder::new("Repo", ResourceKind::Repository))
            .expect("add");
        builder.export("repositoryUri", &repo, "repositoryUri").expect("export");
        let stack = builder.build().expect("build");
        let export = &stack.exports()["repositoryUri"];
        assert_eq!(export.kind, ResourceKind::Repository);
        assert_eq!(export.reference, Reference::new("Repo", "repositoryUri"));
    }

    #[test]
    fn export_of_undeclared_resource_fails() {
        let mut builder = StackBuilder::new("registry");
        let err = builder
            .export("repositoryUri", &ResourceId::new("Ghost"), "repositoryUri")
            .unwrap_err();
        assert!(err.to_string().contains("Ghost"), "got: {err}");
    }

    #[test]
    fn undeclared_import_placeholder_fails_build() {
        let mut builder = StackBuilder::new("app");
        let _ = builder
            .add(
                DescriptorBuilder::new("Td", ResourceKind::TaskDefinition)
                    .attribute("image", AttributeValue::Import("repositoryUri".into())),
            )
            .expect("add");
        let err = builder.build().unwrap_err();
        assert!(matches!(err, StackweaveError::UnresolvedExport { .. }), "got: {err}");
    }

    #[test]
    fn duplicate_import_rejected() {
        let mut builder = StackBuilder::new("app");
        let _ = builder
            .import("uri", "registry", "repositoryUri", ResourceKind::Repository)
            .expect("first");
        assert!(
            builder
                .import("uri", "registry", "repositoryUri", ResourceKind::Repository)
                .is_err()
        );
    }

    #[test]
    fn empty_stack_name_rejected() {
        assert!(StackBuilder::new(" ").build().is_err());
    }
}
