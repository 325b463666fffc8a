//! Resource descriptors and their construction phase.
//!
//! A [`DescriptorBuilder`] is mutable: attributes may be set, appended to,
//! and patched at nested paths. [`DescriptorBuilder::freeze`] ends the
//! construction phase and yields an immutable [`ResourceDescriptor`], which
//! is the only form accepted by stacks and the dependency graph.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::{ResourceId, ResourceKind};

use crate::reference::{Realized, Reference};

/// A declared attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    /// Literal string.
    String(String),
    /// Literal integer.
    Integer(i64),
    /// Literal boolean.
    Bool(bool),
    /// Ordered list of values.
    List(Vec<AttributeValue>),
    /// String-keyed map of values.
    Map(BTreeMap<String, AttributeValue>),
    /// Attribute of another resource, resolved after it is realized.
    Ref(Reference),
    /// Cross-stack import placeholder, replaced by the composer.
    Import(String),
    /// Concatenation of the resolved string forms of its parts.
    Join(Vec<AttributeValue>),
}

impl AttributeValue {
    /// Builds a list from any iterator of convertible values.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Self>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Builds a map from key-value pairs.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Self>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Builds a string concatenation of the given parts.
    pub fn join<I, V>(parts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Self>,
    {
        Self::Join(parts.into_iter().map(Into::into).collect())
    }

    /// Returns the literal string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the nested value at a dotted path of map keys.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Self> {
        path.split('.').try_fold(self, |value, key| match value {
            Self::Map(map) => map.get(key),
            _ => None,
        })
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Self::Ref(r) => out.push(r),
            Self::List(items) | Self::Join(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            Self::Map(map) => {
                for value in map.values() {
                    value.collect_references(out);
                }
            }
            Self::String(_) | Self::Integer(_) | Self::Bool(_) | Self::Import(_) => {}
        }
    }

    fn collect_imports<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::Import(name) => {
                let _ = out.insert(name);
            }
            Self::List(items) | Self::Join(items) => {
                for item in items {
                    item.collect_imports(out);
                }
            }
            Self::Map(map) => {
                for value in map.values() {
                    value.collect_imports(out);
                }
            }
            Self::String(_) | Self::Integer(_) | Self::Bool(_) | Self::Ref(_) => {}
        }
    }

    fn bind_imports(&self, bindings: &BTreeMap<String, Reference>) -> Result<Self> {
        Ok(match self {
            Self::Import(name) => {
                let reference = bindings.get(name).ok_or_else(|| StackweaveError::NotFound {
                    kind: "import binding",
                    id: name.clone(),
                })?;
                Self::Ref(reference.clone())
            }
            Self::List(items) => Self::List(
                items
                    .iter()
                    .map(|i| i.bind_imports(bindings))
                    .collect::<Result<_>>()?,
            ),
            Self::Join(items) => Self::Join(
                items
                    .iter()
                    .map(|i| i.bind_imports(bindings))
                    .collect::<Result<_>>()?,
            ),
            Self::Map(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), v.bind_imports(bindings)?)))
                    .collect::<Result<_>>()?,
            ),
            other => other.clone(),
        })
    }

    /// Resolves the value to concrete JSON using realized outputs.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference cannot be resolved or an import was
    /// never bound by the composer.
    pub fn resolve(&self, realized: &Realized) -> Result<Value> {
        Ok(match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(n) => Value::from(*n),
            Self::Bool(b) => Value::Bool(*b),
            Self::List(items) => Value::Array(
                items
                    .iter()
                    .map(|i| i.resolve(realized))
                    .collect::<Result<_>>()?,
            ),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), v.resolve(realized)?)))
                    .collect::<Result<_>>()?,
            ),
            Self::Ref(r) => r.resolve(realized)?,
            Self::Import(name) => {
                return Err(StackweaveError::NotFound {
                    kind: "import binding",
                    id: name.clone(),
                });
            }
            Self::Join(parts) => {
                let mut joined = String::new();
                for part in parts {
                    match part.resolve(realized)? {
                        Value::String(s) => joined.push_str(&s),
                        other => joined.push_str(&other.to_string()),
                    }
                }
                Value::String(joined)
            }
        })
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for AttributeValue {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u16> for AttributeValue {
    fn from(value: u16) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u8> for AttributeValue {
    fn from(value: u8) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Reference> for AttributeValue {
    fn from(value: Reference) -> Self {
        Self::Ref(value)
    }
}

/// Immutable declaration of one infrastructure resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    id: ResourceId,
    kind: ResourceKind,
    attributes: BTreeMap<String, AttributeValue>,
    tags: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    /// Returns the logical identifier.
    #[must_use]
    pub const fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Returns the resource kind.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns all declared attributes.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    /// Returns a single top-level attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Returns all tags.
    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Returns a single tag value.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Returns every reference embedded in the attributes, in attribute order.
    #[must_use]
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        for value in self.attributes.values() {
            value.collect_references(&mut out);
        }
        out
    }

    /// Returns the distinct resources this descriptor references, in first
    /// occurrence order.
    #[must_use]
    pub fn dependencies(&self) -> Vec<&ResourceId> {
        let mut seen = BTreeSet::new();
        self.references()
            .into_iter()
            .map(Reference::target)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Returns the names of unbound cross-stack imports.
    #[must_use]
    pub fn imports(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        for value in self.attributes.values() {
            value.collect_imports(&mut out);
        }
        out
    }

    /// Returns a copy with every import placeholder replaced by the bound
    /// reference.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if an import name has no binding.
    pub fn with_imports_bound(&self, bindings: &BTreeMap<String, Reference>) -> Result<Self> {
        let attributes = self
            .attributes
            .iter()
            .map(|(k, v)| Ok((k.clone(), v.bind_imports(bindings)?)))
            .collect::<Result<_>>()?;
        Ok(Self {
            id: self.id.clone(),
            kind: self.kind,
            attributes,
            tags: self.tags.clone(),
        })
    }

    /// Resolves every attribute against realized outputs.
    ///
    /// # Errors
    ///
    /// Returns an error if any attribute cannot be resolved.
    pub fn resolve_attributes(&self, realized: &Realized) -> Result<BTreeMap<String, Value>> {
        self.attributes
            .iter()
            .map(|(k, v)| Ok((k.clone(), v.resolve(realized)?)))
            .collect()
    }
}

/// Mutable construction phase of a [`ResourceDescriptor`].
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    id: ResourceId,
    kind: ResourceKind,
    attributes: BTreeMap<String, AttributeValue>,
    tags: BTreeMap<String, String>,
}

impl DescriptorBuilder {
    /// Starts a descriptor with the given identifier and kind.
    #[must_use]
    pub fn new(id: impl Into<ResourceId>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            attributes: BTreeMap::new(),
            tags: BTreeMap::new(),
        }
    }

    /// Returns the identifier the descriptor will carry.
    #[must_use]
    pub const fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Returns the kind the descriptor will carry.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Sets a top-level attribute.
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets a top-level attribute in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        let _ = self.attributes.insert(key.into(), value.into());
    }

    /// Adds a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_tag(key, value);
        self
    }

    /// Adds a tag in place.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self.tags.insert(key.into(), value.into());
    }

    /// Returns a top-level attribute as set so far.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Appends a value to a list attribute, creating the list if absent.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the attribute exists and is not a list.
    pub fn append(&mut self, key: &str, value: impl Into<AttributeValue>) -> Result<()> {
        let entry = self
            .attributes
            .entry(key.to_string())
            .or_insert_with(|| AttributeValue::List(Vec::new()));
        match entry {
            AttributeValue::List(items) => {
                items.push(value.into());
                Ok(())
            }
            _ => Err(StackweaveError::Config {
                message: format!("attribute \"{key}\" of {} is not a list", self.id),
            }),
        }
    }

    /// Overrides the value at a dotted path, creating intermediate maps.
    ///
    /// This is the only way to adjust a generated setting; it is available
    /// until [`freeze`](Self::freeze) is called.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the path is empty or crosses a non-map value.
    pub fn patch(&mut self, path: &str, value: impl Into<AttributeValue>) -> Result<()> {
        let mut keys: Vec<&str> = path.split('.').collect();
        let last = keys.pop().filter(|k| !k.is_empty()).ok_or_else(|| StackweaveError::Config {
            message: format!("empty patch path on {}", self.id),
        })?;
        tracing::debug!(id = %self.id, path, "patching attribute");

        let Some((first, rest)) = keys.split_first() else {
            let _ = self.attributes.insert(last.to_string(), value.into());
            return Ok(());
        };

        let mut current = self
            .attributes
            .entry((*first).to_string())
            .or_insert_with(|| AttributeValue::Map(BTreeMap::new()));
        for key in rest {
            current = match current {
                AttributeValue::Map(map) => map
                    .entry((*key).to_string())
                    .or_insert_with(|| AttributeValue::Map(BTreeMap::new())),
                _ => return Err(non_map_patch(&self.id, path)),
            };
        }
        match current {
            AttributeValue::Map(map) => {
                let _ = map.insert(last.to_string(), value.into());
                Ok(())
            }
            _ => Err(non_map_patch(&self.id, path)),
        }
    }

    /// Ends the construction phase.
    #[must_use]
    pub fn freeze(self) -> ResourceDescriptor {
        ResourceDescriptor {
            id: self.id,
            kind: self.kind,
            attributes: self.attributes,
            tags: self.tags,
        }
    }
}

fn non_map_patch(id: &ResourceId, path: &str) -> StackweaveError {
    StackweaveError::Config {
        message: format!("patch path \"{path}\" on {id} crosses a non-map value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Outputs;

    #[test]
    fn freeze_keeps_attributes_and_tags() {
        let d = DescriptorBuilder::new("Repo", ResourceKind::Repository)
            .attribute("repositoryName", "app")
            .attribute("scanOnPush", true)
            .tag("team", "platform")
            .freeze();
        assert_eq!(d.id().as_str(), "Repo");
        assert_eq!(d.kind(), ResourceKind::Repository);
        assert_eq!(d.attribute("repositoryName").and_then(AttributeValue::as_str), Some("app"));
        assert_eq!(d.tag("team"), Some("platform"));
    }

    #[test]
    fn patch_overrides_nested_generated_setting() {
        let mut b = DescriptorBuilder::new("Cluster", ResourceKind::Cluster).attribute(
            "clusterSettings",
            AttributeValue::map([("containerInsights", "enabled")]),
        );
        b.patch("clusterSettings.containerInsights", "enhanced").expect("patch");
        let d = b.freeze();
        let value = d
            .attribute("clusterSettings")
            .and_then(|v| v.get_path("containerInsights"))
            .and_then(AttributeValue::as_str);
        assert_eq!(value, Some("enhanced"));
    }

    #[test]
    fn patch_creates_missing_maps() {
        let mut b = DescriptorBuilder::new("Svc", ResourceKind::Service);
        b.patch("deployment.circuitBreaker.rollback", true).expect("patch");
        let d = b.freeze();
        assert_eq!(
            d.attribute("deployment").and_then(|v| v.get_path("circuitBreaker.rollback")),
            Some(&AttributeValue::Bool(true))
        );
    }

    #[test]
    fn patch_through_scalar_fails() {
        let mut b = DescriptorBuilder::new("Svc", ResourceKind::Service).attribute("name", "svc");
        let err = b.patch("name.inner", "x").unwrap_err();
        assert!(err.to_string().contains("non-map"), "got: {err}");
        assert!(b.patch("", "x").is_err());
    }

    #[test]
    fn append_rejects_non_list() {
        let mut b = DescriptorBuilder::new("Td", ResourceKind::TaskDefinition).attribute("cpu", 256_u32);
        b.append("secrets", "a").expect("creates list");
        assert!(b.append("cpu", "b").is_err());
    }

    #[test]
    fn dependencies_are_distinct_in_first_occurrence_order() {
        let d = DescriptorBuilder::new("Svc", ResourceKind::Service)
            .attribute("cluster", Reference::new("Cluster", "clusterArn"))
            .attribute(
                "network",
                AttributeValue::map([
                    ("subnets", AttributeValue::Ref(Reference::new("Vpc", "privateSubnetIds"))),
                    ("vpc", AttributeValue::Ref(Reference::new("Vpc", "vpcId"))),
                ]),
            )
            .freeze();
        let deps: Vec<&str> = d.dependencies().into_iter().map(ResourceId::as_str).collect();
        assert_eq!(deps, vec!["Cluster", "Vpc"]);
        assert_eq!(d.references().len(), 3);
    }

    #[test]
    fn imports_bind_to_the_exported_reference() {
        let d = DescriptorBuilder::new("Td", ResourceKind::TaskDefinition)
            .attribute(
                "image",
                AttributeValue::join([AttributeValue::Import("repositoryUri".into()), ":".into(), "v2".into()]),
            )
            .freeze();
        assert_eq!(d.imports().into_iter().collect::<Vec<_>>(), vec!["repositoryUri"]);

        let exported = Reference::new("Repo", "repositoryUri");
        let mut bindings = BTreeMap::new();
        let _ = bindings.insert("repositoryUri".to_string(), exported.clone());
        let bound = d.with_imports_bound(&bindings).expect("bind");
        assert!(bound.imports().is_empty());
        assert_eq!(bound.references(), vec![&exported]);
    }

    #[test]
    fn join_resolves_to_concatenated_string() {
        let mut realized = Realized::new();
        let mut outputs = Outputs::new();
        let _ = outputs.insert("repositoryUri".into(), Value::String("reg/app".into()));
        realized.insert(ResourceId::new("Repo"), outputs);

        let value = AttributeValue::join([
            AttributeValue::Ref(Reference::new("Repo", "repositoryUri")),
            ":".into(),
            "v2".into(),
        ]);
        assert_eq!(value.resolve(&realized).expect("resolve"), Value::String("reg/app:v2".into()));
    }

    #[test]
    fn unbound_import_does_not_resolve() {
        let value = AttributeValue::Import("repositoryUri".into());
        assert!(value.resolve(&Realized::new()).is_err());
    }
}
