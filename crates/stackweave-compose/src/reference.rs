//! Lazy references to attributes of other resources.
//!
//! A [`Reference`] is plain data. It is resolved in one explicit pass,
//! against [`Realized`] outputs, once the plan order guarantees that its
//! target has already been realized.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::ResourceId;

/// Output attributes reported by the provider for one realized resource.
pub type Outputs = BTreeMap<String, Value>;

/// Handle to an attribute of a resource that may not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reference {
    target: ResourceId,
    attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl Reference {
    /// Creates a reference to `attribute` of `target`.
    #[must_use]
    pub fn new(target: impl Into<ResourceId>, attribute: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            attribute: attribute.into(),
            field: None,
        }
    }

    /// Creates a reference to a named sub-field of a structured attribute.
    ///
    /// Resolves to the provider's field-path form (`<value>:<field>::`),
    /// never to the field's content.
    #[must_use]
    pub fn field(
        target: impl Into<ResourceId>,
        attribute: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            attribute: attribute.into(),
            field: Some(field.into()),
        }
    }

    /// Returns the referenced resource.
    #[must_use]
    pub const fn target(&self) -> &ResourceId {
        &self.target
    }

    /// Returns the referenced attribute name.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Returns the sub-field name, if any.
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Resolves the reference against realized outputs.
    ///
    /// # Errors
    ///
    /// Returns `UnrealizedReference` if the target has not been realized,
    /// `NotFound` if the target did not report the attribute, and `Config`
    /// if a field path is requested on a non-string attribute.
    pub fn resolve(&self, realized: &Realized) -> Result<Value> {
        let outputs = realized
            .get(&self.target)
            .ok_or_else(|| StackweaveError::UnrealizedReference {
                target: self.target.to_string(),
            })?;
        let value = outputs
            .get(&self.attribute)
            .ok_or_else(|| StackweaveError::NotFound {
                kind: "attribute",
                id: format!("{}.{}", self.target, self.attribute),
            })?;

        match &self.field {
            None => Ok(value.clone()),
            Some(field) => {
                let base = value.as_str().ok_or_else(|| StackweaveError::Config {
                    message: format!("field path {self} requires a string attribute"),
                })?;
                Ok(Value::String(format!("{base}:{field}::")))
            }
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "${{{}.{}#{field}}}", self.target, self.attribute),
            None => write!(f, "${{{}.{}}}", self.target, self.attribute),
        }
    }
}

/// Outputs of every resource realized so far, keyed by resource.
#[derive(Debug, Clone, Default)]
pub struct Realized {
    outputs: BTreeMap<ResourceId, Outputs>,
}

impl Realized {
    /// Creates an empty set of realized outputs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outputs of a realized resource.
    pub fn insert(&mut self, id: ResourceId, outputs: Outputs) {
        let _ = self.outputs.insert(id, outputs);
    }

    /// Returns the outputs of a realized resource.
    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&Outputs> {
        self.outputs.get(id)
    }

    /// Returns whether the resource has been realized.
    #[must_use]
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.outputs.contains_key(id)
    }

    /// Returns the number of realized resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Returns whether nothing has been realized yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
