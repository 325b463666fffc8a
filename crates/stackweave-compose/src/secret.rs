//! Secret fanout: one secret, many consumers, no copies.
//!
//! Every injection is a field reference into the single secret resource,
//! so the secret's content never appears in a descriptor.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::ResourceId;

use crate::descriptor::{AttributeValue, DescriptorBuilder};
use crate::reference::Reference;

/// Output attribute of a secret resource that field paths are built on.
pub const SECRET_ARN_ATTRIBUTE: &str = "secretArn";

/// Attribute of a consumer that receives secret injections.
pub const SECRETS_ATTRIBUTE: &str = "secrets";

/// Association of one secret field with one consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretBinding {
    /// The secret resource.
    pub secret: ResourceId,
    /// Field of the secret.
    pub field: String,
    /// Consumer of the field, e.g. a container name.
    pub consumer: String,
    /// Environment variable name exposed to the consumer.
    pub env_name: String,
}

/// A secret field materialized for one consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretInjection {
    /// Environment variable name.
    pub name: String,
    /// Field reference into the secret.
    pub value_from: Reference,
}

impl SecretInjection {
    /// Renders the injection as a `{name, valueFrom}` attribute map.
    #[must_use]
    pub fn to_attribute(&self) -> AttributeValue {
        AttributeValue::map([
            ("name", AttributeValue::from(self.name.as_str())),
            ("valueFrom", AttributeValue::Ref(self.value_from.clone())),
        ])
    }
}

/// Binds fields of one secret to consumers.
#[derive(Debug, Clone)]
pub struct SecretFanout {
    secret: ResourceId,
    fields: BTreeSet<String>,
    bindings: Vec<SecretBinding>,
}

impl SecretFanout {
    /// Starts a fanout over a secret exposing the given fields.
    #[must_use]
    pub fn new<I, S>(secret: impl Into<ResourceId>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            secret: secret.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            bindings: Vec::new(),
        }
    }

    /// Returns the secret resource.
    #[must_use]
    pub const fn secret(&self) -> &ResourceId {
        &self.secret
    }

    /// Binds `field` to `consumer` under `env_name`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the secret has no such field and `Config` if
    /// the consumer already receives a value under `env_name`.
    pub fn bind(
        &mut self,
        consumer: impl Into<String>,
        field: &str,
        env_name: impl Into<String>,
    ) -> Result<()> {
        let consumer = consumer.into();
        let env_name = env_name.into();
        if !self.fields.contains(field) {
            return Err(StackweaveError::NotFound {
                kind: "secret field",
                id: format!("{}#{field}", self.secret),
            });
        }
        if self
            .bindings
            .iter()
            .any(|b| b.consumer == consumer && b.env_name == env_name)
        {
            return Err(StackweaveError::Config {
                message: format!("consumer \"{consumer}\" already binds {env_name}"),
            });
        }
        tracing::debug!(secret = %self.secret, field, consumer = %consumer, env = %env_name, "secret field bound");
        self.bindings.push(SecretBinding {
            secret: self.secret.clone(),
            field: field.to_string(),
            consumer,
            env_name,
        });
        Ok(())
    }

    /// Returns every binding in declaration order.
    #[must_use]
    pub fn bindings(&self) -> &[SecretBinding] {
        &self.bindings
    }

    /// Returns the injections for one consumer, in binding order.
    #[must_use]
    pub fn injections_for(&self, consumer: &str) -> Vec<SecretInjection> {
        self.bindings
            .iter()
            .filter(|b| b.consumer == consumer)
            .map(|b| SecretInjection {
                name: b.env_name.clone(),
                value_from: Reference::field(b.secret.clone(), SECRET_ARN_ATTRIBUTE, b.field.clone()),
            })
            .collect()
    }

    /// Appends a consumer's injections to the `secrets` list of a builder.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the builder's `secrets` attribute is not a list.
    pub fn inject_into(&self, consumer: &str, builder: &mut DescriptorBuilder) -> Result<()> {
        for injection in self.injections_for(consumer) {
            builder.append(SECRETS_ATTRIBUTE, injection.to_attribute())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use stackweave_common::types::ResourceKind;

    use super::*;

    fn db_fanout() -> SecretFanout {
        SecretFanout::new("DbSecret", ["username", "password", "host", "port", "dbname"])
    }

    #[test]
    fn four_bindings_reference_the_same_secret() {
        let mut fanout = db_fanout();
        for (field, env) in [
            ("username", "DB_USER"),
            ("password", "DB_PASSWORD"),
            ("host", "DB_HOST"),
            ("dbname", "DB_NAME"),
        ] {
            fanout.bind("app", field, env).expect("bind");
        }
        let injections = fanout.injections_for("app");
        assert_eq!(injections.len(), 4);
        assert!(injections.iter().all(|i| i.value_from.target().as_str() == "DbSecret"));
        assert_eq!(injections[1].value_from.field_name(), Some("password"));
        assert_eq!(injections[1].name, "DB_PASSWORD");
    }

    #[test]
    fn unknown_field_fails() {
        let err = db_fanout().bind("app", "token", "TOKEN").unwrap_err();
        assert!(matches!(err, StackweaveError::NotFound { .. }), "got: {err}");
    }

    #[test]
    fn duplicate_env_name_for_consumer_fails() {
        let mut fanout = db_fanout();
        fanout.bind("app", "host", "DB").expect("first");
        assert!(fanout.bind("app", "port", "DB").is_err());
        fanout.bind("worker", "port", "DB").expect("other consumer");
    }

    #[test]
    fn inject_into_appends_references_not_values() {
        let mut fanout = db_fanout();
        fanout.bind("app", "password", "DB_PASSWORD").expect("bind");
        let mut builder = DescriptorBuilder::new("Td", ResourceKind::TaskDefinition);
        fanout.inject_into("app", &mut builder).expect("inject");
        let descriptor = builder.freeze();

        let Some(AttributeValue::List(secrets)) = descriptor.attribute(SECRETS_ATTRIBUTE) else {
            panic!("secrets list missing");
        };
        assert_eq!(secrets.len(), 1);
        assert_eq!(
            secrets[0].get_path("valueFrom"),
            Some(&AttributeValue::Ref(Reference::field("DbSecret", SECRET_ARN_ATTRIBUTE, "password")))
        );
        assert_eq!(descriptor.dependencies(), vec![&ResourceId::new("DbSecret")]);
    }

    #[test]
    fn consumers_without_bindings_get_nothing() {
        let mut fanout = db_fanout();
        fanout.bind("app", "host", "DB_HOST").expect("bind");
        assert!(fanout.injections_for("sidecar").is_empty());
        assert_eq!(fanout.bindings().len(), 1);
    }
}
