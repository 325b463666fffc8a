//! Domain primitive types used across the Stackweave workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StackweaveError};

/// Logical identifier of a declared resource, unique across a topology.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a resource ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks that the identifier is non-empty and uses only
    /// alphanumerics, `-` and `_`.
    ///
    /// # Errors
    ///
    /// Returns `StackweaveError::Config` describing the offending identifier.
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(StackweaveError::Config {
                message: "resource identifier must not be empty".into(),
            });
        }
        if let Some(bad) = self
            .0
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(StackweaveError::Config {
                message: format!("resource identifier \"{}\" contains '{bad}'", self.0),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Closed set of infrastructure resource kinds.
///
/// Per-kind behavior (how a kind is realized, which outputs it produces) is
/// looked up by this tag rather than modelled through a type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Container image repository.
    Repository,
    /// Virtual network with its subnet groups.
    Network,
    /// Security group attached to one tier.
    SecurityGroup,
    /// Single ingress rule on a security group.
    SecurityGroupRule,
    /// Container orchestration cluster.
    Cluster,
    /// Container task definition.
    TaskDefinition,
    /// Long-running service scheduled on a cluster.
    Service,
    /// Application load balancer.
    LoadBalancer,
    /// Load balancer listener.
    Listener,
    /// Load balancer target group.
    TargetGroup,
    /// Managed relational database cluster.
    Database,
    /// Secret store entry.
    Secret,
    /// Log group receiving container output.
    LogSink,
    /// IAM role.
    Role,
}

impl ResourceKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 14] = [
        Self::Repository,
        Self::Network,
        Self::SecurityGroup,
        Self::SecurityGroupRule,
        Self::Cluster,
        Self::TaskDefinition,
        Self::Service,
        Self::LoadBalancer,
        Self::Listener,
        Self::TargetGroup,
        Self::Database,
        Self::Secret,
        Self::LogSink,
        Self::Role,
    ];

    /// Returns the canonical name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Repository => "Repository",
            Self::Network => "Network",
            Self::SecurityGroup => "SecurityGroup",
            Self::SecurityGroupRule => "SecurityGroupRule",
            Self::Cluster => "Cluster",
            Self::TaskDefinition => "TaskDefinition",
            Self::Service => "Service",
            Self::LoadBalancer => "LoadBalancer",
            Self::Listener => "Listener",
            Self::TargetGroup => "TargetGroup",
            Self::Database => "Database",
            Self::Secret => "Secret",
            Self::LogSink => "LogSink",
            Self::Role => "Role",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = StackweaveError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| StackweaveError::NotFound {
                kind: "resource kind",
                id: s.to_string(),
            })
    }
}

/// SHA-256 digest identifying a synthesized plan or a realized input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Creates a fingerprint from a hex-encoded string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid 64-character hex string.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let hex = hex.into();
        if hex.len() != crate::constants::SHA256_HEX_LENGTH
            || !hex.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(StackweaveError::Config {
                message: format!("invalid SHA-256 hex string: {hex}"),
            });
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// Returns the hex-encoded digest.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Returns the first `len` hex characters, for compact display.
    #[must_use]
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}
