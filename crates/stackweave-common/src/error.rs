//! Unified error types for the Stackweave workspace.
//!
//! Synthesis errors (`CyclicDependency`, `UnresolvedExport`,
//! `ExportTypeMismatch`, `TopologyMismatch`) are raised before any provider
//! call is made. `Provider` errors are surfaced from realization and carry
//! the provider's retry hint untouched.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum StackweaveError {
    /// A reference cycle was found between resources or stacks.
    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency {
        /// Identifiers along the cycle, first element repeated at the end.
        cycle: Vec<String>,
    },

    /// A stack imports an export that no stack provides.
    #[error("stack \"{stack}\" imports unresolved export \"{export}\"")]
    UnresolvedExport {
        /// Consuming stack.
        stack: String,
        /// Missing export, as `<stack>.<export>`.
        export: String,
    },

    /// An export was imported under a different resource kind.
    #[error("export \"{export}\" has kind {actual}, imported as {expected}")]
    ExportTypeMismatch {
        /// Export name, as `<stack>.<export>`.
        export: String,
        /// Kind declared by the importer.
        expected: String,
        /// Kind of the exported resource.
        actual: String,
    },

    /// A tier adjacency spans two different networks.
    #[error("tier \"{destination}\" cannot allow \"{source_tier}\": {message}")]
    TopologyMismatch {
        /// Tier the traffic originates from.
        source_tier: String,
        /// Tier receiving the ingress rule.
        destination: String,
        /// Description of the mismatch.
        message: String,
    },

    /// The provider failed to realize or destroy a resource.
    #[error("provider error on {resource} (retryable: {retryable}): {message}")]
    Provider {
        /// Resource the operation targeted.
        resource: String,
        /// Provider diagnostic.
        message: String,
        /// Whether the provider considers the failure transient.
        retryable: bool,
    },

    /// The same resource or stack identifier was declared twice.
    #[error("duplicate {kind} identifier: {id}")]
    DuplicateResource {
        /// What was duplicated (`resource`, `stack`).
        kind: &'static str,
        /// The duplicated identifier.
        id: String,
    },

    /// A reference was resolved before its target was realized.
    #[error("reference to {target} resolved before it was realized")]
    UnrealizedReference {
        /// Target resource of the reference.
        target: String,
    },

    /// A required item was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing item.
        kind: &'static str,
        /// Identifier of the missing item.
        id: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// The YAML configuration could not be parsed.
    #[error("configuration parse error: {source}")]
    Yaml {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },
}

impl StackweaveError {
    /// Returns whether retrying the failed operation may succeed.
    ///
    /// Only provider errors can be retryable; synthesis errors never are.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider { retryable: true, .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StackweaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_joins_path() {
        let err = StackweaveError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
    }

    #[test]
    fn only_retryable_provider_errors_are_retryable() {
        let transient = StackweaveError::Provider {
            resource: "Vpc".into(),
            message: "throttled".into(),
            retryable: true,
        };
        let fatal = StackweaveError::Provider {
            resource: "Vpc".into(),
            message: "quota exceeded".into(),
            retryable: false,
        };
        let synthesis = StackweaveError::UnresolvedExport {
            stack: "app".into(),
            export: "registry.repositoryUri".into(),
        };
        assert!(transient.is_retryable());
        assert!(!fatal.is_retryable());
        assert!(!synthesis.is_retryable());
    }

    #[test]
    fn mismatch_message_names_both_kinds() {
        let err = StackweaveError::ExportTypeMismatch {
            export: "net.vpc".into(),
            expected: "Repository".into(),
            actual: "Network".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Repository"), "got: {msg}");
        assert!(msg.contains("Network"), "got: {msg}");
    }
}
