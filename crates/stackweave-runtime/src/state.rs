//! Persistent state management.
//!
//! Maintains a local JSON index of every realized resource, keyed by
//! logical id, so repeated applies can detect unchanged input and keep
//! physical identifiers stable.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::{Fingerprint, ResourceId, ResourceKind};
use stackweave_compose::reference::Outputs;

/// Current on-disk format version.
pub const STATE_VERSION: u32 = 1;

/// Persistent record of one realized resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    /// Logical identifier.
    pub id: ResourceId,
    /// Resource kind at the time of realization.
    pub kind: ResourceKind,
    /// Identifier assigned by the provider.
    pub physical_id: String,
    /// Digest of the kind, resolved attributes, and tags last realized.
    pub input_digest: Fingerprint,
    /// Output attributes reported at realization.
    pub outputs: Outputs,
    /// When the resource was first created.
    pub created_at: DateTime<Utc>,
    /// When the resource was last created or updated.
    pub updated_at: DateTime<Utc>,
}

/// The full state index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    /// Format version.
    pub version: u32,
    /// Realized resources keyed by logical id.
    pub resources: BTreeMap<ResourceId, StateEntry>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resources: BTreeMap::new(),
        }
    }
}

/// Loads the state index from disk.
///
/// A missing file yields an empty index.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_state(path: &Path) -> Result<StateFile> {
    tracing::debug!(path = %path.display(), "loading state index");
    if !path.exists() {
        return Ok(StateFile::default());
    }
    let content = std::fs::read_to_string(path).map_err(|e| StackweaveError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let state: StateFile = serde_json::from_str(&content)?;
    if state.version != STATE_VERSION {
        return Err(StackweaveError::Config {
            message: format!(
                "state file {} has version {}, expected {STATE_VERSION}",
                path.display(),
                state.version
            ),
        });
    }
    Ok(state)
}

/// Persists the state index to disk atomically.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn save_state(path: &Path, state: &StateFile) -> Result<()> {
    tracing::debug!(path = %path.display(), resources = state.resources.len(), "saving state index");
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StackweaveError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| StackweaveError::Io {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| StackweaveError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
