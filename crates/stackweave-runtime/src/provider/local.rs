//! File-backed local provider.
//!
//! Simulates a cloud control plane: physical ids are generated once per
//! logical id, outputs follow the per-kind table, and everything is
//! recorded in a JSON state index so repeated applies are idempotent.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use stackweave_common::config::ProviderConfig;
use stackweave_common::error::{Result, StackweaveError};
use stackweave_common::types::{Fingerprint, ResourceId};
use stackweave_compose::descriptor::ResourceDescriptor;
use stackweave_compose::reference::Outputs;
use uuid::Uuid;

use super::{Change, OutputContext, Provider, Realization, ResolvedAttributes, behavior};
use crate::state::{self, StateEntry, StateFile};

/// Provider that records realized resources in a local state file.
#[derive(Debug)]
pub struct LocalProvider {
    state_path: PathBuf,
    account: String,
    region: String,
    state: Mutex<StateFile>,
}

impl LocalProvider {
    /// Opens the provider over an existing or new state file.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing state file cannot be read.
    pub fn open(state_path: impl Into<PathBuf>, config: &ProviderConfig) -> Result<Self> {
        let state_path = state_path.into();
        let state = state::load_state(&state_path)?;
        tracing::info!(
            path = %state_path.display(),
            resources = state.resources.len(),
            "local provider opened"
        );
        Ok(Self {
            state_path,
            account: config.account.clone(),
            region: config.region.clone(),
            state: Mutex::new(state),
        })
    }

    /// Returns the path of the state index.
    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Returns a copy of the current state index.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn snapshot(&self) -> Result<StateFile> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StateFile>> {
        self.state.lock().map_err(|_| StackweaveError::Config {
            message: "local provider state lock poisoned".into(),
        })
    }

    fn persist(&self, id: &ResourceId, state: &StateFile) -> Result<()> {
        state::save_state(&self.state_path, state).map_err(|e| StackweaveError::Provider {
            resource: id.to_string(),
            message: e.to_string(),
            retryable: true,
        })
    }
}

impl Provider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn realize(
        &self,
        descriptor: &ResourceDescriptor,
        attributes: &ResolvedAttributes,
    ) -> Result<Realization> {
        let id = descriptor.id();
        let kind = descriptor.kind();
        let digest = input_digest(descriptor, attributes)?;
        let behavior = behavior(kind)?;
        let now = Utc::now();

        let mut state = self.lock()?;
        let (physical_id, change, created_at) = match state.resources.get(id) {
            Some(entry) if entry.kind == kind && entry.input_digest == digest => {
                tracing::debug!(id = %id, physical_id = %entry.physical_id, "resource unchanged");
                return Ok(Realization {
                    physical_id: entry.physical_id.clone(),
                    attributes: entry.outputs.clone(),
                    change: Change::Unchanged,
                });
            }
            Some(entry) if entry.kind == kind => {
                (entry.physical_id.clone(), Change::Updated, entry.created_at)
            }
            _ => (generate_physical_id(behavior.id_prefix), Change::Created, now),
        };

        let outputs = (behavior.outputs)(&OutputContext {
            id,
            physical_id: &physical_id,
            attributes,
            account: &self.account,
            region: &self.region,
        });

        // Memory only follows disk once the write succeeded.
        let mut next = state.clone();
        let _ = next.resources.insert(
            id.clone(),
            StateEntry {
                id: id.clone(),
                kind,
                physical_id: physical_id.clone(),
                input_digest: digest,
                outputs: outputs.clone(),
                created_at,
                updated_at: now,
            },
        );
        self.persist(id, &next)?;
        *state = next;

        tracing::info!(id = %id, kind = %kind, physical_id = %physical_id, %change, "resource realized");
        Ok(Realization {
            physical_id,
            attributes: outputs,
            change,
        })
    }

    fn destroy(&self, id: &ResourceId) -> Result<bool> {
        let mut state = self.lock()?;
        let mut next = state.clone();
        let Some(entry) = next.resources.remove(id) else {
            tracing::debug!(id = %id, "resource not realized, nothing to destroy");
            return Ok(false);
        };
        self.persist(id, &next)?;
        *state = next;
        tracing::info!(id = %id, physical_id = %entry.physical_id, "resource destroyed");
        Ok(true)
    }

    fn outputs(&self, id: &ResourceId) -> Result<Option<Outputs>> {
        Ok(self.lock()?.resources.get(id).map(|e| e.outputs.clone()))
    }
}

/// Digests everything that determines a realized resource.
fn input_digest(
    descriptor: &ResourceDescriptor,
    attributes: &ResolvedAttributes,
) -> Result<Fingerprint> {
    let canonical = serde_json::to_vec(&json!({
        "kind": descriptor.kind(),
        "attributes": attributes,
        "tags": descriptor.tags(),
    }))?;
    let digest = Sha256::digest(&canonical);
    Fingerprint::from_hex(digest.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

fn generate_physical_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", hex.get(..12).unwrap_or(&hex))
}
