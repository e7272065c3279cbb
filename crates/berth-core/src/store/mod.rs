pub mod lock;
pub mod remote;

pub use lock::FileLock;
pub use remote::{ProcessS3Sync, RemoteSync, s3_pull_request, s3_push_request};

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{CoreError, CoreErrorKind, TaskState};

pub type StoreResult<T> = Result<T, CoreError>;

/// Desired-state store. The remote object is the single source of truth; the
/// local file is a transient working copy refreshed at the start of every
/// locked cycle.
pub struct StateStore {
    local_path: PathBuf,
    lock_path: PathBuf,
    state_key: String,
    remote: Arc<dyn RemoteSync>,
}

impl StateStore {
    pub fn new(
        local_path: impl Into<PathBuf>,
        lock_path: impl Into<PathBuf>,
        state_key: impl Into<String>,
        remote: Arc<dyn RemoteSync>,
    ) -> Self {
        Self {
            local_path: local_path.into(),
            lock_path: lock_path.into(),
            state_key: state_key.into(),
            remote,
        }
    }

    pub fn from_config(config: &Config, remote: Arc<dyn RemoteSync>) -> Self {
        Self::new(
            config.local_state_path(),
            config.lock_path(),
            config.state_key(),
            remote,
        )
    }

    /// One exclusively locked load-mutate-save cycle. The state is saved even
    /// when the operation fails: instances started before the failure are
    /// already recorded and must not be orphaned.
    pub fn with_locked_state<T>(
        &self,
        operation: impl FnOnce(&mut TaskState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let _lock = FileLock::acquire_exclusive(&self.lock_path)?;
        let mut state = self.load()?;
        let result = operation(&mut state);
        self.save(&state)?;
        result
    }

    /// Read-only variant: load under the lock, skip the save and the push.
    pub fn read_locked_state<T>(
        &self,
        operation: impl FnOnce(&TaskState) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let _lock = FileLock::acquire_exclusive(&self.lock_path)?;
        let state = self.load()?;
        operation(&state)
    }

    fn load(&self) -> StoreResult<TaskState> {
        let present = self.remote.pull_to_local(&self.state_key, &self.local_path)?;
        if !present {
            tracing::debug!(key = %self.state_key, "remote state absent, starting empty");
            return Ok(TaskState::default());
        }

        let raw = std::fs::read_to_string(&self.local_path).map_err(|error| {
            storage_failure(format!(
                "failed to read state file '{}': {error}",
                self.local_path.display()
            ))
        })?;

        if raw.trim().is_empty() {
            return Ok(TaskState::default());
        }

        serde_json::from_str(&raw).map_err(|error| {
            storage_failure(format!(
                "state file '{}' is not valid JSON: {error}",
                self.local_path.display()
            ))
        })
    }

    fn save(&self, state: &TaskState) -> StoreResult<()> {
        if let Some(parent) = self.local_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|error| {
                storage_failure(format!(
                    "failed to create state directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }

        let rendered = serde_json::to_string_pretty(state)
            .map_err(|error| storage_failure(format!("failed to serialize state: {error}")))?;

        std::fs::write(&self.local_path, rendered).map_err(|error| {
            storage_failure(format!(
                "failed to write state file '{}': {error}",
                self.local_path.display()
            ))
        })?;

        self.remote.push_from_local(&self.state_key, &self.local_path)
    }
}

fn storage_failure(message: String) -> CoreError {
    CoreError {
        component: None,
        operation: None,
        task: None,
        kind: CoreErrorKind::StorageFailure,
        message,
    }
}
