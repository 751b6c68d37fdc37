//! State backend trait and error types

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Duration;
use settle_core::resource::Value;
use thiserror::Error;

use crate::lock::{DEFAULT_LEASE_SECS, LockInfo, LockOperation};
use crate::state::StateFile;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(
        "state is locked by {holder} for {operation} until {expires_at} (lock ID: {lock_id})"
    )]
    Locked {
        lock_id: String,
        holder: String,
        operation: LockOperation,
        expires_at: String,
    },

    #[error("Lock not found: {0}")]
    LockNotFound(String),

    #[error("Lock ID mismatch: expected {expected}, got {actual}")]
    LockMismatch { expected: String, actual: String },

    #[error("Unsupported backend type: {0}")]
    UnsupportedBackend(String),

    #[error("backend attribute '{attribute}': {message}")]
    Configuration { attribute: String, message: String },

    #[error("Invalid state file: {0}")]
    InvalidState(String),

    /// The stored state belongs to a different lineage
    #[error("State lineage mismatch: expected {expected}, got {actual}")]
    LineageMismatch { expected: String, actual: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BackendError {
    pub fn locked(lock: &LockInfo) -> Self {
        Self::Locked {
            lock_id: lock.id.clone(),
            holder: lock.holder.to_string(),
            operation: lock.operation,
            expires_at: lock.expires_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }

    fn configuration(attribute: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            attribute: attribute.to_string(),
            message: message.into(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Where settle keeps its state file, and how writers exclude each other
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// `None` before the first apply
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Persist `state`; its serial must already be incremented
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;

    /// Fails while an unexpired lock is held by anyone, this process included
    async fn acquire_lock(&self, operation: LockOperation) -> BackendResult<LockInfo>;

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()>;

    /// Remove the lock with `lock_id` regardless of who holds it
    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()>;
}

/// The manifest's `backend` block
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub backend_type: String,
    pub attributes: HashMap<String, Value>,
}

impl BackendConfig {
    pub fn local() -> Self {
        Self {
            backend_type: "local".to_string(),
            attributes: HashMap::new(),
        }
    }

    /// The `path` attribute, when set
    pub fn path(&self) -> BackendResult<Option<PathBuf>> {
        match self.attributes.get("path") {
            None => Ok(None),
            Some(Value::String(path)) if !path.is_empty() => Ok(Some(PathBuf::from(path))),
            Some(_) => Err(BackendError::configuration(
                "path",
                "must be a non-empty string",
            )),
        }
    }

    /// The `lock_timeout_secs` attribute, or one hour
    pub fn lock_lease(&self) -> BackendResult<Duration> {
        match self.attributes.get("lock_timeout_secs") {
            None => Ok(Duration::seconds(DEFAULT_LEASE_SECS)),
            Some(Value::Int(secs)) if *secs > 0 => Ok(Duration::seconds(*secs)),
            Some(_) => Err(BackendError::configuration(
                "lock_timeout_secs",
                "must be a positive number of seconds",
            )),
        }
    }
}
