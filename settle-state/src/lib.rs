//! Settle State Management
//!
//! Persists what the provider observed about every managed resource,
//! including the durable remote identifier each lifecycle controller
//! returned, so later runs can read, update and delete the same resource.
//!
//! # Overview
//!
//! - **StateFile**: all managed resources with their identifier and attributes
//! - **StateBackend**: a trait for state storage backends
//! - **LockInfo**: the lock held while an operation mutates state
//!
//! # Example
//!
//! ```ignore
//! use settle_state::{create_backend, BackendConfig, LockOperation};
//!
//! let backend = create_backend(&BackendConfig::local())?;
//! let lock = backend.acquire_lock(LockOperation::Apply).await?;
//! let mut state = backend.read_state().await?.unwrap_or_default();
//!
//! // ... apply effects, recording each result ...
//!
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::create_backend;
pub use lock::{LockHolder, LockInfo, LockOperation};
pub use state::{ResourceState, StateFile};
