//! Kubernetes remote state storage
//!
//! This crate stores an infrastructure tool's serialized state in Kubernetes
//! secrets, one secret per workspace, with advisory locking for safe
//! concurrent access.
//!
//! # Overview
//!
//! - **RemoteClient**: get/put/delete of a workspace's state payload, plus
//!   lock/unlock
//! - **WorkspaceDirectory**: enumerates and deletes workspaces within one
//!   namespace and secret suffix
//! - **ObjectStore**: the narrow substrate interface (atomic create,
//!   version-guarded update) the lock protocol is built on, implemented for
//!   the Secrets API and for process memory
//! - **LockInfo**: who holds a lock, why, and the ID required to release it
//!
//! The lock lives inside the state secret itself. First-time acquisition
//! rides on the API server's atomic create; contested acquisition and
//! release ride on resourceVersion-guarded updates. There is no retry loop
//! and no lock expiry in here; contention is reported to the caller with the
//! holder's details.
//!
//! # Example
//!
//! ```ignore
//! use kubestate::{BackendConfig, LockInfo};
//!
//! let mut config = BackendConfig::new("my-project");
//! config.namespace = "infra".to_string();
//!
//! let workspaces = config.connect().await?;
//! let client = workspaces.client("default")?;
//!
//! // Acquire the lock before modifying state
//! let lock_id = client.lock(&LockInfo::new("apply")).await?;
//!
//! let previous = client.get().await?;
//! // ... plan and apply changes ...
//! client.put(&new_state_bytes).await?;
//!
//! client.unlock(&lock_id).await?;
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod lock;
pub mod names;
pub mod store;
pub mod workspaces;

// Re-export main types for convenience
pub use client::{Payload, RemoteClient};
pub use codec::CodecError;
pub use config::BackendConfig;
pub use error::{StateError, StateResult};
pub use lock::LockInfo;
pub use store::{MemoryStore, ObjectStore, SecretStore, StorageObject};
pub use workspaces::{DEFAULT_WORKSPACE, WorkspaceDirectory};
