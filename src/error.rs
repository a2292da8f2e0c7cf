//! Error types for remote state operations

use thiserror::Error;

use crate::codec::CodecError;
use crate::lock::LockInfo;

/// Errors that can occur while reading, writing or locking remote state
#[derive(Debug, Error)]
pub enum StateError {
    /// No object with the given name exists in the namespace
    #[error("state secret not found: {0}")]
    NotFound(String),

    /// An object with the given name already exists (create race)
    #[error("state secret already exists: {0}")]
    AlreadyExists(String),

    /// An optimistic update was rejected because the object changed underneath us
    #[error("state secret was modified concurrently: {0}")]
    Conflict(String),

    /// The state is locked by another process
    #[error(
        "state is locked by {} (lock ID: {}, operation: {}, created: {})",
        .info.who, .info.id, .info.operation, .info.created
    )]
    LockHeld {
        /// The lock currently recorded in the state secret
        info: LockInfo,
    },

    /// The lock ID presented for release does not match the current holder
    #[error(
        "lock ID {id} does not match existing lock held by {} (lock ID: {}, operation: {})",
        .info.who, .info.id, .info.operation
    )]
    LockMismatch {
        /// The ID the caller tried to release with
        id: String,
        /// The lock actually held
        info: LockInfo,
    },

    /// The operation requires a state secret that does not exist yet
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The stored payload could not be compressed or decompressed
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A lock record could not be serialized or parsed
    #[error("invalid lock record: {0}")]
    Serialization(String),

    /// Backend configuration error
    #[error("backend configuration error: {0}")]
    Configuration(String),

    /// Kubernetes API transport or server error
    #[error("kubernetes API error: {0}")]
    Api(String),

    /// The default workspace cannot be deleted
    #[error("the default workspace cannot be deleted")]
    ReservedWorkspace,
}

impl StateError {
    /// True when the error means "the object is simply not there"
    pub fn is_not_found(&self) -> bool {
        matches!(self, StateError::NotFound(_))
    }
}

/// Result type for remote state operations
pub type StateResult<T> = Result<T, StateError>;
