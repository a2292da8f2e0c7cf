//! Object store abstraction over the Kubernetes Secrets API
//!
//! The state client only needs five primitives from the substrate: atomic
//! create, read, version-guarded update, delete and label-filtered list.
//! `ObjectStore` captures exactly that surface so the lock protocol can be
//! exercised against an in-process store in tests.

mod kubernetes;
mod memory;

pub use kubernetes::SecretStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::StateResult;

/// One stored object: a named, labeled map of byte-valued fields
///
/// `version` carries the substrate's optimistic-concurrency token. It is set
/// on objects returned by the store and must be passed back unchanged on
/// `update`; a stale token makes the update fail with
/// [`StateError::Conflict`](crate::StateError::Conflict).
#[derive(Debug, Clone, Default)]
pub struct StorageObject {
    /// Object name, unique within the namespace
    pub name: String,
    /// Classification labels used for list filtering
    pub labels: BTreeMap<String, String>,
    /// Byte-valued data fields
    pub data: BTreeMap<String, Vec<u8>>,
    /// Concurrency token, `None` for objects not yet stored
    pub version: Option<String>,
}

impl StorageObject {
    /// Create an empty object with a name and labels
    pub fn new(name: impl Into<String>, labels: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            labels,
            data: BTreeMap::new(),
            version: None,
        }
    }

    /// A data field, treating an empty value the same as an absent one
    pub fn field(&self, key: &str) -> Option<&[u8]> {
        match self.data.get(key) {
            Some(value) if !value.is_empty() => Some(value.as_slice()),
            _ => None,
        }
    }
}

/// Narrow capability set consumed from the substrate
///
/// Implementations must guarantee that exactly one of N concurrent `create`
/// calls for the same name succeeds, and that `update` rejects writes based
/// on a stale `version`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Atomically create an object; fails with `AlreadyExists` if the name
    /// is taken
    async fn create(&self, object: &StorageObject) -> StateResult<StorageObject>;

    /// Fetch an object by name; fails with `NotFound`
    async fn get(&self, name: &str) -> StateResult<StorageObject>;

    /// Replace an object's contents; fails with `Conflict` when the
    /// presented version is stale, or `NotFound` when the object is gone
    async fn update(&self, object: &StorageObject) -> StateResult<StorageObject>;

    /// Delete an object by name; fails with `NotFound`
    async fn delete(&self, name: &str) -> StateResult<()>;

    /// List all objects whose labels contain every `selector` entry
    async fn list(&self, selector: &BTreeMap<String, String>) -> StateResult<Vec<StorageObject>>;
}
