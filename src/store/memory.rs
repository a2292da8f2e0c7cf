//! In-process object store
//!
//! Implements the same atomic-create and version-checked update semantics
//! the API server provides, backed by a mutex-guarded map. Used by the
//! protocol tests and useful for embedding the client without a cluster.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::error::{StateError, StateResult};
use crate::store::{ObjectStore, StorageObject};

/// Object store backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, StorageObject>>,
    counter: Mutex<u64>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        counter.to_string()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn create(&self, object: &StorageObject) -> StateResult<StorageObject> {
        let version = self.next_version();
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&object.name) {
            return Err(StateError::AlreadyExists(object.name.clone()));
        }
        let mut stored = object.clone();
        stored.version = Some(version);
        objects.insert(stored.name.clone(), stored.clone());
        Ok(stored)
    }

    async fn get(&self, name: &str) -> StateResult<StorageObject> {
        let objects = self.objects.lock().unwrap();
        objects
            .get(name)
            .cloned()
            .ok_or_else(|| StateError::NotFound(name.to_string()))
    }

    async fn update(&self, object: &StorageObject) -> StateResult<StorageObject> {
        let version = self.next_version();
        let mut objects = self.objects.lock().unwrap();
        let current = objects
            .get(&object.name)
            .ok_or_else(|| StateError::NotFound(object.name.clone()))?;
        if current.version != object.version {
            return Err(StateError::Conflict(object.name.clone()));
        }
        let mut stored = object.clone();
        stored.version = Some(version);
        objects.insert(stored.name.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete(&self, name: &str) -> StateResult<()> {
        let mut objects = self.objects.lock().unwrap();
        objects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StateError::NotFound(name.to_string()))
    }

    async fn list(&self, selector: &BTreeMap<String, String>) -> StateResult<Vec<StorageObject>> {
        let objects = self.objects.lock().unwrap();
        let mut matched: Vec<StorageObject> = objects
            .values()
            .filter(|object| {
                selector
                    .iter()
                    .all(|(key, value)| object.labels.get(key) == Some(value))
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matched)
    }
}
