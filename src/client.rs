//! Remote state client for a single workspace
//!
//! One secret per workspace holds both the compressed state payload and the
//! current lock record. Mutual exclusion is built from the two atomic
//! primitives the API server gives us: create-if-absent for first-time
//! acquisition and resourceVersion-guarded replace for everything else.
//! Contention is always reported to the caller, never retried here.

use std::sync::Arc;
use tracing::debug;

use crate::codec;
use crate::error::{StateError, StateResult};
use crate::lock::LockInfo;
use crate::names::{self, LOCK_FIELD, STATE_FIELD};
use crate::store::{ObjectStore, StorageObject};

/// A state payload together with its integrity digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Decompressed state bytes
    pub data: Vec<u8>,
    /// MD5 digest of `data`
    pub md5: [u8; 16],
}

/// Client for one workspace's remote state
///
/// Stateless apart from its addressing triple; cheap to construct per
/// operation. All calls are single blocking round trips to the store (plus
/// one re-read on contested lock paths).
pub struct RemoteClient {
    store: Arc<dyn ObjectStore>,
    suffix: String,
    workspace: String,
}

impl RemoteClient {
    /// Create a client for a workspace under the given secret suffix
    pub fn new(
        store: Arc<dyn ObjectStore>,
        suffix: impl Into<String>,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            store,
            suffix: suffix.into(),
            workspace: workspace.into(),
        }
    }

    /// The workspace this client addresses
    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    /// Name of the secret backing this workspace
    pub fn secret_name(&self) -> String {
        names::secret_name(&self.workspace, &self.suffix)
    }

    /// Read the current state payload
    ///
    /// Returns `None` when no state has been written yet, either because
    /// the secret does not exist or because it was created by a lock
    /// acquisition and holds no state field.
    pub async fn get(&self) -> StateResult<Option<Payload>> {
        let object = match self.store.get(&self.secret_name()).await {
            Ok(object) => object,
            Err(StateError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let Some(raw) = object.field(STATE_FIELD) else {
            // The secret exists but there is no state in it
            return Ok(None);
        };

        let data = codec::decompress(raw)?;
        let md5 = codec::digest(&data);
        Ok(Some(Payload { data, md5 }))
    }

    /// Write a state payload into the workspace's secret
    ///
    /// The secret must already exist (it is created by lock acquisition);
    /// writing into a missing secret means no lock is held and fails. The
    /// lock field is carried through the update untouched.
    pub async fn put(&self, data: &[u8]) -> StateResult<()> {
        let name = self.secret_name();
        let compressed = codec::compress(data)?;

        let mut object = match self.store.get(&name).await {
            Ok(object) => object,
            Err(StateError::NotFound(_)) => {
                return Err(StateError::Precondition(format!(
                    "state secret {} does not exist, so no lock is held; lock the workspace before writing",
                    name
                )));
            }
            Err(e) => return Err(e),
        };

        object.data.insert(STATE_FIELD.to_string(), compressed);
        self.store.update(&object).await?;
        Ok(())
    }

    /// Delete the workspace's secret, state and lock record included
    ///
    /// Deleting a workspace that has no secret is not an error.
    pub async fn delete(&self) -> StateResult<()> {
        match self.store.delete(&self.secret_name()).await {
            Ok(()) => Ok(()),
            Err(StateError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Acquire the workspace lock, recording `info` as the holder
    ///
    /// First writer wins. Losers get [`StateError::LockHeld`] carrying the
    /// holder's record; retrying is the caller's decision. On success the
    /// returned ID is the one `unlock` must present.
    pub async fn lock(&self, info: &LockInfo) -> StateResult<String> {
        let name = self.secret_name();
        let record = serialize_lock(info)?;

        let mut object = match self.store.get(&name).await {
            Ok(object) => object,
            Err(StateError::NotFound(_)) => {
                // No secret yet: create it holding only the lock record.
                let mut fresh =
                    StorageObject::new(&name, names::state_labels(&self.workspace, &self.suffix));
                fresh.data.insert(LOCK_FIELD.to_string(), record.clone());
                match self.store.create(&fresh).await {
                    Ok(_) => {
                        debug!(workspace = %self.workspace, id = %info.id, "lock acquired on create");
                        return Ok(info.id.clone());
                    }
                    // The secret appeared between the get and the create;
                    // re-read and contest it below.
                    Err(StateError::AlreadyExists(_)) => self.store.get(&name).await?,
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        };

        if let Some(current) = read_lock(&object)? {
            return Err(StateError::LockHeld { info: current });
        }

        object.data.insert(LOCK_FIELD.to_string(), record);
        match self.store.update(&object).await {
            Ok(_) => {
                debug!(workspace = %self.workspace, id = %info.id, "lock acquired on update");
                Ok(info.id.clone())
            }
            // Our read was stale; whoever replaced the secret holds the lock.
            Err(StateError::Conflict(_)) => match self.current_lock().await? {
                Some(winner) => Err(StateError::LockHeld { info: winner }),
                None => Err(StateError::Conflict(name)),
            },
            Err(e) => Err(e),
        }
    }

    /// Release the workspace lock
    ///
    /// Idempotent for a missing secret or an already-cleared lock field. A
    /// non-matching ID fails with [`StateError::LockMismatch`] carrying the
    /// holder's record; force-unlock is the caller presenting the holder's
    /// real ID obtained from that record, not a separate entrypoint.
    pub async fn unlock(&self, id: &str) -> StateResult<()> {
        let mut object = match self.store.get(&self.secret_name()).await {
            Ok(object) => object,
            // No secret, nothing to unlock
            Err(StateError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        let Some(current) = read_lock(&object)? else {
            return Ok(());
        };

        if current.id != id {
            return Err(StateError::LockMismatch {
                id: id.to_string(),
                info: current,
            });
        }

        object.data.insert(LOCK_FIELD.to_string(), Vec::new());
        self.store.update(&object).await?;
        debug!(workspace = %self.workspace, id = %id, "lock released");
        Ok(())
    }

    /// The lock record currently held on this workspace, if any
    ///
    /// Diagnostic read used by callers to show holder details or to pick up
    /// the ID for an administrative force-unlock.
    pub async fn current_lock(&self) -> StateResult<Option<LockInfo>> {
        match self.store.get(&self.secret_name()).await {
            Ok(object) => read_lock(&object),
            Err(StateError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn serialize_lock(info: &LockInfo) -> StateResult<Vec<u8>> {
    serde_json::to_vec(info).map_err(|e| StateError::Serialization(e.to_string()))
}

fn read_lock(object: &StorageObject) -> StateResult<Option<LockInfo>> {
    let Some(raw) = object.field(LOCK_FIELD) else {
        return Ok(None);
    };
    let info =
        serde_json::from_slice(raw).map_err(|e| StateError::Serialization(e.to_string()))?;
    Ok(Some(info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Delegates to a `MemoryStore`, but can serve one captured snapshot on
    /// the next `get` so a reader acts on a version that is no longer
    /// current
    struct StaleReadStore {
        inner: MemoryStore,
        stale: Mutex<Option<StorageObject>>,
    }

    impl StaleReadStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                stale: Mutex::new(None),
            }
        }

        async fn capture(&self, name: &str) {
            let object = self.inner.get(name).await.unwrap();
            *self.stale.lock().unwrap() = Some(object);
        }
    }

    #[async_trait]
    impl ObjectStore for StaleReadStore {
        async fn create(&self, object: &StorageObject) -> StateResult<StorageObject> {
            self.inner.create(object).await
        }

        async fn get(&self, name: &str) -> StateResult<StorageObject> {
            if let Some(stale) = self.stale.lock().unwrap().take() {
                return Ok(stale);
            }
            self.inner.get(name).await
        }

        async fn update(&self, object: &StorageObject) -> StateResult<StorageObject> {
            self.inner.update(object).await
        }

        async fn delete(&self, name: &str) -> StateResult<()> {
            self.inner.delete(name).await
        }

        async fn list(
            &self,
            selector: &BTreeMap<String, String>,
        ) -> StateResult<Vec<StorageObject>> {
            self.inner.list(selector).await
        }
    }

    fn client_pair() -> (RemoteClient, RemoteClient) {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let a = RemoteClient::new(store.clone(), "prod", "default");
        let b = RemoteClient::new(store, "prod", "default");
        (a, b)
    }

    #[tokio::test]
    async fn test_get_before_any_write() {
        let (client, _) = client_pair();
        assert!(client.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_after_lock_but_before_put() {
        let (client, _) = client_pair();
        let info = LockInfo::new("init");
        client.lock(&info).await.unwrap();
        // The secret exists now but carries no state field
        assert!(client.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_requires_existing_secret() {
        let (client, _) = client_pair();
        let result = client.put(b"state").await;
        assert!(matches!(result, Err(StateError::Precondition(_))));
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips() {
        let (client, _) = client_pair();
        let info = LockInfo::new("apply");
        client.lock(&info).await.unwrap();

        client.put(b"hello").await.unwrap();
        let payload = client.get().await.unwrap().unwrap();
        assert_eq!(payload.data, b"hello");
        assert_eq!(payload.md5, codec::digest(b"hello"));
    }

    #[tokio::test]
    async fn test_put_preserves_lock() {
        let (client, other) = client_pair();
        let info = LockInfo::new("apply");
        let id = client.lock(&info).await.unwrap();

        client.put(b"hello").await.unwrap();

        // The write must not have cleared the lock
        let result = other.lock(&LockInfo::new("plan")).await;
        match result {
            Err(StateError::LockHeld { info: held }) => assert_eq!(held.id, id),
            other => panic!("expected LockHeld, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_second_lock_reports_holder() {
        let (client_a, client_b) = client_pair();
        let info_a = LockInfo::new("apply").with_info("first");
        let id_a = client_a.lock(&info_a).await.unwrap();
        assert_eq!(id_a, info_a.id);

        let info_b = LockInfo::new("destroy");
        match client_b.lock(&info_b).await {
            Err(StateError::LockHeld { info }) => {
                assert_eq!(info.id, info_a.id);
                assert_eq!(info.operation, "apply");
                assert_eq!(info.who, info_a.who);
            }
            other => panic!("expected LockHeld, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_lock_unlock_relock_cycle() {
        let (client_a, client_b) = client_pair();
        let info_a = LockInfo::new("apply");
        let id_a = client_a.lock(&info_a).await.unwrap();

        let info_b = LockInfo::new("plan");
        assert!(client_b.lock(&info_b).await.is_err());

        client_a.unlock(&id_a).await.unwrap();
        let id_b = client_b.lock(&info_b).await.unwrap();
        assert_eq!(id_b, info_b.id);
    }

    #[tokio::test]
    async fn test_unlock_is_idempotent() {
        let (client, _) = client_pair();
        // No secret at all
        client.unlock("any-id").await.unwrap();

        // Secret exists with a cleared lock field
        let info = LockInfo::new("apply");
        let id = client.lock(&info).await.unwrap();
        client.unlock(&id).await.unwrap();
        client.unlock(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_unlock_wrong_id_reports_holder() {
        let (client, _) = client_pair();
        let info = LockInfo::new("apply");
        let id = client.lock(&info).await.unwrap();

        match client.unlock("not-the-id").await {
            Err(StateError::LockMismatch { id: given, info }) => {
                assert_eq!(given, "not-the-id");
                assert_eq!(info.id, id);
            }
            other => panic!("expected LockMismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_force_unlock_with_borrowed_id() {
        let (client_a, client_b) = client_pair();
        let id = client_a.lock(&LockInfo::new("apply")).await.unwrap();

        // An administrator reads the holder's ID out of the diagnostics and
        // releases the lock from a different client.
        let held = client_b.current_lock().await.unwrap().unwrap();
        assert_eq!(held.id, id);
        client_b.unlock(&held.id).await.unwrap();

        assert!(client_b.lock(&LockInfo::new("apply")).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_lock_exactly_one_winner() {
        let (client_a, client_b) = client_pair();
        let info_a = LockInfo::new("apply");
        let info_b = LockInfo::new("apply");

        let (result_a, result_b) = tokio::join!(client_a.lock(&info_a), client_b.lock(&info_b));
        let winners = [&result_a, &result_b]
            .iter()
            .filter(|r| r.is_ok())
            .count();
        assert_eq!(winners, 1);

        let (winner_id, loser) = if result_a.is_ok() {
            (result_a.unwrap(), result_b)
        } else {
            (result_b.unwrap(), result_a)
        };
        match loser {
            Err(StateError::LockHeld { info }) => assert_eq!(info.id, winner_id),
            other => panic!("expected LockHeld, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_stale_lock_update_reports_winner() {
        let store = Arc::new(StaleReadStore::new());
        let client_a = RemoteClient::new(store.clone(), "prod", "default");
        let client_b = RemoteClient::new(store.clone(), "prod", "default");

        // Create the secret and leave it unlocked
        let id = client_a.lock(&LockInfo::new("init")).await.unwrap();
        client_a.unlock(&id).await.unwrap();

        // B will read the secret as it is right now: existing, unlocked
        store.capture(&client_b.secret_name()).await;

        // A relocks, so B's captured read is stale and B's update must be
        // rejected by the version check, not silently clobber A's lock
        let winner = LockInfo::new("apply");
        let winner_id = client_a.lock(&winner).await.unwrap();

        match client_b.lock(&LockInfo::new("plan")).await {
            Err(StateError::LockHeld { info }) => {
                assert_eq!(info.id, winner_id);
                assert_eq!(info.operation, "apply");
            }
            other => panic!("expected LockHeld, got {:?}", other.map(|_| ())),
        }

        // A still holds the lock and can release it normally
        client_a.unlock(&winner_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (client, _) = client_pair();
        client.delete().await.unwrap();

        client.lock(&LockInfo::new("init")).await.unwrap();
        client.delete().await.unwrap();
        assert!(client.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_workspaces_are_isolated() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let default = RemoteClient::new(store.clone(), "prod", "default");
        let dev = RemoteClient::new(store, "prod", "dev");

        default.lock(&LockInfo::new("apply")).await.unwrap();
        // A lock on default must not block dev
        dev.lock(&LockInfo::new("apply")).await.unwrap();

        default.put(b"default state").await.unwrap();
        dev.put(b"dev state").await.unwrap();
        assert_eq!(default.get().await.unwrap().unwrap().data, b"default state");
        assert_eq!(dev.get().await.unwrap().unwrap().data, b"dev state");
    }
}
