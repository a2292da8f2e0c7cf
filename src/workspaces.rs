//! Workspace enumeration and deletion

use std::sync::Arc;
use tracing::debug;

use crate::client::RemoteClient;
use crate::error::{StateError, StateResult};
use crate::names;
use crate::store::ObjectStore;

/// The workspace that always exists and cannot be deleted
pub const DEFAULT_WORKSPACE: &str = "default";

/// Directory of the workspaces sharing one namespace and secret suffix
pub struct WorkspaceDirectory {
    store: Arc<dyn ObjectStore>,
    suffix: String,
}

impl WorkspaceDirectory {
    /// Create a directory over a store, scoped to one secret suffix
    pub fn new(store: Arc<dyn ObjectStore>, suffix: impl Into<String>) -> Self {
        Self {
            store,
            suffix: suffix.into(),
        }
    }

    /// A state client for one workspace
    pub fn client(&self, workspace: &str) -> StateResult<RemoteClient> {
        if workspace.is_empty() {
            return Err(StateError::Configuration(
                "missing workspace name".to_string(),
            ));
        }
        Ok(RemoteClient::new(
            self.store.clone(),
            self.suffix.clone(),
            workspace,
        ))
    }

    /// List all workspace names
    ///
    /// `default` is always present and listed first; the remaining names are
    /// sorted. Secrets written under older naming generations are included
    /// through the name recognizers.
    pub async fn list(&self) -> StateResult<Vec<String>> {
        let objects = self.store.list(&names::state_selector()).await?;

        let mut workspaces = vec![DEFAULT_WORKSPACE.to_string()];
        for object in &objects {
            if let Some(workspace) = names::recognize(object, &self.suffix)
                && workspace != DEFAULT_WORKSPACE
            {
                workspaces.push(workspace);
            }
        }
        workspaces[1..].sort_unstable();
        workspaces.dedup();
        debug!(count = workspaces.len(), "listed workspaces");
        Ok(workspaces)
    }

    /// Delete a workspace's state secret
    ///
    /// The default workspace is refused; deleting a workspace that has no
    /// secret succeeds.
    pub async fn delete(&self, workspace: &str) -> StateResult<()> {
        if workspace == DEFAULT_WORKSPACE || workspace.is_empty() {
            return Err(StateError::ReservedWorkspace);
        }
        self.client(workspace)?.delete().await
    }
}
