//! Object store backed by Kubernetes secrets

use async_trait::async_trait;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, ListParams, ObjectMeta, PostParams};
use kube::Client;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::{ObjectStore, StorageObject};

/// Object store over the secrets of one namespace
pub struct SecretStore {
    secrets: Api<Secret>,
}

impl SecretStore {
    /// Create a store scoped to a namespace
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            secrets: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl ObjectStore for SecretStore {
    async fn create(&self, object: &StorageObject) -> StateResult<StorageObject> {
        debug!(name = %object.name, "creating state secret");
        let secret = to_secret(object);
        let created = self
            .secrets
            .create(&PostParams::default(), &secret)
            .await
            .map_err(|e| map_kube_error(e, &object.name))?;
        Ok(from_secret(created))
    }

    async fn get(&self, name: &str) -> StateResult<StorageObject> {
        let secret = self
            .secrets
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, name))?;
        Ok(from_secret(secret))
    }

    async fn update(&self, object: &StorageObject) -> StateResult<StorageObject> {
        debug!(name = %object.name, version = ?object.version, "updating state secret");
        let secret = to_secret(object);
        let updated = self
            .secrets
            .replace(&object.name, &PostParams::default(), &secret)
            .await
            .map_err(|e| map_kube_error(e, &object.name))?;
        Ok(from_secret(updated))
    }

    async fn delete(&self, name: &str) -> StateResult<()> {
        debug!(name = %name, "deleting state secret");
        self.secrets
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, name))?;
        Ok(())
    }

    async fn list(&self, selector: &BTreeMap<String, String>) -> StateResult<Vec<StorageObject>> {
        let labels = selector
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(",");
        let params = ListParams::default().labels(&labels);
        let secrets = self
            .secrets
            .list(&params)
            .await
            .map_err(|e| map_kube_error(e, &labels))?;
        Ok(secrets.items.into_iter().map(from_secret).collect())
    }
}

fn to_secret(object: &StorageObject) -> Secret {
    let data = object
        .data
        .iter()
        .map(|(key, value)| (key.clone(), ByteString(value.clone())))
        .collect();

    Secret {
        metadata: ObjectMeta {
            name: Some(object.name.clone()),
            labels: Some(object.labels.clone()),
            // resourceVersion makes the replace an optimistic update
            resource_version: object.version.clone(),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

fn from_secret(secret: Secret) -> StorageObject {
    let data = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(key, ByteString(value))| (key, value))
        .collect();

    StorageObject {
        name: secret.metadata.name.unwrap_or_default(),
        labels: secret.metadata.labels.unwrap_or_default(),
        data,
        version: secret.metadata.resource_version,
    }
}

/// Map the API server's error responses onto the store's typed outcomes
///
/// Transport and auth failures stay opaque and propagate as `Api`.
fn map_kube_error(error: kube::Error, name: &str) -> StateError {
    match &error {
        kube::Error::Api(response) => match response.code {
            404 => StateError::NotFound(name.to_string()),
            409 if response.reason == "AlreadyExists" => {
                StateError::AlreadyExists(name.to_string())
            }
            409 => StateError::Conflict(name.to_string()),
            _ => StateError::Api(error.to_string()),
        },
        _ => StateError::Api(error.to_string()),
    }
}
