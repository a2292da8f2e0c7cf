//! Backend configuration
//!
//! Every recognized option is an explicit field with a fixed resolution
//! rule: explicit value, then environment variable, then literal default.
//! Resolution happens once, when the config is constructed; nothing in the
//! client reads the environment after that.

use std::path::PathBuf;
use std::sync::Arc;

use kube::Client;
use kube::config::{Config, KubeConfigOptions, Kubeconfig};

use crate::error::{StateError, StateResult};
use crate::store::SecretStore;
use crate::workspaces::WorkspaceDirectory;

/// Configuration for the Kubernetes state backend
///
/// Immutable once constructed; pass it (or the directory it connects to)
/// into whatever needs state access. Cluster credentials themselves are
/// handled by `kube`'s own config loading.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Suffix for state secret names, isolating independent deployments
    /// that share a namespace. Required, no environment fallback.
    pub secret_suffix: String,
    /// Namespace the state secrets live in.
    /// `KUBE_NAMESPACE`, default `"default"`.
    pub namespace: String,
    /// Path to a kubeconfig file. `KUBE_CONFIG` then `KUBECONFIG`,
    /// default none (cluster connection is inferred).
    pub config_path: Option<PathBuf>,
    /// Kubeconfig context to use. `KUBE_CTX`, default the current context.
    pub config_context: Option<String>,
    /// Authenticate with the pod's service account instead of a kubeconfig.
    /// `KUBE_SERVICE_ACCOUNT`, default false.
    pub service_account: bool,
}

impl BackendConfig {
    /// Build a config for a secret suffix, resolving every other option
    /// from the environment or its default
    pub fn new(secret_suffix: impl Into<String>) -> Self {
        Self {
            secret_suffix: secret_suffix.into(),
            namespace: env_var("KUBE_NAMESPACE").unwrap_or_else(|| "default".to_string()),
            config_path: env_var("KUBE_CONFIG")
                .or_else(|| env_var("KUBECONFIG"))
                .map(PathBuf::from),
            config_context: env_var("KUBE_CTX"),
            service_account: env_var("KUBE_SERVICE_ACCOUNT")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Connect to the cluster and return the workspace directory for this
    /// namespace and suffix
    pub async fn connect(&self) -> StateResult<WorkspaceDirectory> {
        if self.secret_suffix.is_empty() {
            return Err(StateError::Configuration(
                "secret_suffix must not be empty".to_string(),
            ));
        }

        let config = self.kube_config().await?;
        let client = Client::try_from(config)
            .map_err(|e| StateError::Configuration(e.to_string()))?;
        let store = SecretStore::new(client, &self.namespace);
        Ok(WorkspaceDirectory::new(
            Arc::new(store),
            self.secret_suffix.clone(),
        ))
    }

    async fn kube_config(&self) -> StateResult<Config> {
        if self.service_account {
            return Config::incluster().map_err(|e| StateError::Configuration(e.to_string()));
        }

        if let Some(path) = &self.config_path {
            let kubeconfig = Kubeconfig::read_from(path)
                .map_err(|e| StateError::Configuration(e.to_string()))?;
            let options = KubeConfigOptions {
                context: self.config_context.clone(),
                ..Default::default()
            };
            return Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|e| StateError::Configuration(e.to_string()));
        }

        Config::infer()
            .await
            .map_err(|e| StateError::Configuration(e.to_string()))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_value_overrides_default() {
        let mut config = BackendConfig::new("prod");
        config.namespace = "infra".to_string();
        assert_eq!(config.namespace, "infra");
    }

    // Default and env-fallback assertions share one test so nothing else
    // runs in parallel with the KUBE_CTX mutation
    #[test]
    fn test_environment_resolution() {
        let config = BackendConfig::new("prod");
        assert_eq!(config.secret_suffix, "prod");
        assert!(!config.service_account);
        assert!(config.config_context.is_none());

        // Only this test touches KUBE_CTX
        unsafe { std::env::set_var("KUBE_CTX", "minikube") };
        let config = BackendConfig::new("prod");
        assert_eq!(config.config_context.as_deref(), Some("minikube"));
        unsafe { std::env::remove_var("KUBE_CTX") };
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_suffix() {
        let config = BackendConfig::new("");
        assert!(matches!(
            config.connect().await,
            Err(StateError::Configuration(_))
        ));
    }
}
