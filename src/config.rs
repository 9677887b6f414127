//! Configuration Management
//!
//! Handles persistent configuration storage for meshconf and resolution of
//! the effective cluster connection settings.

use crate::kube::auth::{self, KubeCredentials};
use crate::kube::client::KubeClient;
use crate::kube::http::KubeHttpClient;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Address of a local `kubectl proxy`
pub const DEFAULT_API_SERVER: &str = "http://127.0.0.1:8001";

pub const DEFAULT_NAMESPACE: &str = "default";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Kubernetes API server URL
    #[serde(default)]
    pub api_server: Option<String>,
    /// Static bearer token
    #[serde(default)]
    pub token: Option<String>,
    /// File holding a bearer token
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    /// PEM bundle used to verify the API server
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
    /// Namespace used when none is given on the command line
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("meshconf").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load configuration from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective API server (config > in-cluster > kubectl proxy)
    pub fn effective_api_server(&self) -> String {
        self.api_server
            .clone()
            .or_else(auth::in_cluster_api_server)
            .unwrap_or_else(|| DEFAULT_API_SERVER.to_string())
    }

    /// Get effective namespace (config > in-cluster > "default")
    pub fn effective_namespace(&self) -> String {
        self.namespace
            .clone()
            .or_else(auth::in_cluster_namespace)
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
    }

    /// Get effective credentials (token > token file > in-cluster > none)
    pub fn credentials(&self) -> KubeCredentials {
        if let Some(token) = &self.token {
            return KubeCredentials::from_token(token);
        }
        if let Some(path) = &self.token_file {
            return KubeCredentials::from_file(path);
        }
        if self.api_server.is_none() {
            if let Some(credentials) = KubeCredentials::in_cluster() {
                return credentials;
            }
        }
        KubeCredentials::anonymous()
    }

    /// Get effective CA bundle (config > in-cluster service account)
    pub fn effective_ca_file(&self) -> Option<PathBuf> {
        if self.ca_file.is_some() {
            return self.ca_file.clone();
        }
        if self.api_server.is_none() && auth::in_cluster_api_server().is_some() {
            let path = Path::new(auth::SERVICE_ACCOUNT_DIR).join("ca.crt");
            return path.exists().then_some(path);
        }
        None
    }

    /// Build a cluster client from the effective settings
    pub fn build_client(&self) -> Result<KubeClient> {
        let ca_file = self.effective_ca_file();
        let http = KubeHttpClient::new(ca_file.as_deref(), self.insecure_skip_tls_verify)?;
        KubeClient::new(&self.effective_api_server(), self.credentials(), http)
            .context("Failed to initialize cluster client")
    }

    /// Copy of this configuration with one-off command-line settings applied.
    ///
    /// The copy is for building a client only and is never saved.
    pub fn with_overrides(&self, api_server: Option<&str>, token: Option<&str>) -> Self {
        let mut config = self.clone();
        if let Some(api_server) = api_server {
            config.api_server = Some(api_server.to_string());
        }
        if let Some(token) = token {
            config.token = Some(token.to_string());
        }
        config
    }

    /// Set default namespace in the config file
    pub fn save_namespace(namespace: &str) -> Result<()> {
        let Some(path) = Self::config_path() else {
            anyhow::bail!("No configuration directory available");
        };
        Self::save_namespace_to(&path, namespace)?;
        Ok(())
    }

    /// Set default namespace in the file at `path`, leaving its other settings as stored
    pub fn save_namespace_to(path: &Path, namespace: &str) -> Result<Self> {
        if !auth::validate_namespace(namespace) {
            anyhow::bail!("Invalid namespace name: {}", namespace);
        }
        let mut config = Self::load_from(path);
        config.namespace = Some(namespace.to_string());
        config.save_to(path)?;
        Ok(config)
    }
}
