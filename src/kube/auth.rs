//! Cluster Authentication
//!
//! Resolves the bearer token sent to the Kubernetes API server: a static
//! token, a token file (cached for a minute, then re-read so rotated service-account
//! tokens are picked up), or none when talking through `kubectl proxy`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Mount point of the in-cluster service account
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// How long a token read from a file is reused before re-reading it
const TOKEN_FILE_TTL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
enum TokenSource {
    None,
    Static(String),
    File(PathBuf),
}

/// Bearer credentials holder with token-file caching
#[derive(Clone)]
pub struct KubeCredentials {
    source: TokenSource,
    file_ttl: Duration,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl KubeCredentials {
    /// No authentication (e.g. `kubectl proxy`)
    pub fn anonymous() -> Self {
        Self::with_source(TokenSource::None)
    }

    /// A fixed bearer token
    pub fn from_token(token: &str) -> Self {
        Self::with_source(TokenSource::Static(token.trim().to_string()))
    }

    /// A bearer token read from `path`
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::with_source(TokenSource::File(path.into()))
    }

    /// In-cluster service account token, when mounted
    pub fn in_cluster() -> Option<Self> {
        let path = Path::new(SERVICE_ACCOUNT_DIR).join("token");
        path.exists().then(|| Self::from_file(path))
    }

    fn with_source(source: TokenSource) -> Self {
        Self {
            source,
            file_ttl: TOKEN_FILE_TTL,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Override how long a token read from a file is reused
    pub fn with_file_ttl(mut self, ttl: Duration) -> Self {
        self.file_ttl = ttl;
        self
    }

    /// Get the bearer token for API calls, if any
    pub async fn get_token(&self) -> Result<Option<String>> {
        let path = match &self.source {
            TokenSource::None => return Ok(None),
            TokenSource::Static(token) => return Ok(Some(token.clone())),
            TokenSource::File(path) => path,
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(Some(cached.token.clone()));
                }
                tracing::debug!("Cached token expired, re-reading {:?}", path);
            }
        }

        let token = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read token file {:?}", path))?
            .trim()
            .to_string();

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at: Instant::now() + self.file_ttl,
            });
        }

        Ok(Some(token))
    }
}

/// API server address when running inside a pod
pub fn in_cluster_api_server() -> Option<String> {
    let host = std::env::var("KUBERNETES_SERVICE_HOST").ok()?;
    let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
    if host.contains(':') {
        // IPv6
        Some(format!("https://[{}]:{}", host, port))
    } else {
        Some(format!("https://{}:{}", host, port))
    }
}

/// Validate a namespace name (RFC 1123 label)
pub fn validate_namespace(namespace: &str) -> bool {
    if namespace.is_empty() || namespace.len() > 63 {
        return false;
    }
    if namespace.starts_with('-') || namespace.ends_with('-') {
        return false;
    }
    namespace
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Namespace of the in-cluster service account
pub fn in_cluster_namespace() -> Option<String> {
    let path = Path::new(SERVICE_ACCOUNT_DIR).join("namespace");
    let namespace = std::fs::read_to_string(path).ok()?.trim().to_string();
    if validate_namespace(&namespace) {
        Some(namespace)
    } else {
        tracing::warn!("Invalid namespace in service account mount");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_namespace() {
        assert!(validate_namespace("bookinfo"));
        assert!(validate_namespace("istio-system"));
        assert!(!validate_namespace(""));
        assert!(!validate_namespace("-leading"));
        assert!(!validate_namespace("Upper"));
        assert!(!validate_namespace(&"a".repeat(64)));
    }

    #[tokio::test]
    async fn test_static_and_anonymous_tokens() {
        assert_eq!(KubeCredentials::anonymous().get_token().await.unwrap(), None);
        assert_eq!(
            KubeCredentials::from_token(" abc \n").get_token().await.unwrap(),
            Some("abc".to_string())
        );
    }

    #[tokio::test]
    async fn test_token_file_is_read_and_cached() {
        let path = std::env::temp_dir().join(format!("meshconf-token-{}", std::process::id()));
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "file-token").unwrap();
        }

        let credentials = KubeCredentials::from_file(&path);
        assert_eq!(
            credentials.get_token().await.unwrap().as_deref(),
            Some("file-token")
        );

        std::fs::remove_file(&path).unwrap();
        // Still served from cache
        assert_eq!(
            credentials.get_token().await.unwrap().as_deref(),
            Some("file-token")
        );
    }

    #[tokio::test]
    async fn test_expired_token_file_is_reread() {
        let path = std::env::temp_dir().join(format!("meshconf-rotated-{}", std::process::id()));
        std::fs::write(&path, "first\n").unwrap();

        let credentials = KubeCredentials::from_file(&path).with_file_ttl(Duration::ZERO);
        assert_eq!(credentials.get_token().await.unwrap().as_deref(), Some("first"));

        std::fs::write(&path, "rotated\n").unwrap();
        assert_eq!(credentials.get_token().await.unwrap().as_deref(), Some("rotated"));

        std::fs::remove_file(&path).unwrap();
        assert!(credentials.get_token().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_token_file_errors() {
        let credentials = KubeCredentials::from_file("/nonexistent/meshconf/token");
        assert!(credentials.get_token().await.is_err());
    }
}
