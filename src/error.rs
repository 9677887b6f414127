//! Error types for the configuration service

use thiserror::Error;

use crate::models::ResourcePermissions;
use crate::resource::ResourceKind;

/// Errors surfaced by [`IstioConfigService`](crate::resource::IstioConfigService)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Istio config list needs a non empty namespace")]
    EmptyNamespace,

    #[error("Object type not found: {0}")]
    UnsupportedKind(String),

    #[error("Object type {0} needs a subtype")]
    MissingSubtype(ResourceKind),

    #[error("Invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: ResourceKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid {0} payload: expected a non empty JSON object")]
    NotAnObject(ResourceKind),

    /// The object could not be fetched; the permission co-query still
    /// completed and its answer is kept
    #[error("{source}")]
    ObjectFetch {
        permissions: ResourcePermissions,
        source: anyhow::Error,
    },

    /// Failure reported by the cluster API, passed through unchanged
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
