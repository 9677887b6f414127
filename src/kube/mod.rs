//! Kubernetes API interaction module
//!
//! The configuration service talks to the cluster only through the
//! [`IstioClient`] trait. [`client::KubeClient`] implements it over the
//! Kubernetes REST API; tests substitute in-memory fakes.
//!
//! # Module Structure
//!
//! - [`auth`] - Bearer token resolution (static, token file, in-cluster)
//! - [`client`] - REST implementation of [`IstioClient`]
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use meshconf::kube::{auth::KubeCredentials, client::KubeClient, http::KubeHttpClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let http = KubeHttpClient::new(None, false)?;
//!     let client = KubeClient::new("http://127.0.0.1:8001", KubeCredentials::anonymous(), http)?;
//!     let rules = client.get_istio_objects(ResourceKind::Rules, "istio-system").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;

use crate::models::IstioObject;
use crate::resource::ResourceKind;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of an access review for one verb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbDecision {
    pub verb: String,
    pub allowed: bool,
}

/// Storage and authorization operations consumed by the configuration service
#[async_trait]
pub trait IstioClient: Send + Sync {
    /// List every object of `kind` in a namespace
    async fn get_istio_objects(&self, kind: ResourceKind, namespace: &str)
        -> Result<Vec<IstioObject>>;

    /// Fetch one object; `subtype` selects the schema for adapters and templates
    async fn get_istio_object(
        &self,
        kind: ResourceKind,
        namespace: &str,
        subtype: &str,
        name: &str,
    ) -> Result<IstioObject>;

    async fn create_istio_object(
        &self,
        api: &str,
        namespace: &str,
        resource_type: &str,
        body: &str,
    ) -> Result<IstioObject>;

    /// Apply a JSON merge patch to an existing object
    async fn update_istio_object(
        &self,
        api: &str,
        namespace: &str,
        resource_type: &str,
        name: &str,
        patch: &str,
    ) -> Result<IstioObject>;

    async fn delete_istio_object(
        &self,
        api: &str,
        namespace: &str,
        resource_type: &str,
        name: &str,
    ) -> Result<()>;

    /// Ask whether the caller may perform each of `verbs` on a resource type
    async fn get_self_subject_access_review(
        &self,
        namespace: &str,
        api: &str,
        resource_type: &str,
        verbs: &[&str],
    ) -> Result<Vec<VerbDecision>>;
}
