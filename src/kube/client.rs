//! Kubernetes Client
//!
//! REST implementation of [`IstioClient`], combining authentication and
//! HTTP functionality.

use super::auth::KubeCredentials;
use super::http::KubeHttpClient;
use super::{IstioClient, VerbDecision};
use crate::models::IstioObject;
use crate::resource::{schema_name_of, subtypes_of, version_of, ResourceKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::{json, Value};

const AUTHORIZATION_API: &str = "authorization.k8s.io/v1";

/// Main cluster client
#[derive(Clone)]
pub struct KubeClient {
    pub credentials: KubeCredentials,
    pub http: KubeHttpClient,
    api_server: String,
}

impl KubeClient {
    /// Create a new client for the API server at `api_server`
    pub fn new(api_server: &str, credentials: KubeCredentials, http: KubeHttpClient) -> Result<Self> {
        let parsed = url::Url::parse(api_server)
            .with_context(|| format!("Invalid API server URL '{}'", api_server))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Unsupported API server scheme '{}'", parsed.scheme());
        }

        Ok(Self {
            credentials,
            http,
            api_server: api_server.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_server(&self) -> &str {
        &self.api_server
    }

    async fn token(&self) -> Result<Option<String>> {
        self.credentials.get_token().await
    }

    /// Make a GET request to the API server
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.token().await?;
        self.http.get(url, token.as_deref()).await
    }

    /// Make a POST request to the API server
    pub async fn post(&self, url: &str, body: &str) -> Result<Value> {
        let token = self.token().await?;
        self.http.post(url, token.as_deref(), body).await
    }

    /// Make a merge-patch request to the API server
    pub async fn patch(&self, url: &str, body: &str) -> Result<Value> {
        let token = self.token().await?;
        self.http.patch(url, token.as_deref(), body).await
    }

    /// Make a DELETE request to the API server
    pub async fn delete(&self, url: &str) -> Result<Value> {
        let token = self.token().await?;
        self.http.delete(url, token.as_deref()).await
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    /// Build a namespaced collection URL for an API group
    /// e.g. `/apis/networking.istio.io/v1alpha3/namespaces/bookinfo/virtualservices`
    pub fn collection_url(&self, api: &str, namespace: &str, resource_type: &str) -> Result<String> {
        let version = version_of(api).with_context(|| format!("Unknown API group: {}", api))?;
        Ok(format!(
            "{}/apis/{}/{}/namespaces/{}/{}",
            self.api_server,
            api,
            version,
            urlencoding::encode(namespace),
            urlencoding::encode(resource_type)
        ))
    }

    /// Build a single object URL for an API group
    pub fn object_url(
        &self,
        api: &str,
        namespace: &str,
        resource_type: &str,
        name: &str,
    ) -> Result<String> {
        Ok(format!(
            "{}/{}",
            self.collection_url(api, namespace, resource_type)?,
            urlencoding::encode(name)
        ))
    }

    fn access_review_url(&self) -> String {
        format!(
            "{}/apis/{}/selfsubjectaccessreviews",
            self.api_server, AUTHORIZATION_API
        )
    }

    async fn list_plural(&self, api: &str, namespace: &str, plural: &str) -> Result<Vec<IstioObject>> {
        let url = self.collection_url(api, namespace, plural)?;
        let response = self.get(&url).await?;
        let items = response
            .get("items")
            .cloned()
            .unwrap_or_else(|| Value::Array(vec![]));
        let mut objects: Vec<IstioObject> =
            serde_json::from_value(items).context("Failed to parse object list")?;

        // List items usually omit their type meta
        let kind = schema_name_of(plural).unwrap_or_default();
        for object in &mut objects {
            if object.kind.is_empty() {
                object.kind = kind.to_string();
            }
        }
        Ok(objects)
    }

    async fn review_verb(
        &self,
        namespace: &str,
        api: &str,
        resource_type: &str,
        verb: &str,
    ) -> Result<VerbDecision> {
        let review = json!({
            "apiVersion": AUTHORIZATION_API,
            "kind": "SelfSubjectAccessReview",
            "spec": {
                "resourceAttributes": {
                    "namespace": namespace,
                    "group": api,
                    "resource": resource_type,
                    "verb": verb,
                }
            }
        });
        let response = self.post(&self.access_review_url(), &review.to_string()).await?;
        let allowed = response
            .get("status")
            .and_then(|s| s.get("allowed"))
            .and_then(|a| a.as_bool())
            .unwrap_or(false);

        Ok(VerbDecision {
            verb: verb.to_string(),
            allowed,
        })
    }
}

fn api_of(kind: ResourceKind) -> Result<&'static str> {
    crate::resource::api_group_of(kind.as_str())
        .with_context(|| format!("No API group registered for {}", kind))
}

fn to_object(value: Value) -> Result<IstioObject> {
    serde_json::from_value(value).context("Failed to parse object")
}

#[async_trait]
impl IstioClient for KubeClient {
    async fn get_istio_objects(&self, kind: ResourceKind, namespace: &str) -> Result<Vec<IstioObject>> {
        let api = api_of(kind)?;

        if !kind.is_polymorphic() {
            return self.list_plural(api, namespace, kind.as_str()).await;
        }

        let lists = try_join_all(
            subtypes_of(kind)
                .iter()
                .map(|subtype| self.list_plural(api, namespace, subtype)),
        )
        .await?;
        Ok(lists.into_iter().flatten().collect())
    }

    async fn get_istio_object(
        &self,
        kind: ResourceKind,
        namespace: &str,
        subtype: &str,
        name: &str,
    ) -> Result<IstioObject> {
        let api = api_of(kind)?;
        let plural = kind.operational_name(subtype)?;
        let url = self.object_url(api, namespace, plural, name)?;
        to_object(self.get(&url).await?)
    }

    async fn create_istio_object(
        &self,
        api: &str,
        namespace: &str,
        resource_type: &str,
        body: &str,
    ) -> Result<IstioObject> {
        let url = self.collection_url(api, namespace, resource_type)?;
        tracing::info!("Creating {} in {}", resource_type, namespace);
        to_object(self.post(&url, body).await?)
    }

    async fn update_istio_object(
        &self,
        api: &str,
        namespace: &str,
        resource_type: &str,
        name: &str,
        patch: &str,
    ) -> Result<IstioObject> {
        let url = self.object_url(api, namespace, resource_type, name)?;
        tracing::info!("Patching {}/{} in {}", resource_type, name, namespace);
        to_object(self.patch(&url, patch).await?)
    }

    async fn delete_istio_object(
        &self,
        api: &str,
        namespace: &str,
        resource_type: &str,
        name: &str,
    ) -> Result<()> {
        let url = self.object_url(api, namespace, resource_type, name)?;
        tracing::info!("Deleting {}/{} in {}", resource_type, name, namespace);
        self.delete(&url).await?;
        Ok(())
    }

    async fn get_self_subject_access_review(
        &self,
        namespace: &str,
        api: &str,
        resource_type: &str,
        verbs: &[&str],
    ) -> Result<Vec<VerbDecision>> {
        try_join_all(
            verbs
                .iter()
                .map(|verb| self.review_verb(namespace, api, resource_type, verb)),
        )
        .await
    }
}
