//! In-memory [`IstioClient`] for service tests

use crate::kube::{IstioClient, VerbDecision};
use crate::models::IstioObject;
use crate::resource::ResourceKind;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct FakeClient {
    objects: HashMap<ResourceKind, Vec<IstioObject>>,
    failing: HashMap<ResourceKind, String>,
    permissions: Option<Vec<VerbDecision>>,
    mutation_error: Option<String>,
    pub fetch_calls: AtomicUsize,
    /// `verb api namespace resource_type [name]` per store mutation
    pub mutations: Mutex<Vec<String>>,
    /// `(api, resource_type)` per access review
    pub reviews: Mutex<Vec<(String, String)>>,
}

pub(crate) fn object(kind: &str, name: &str) -> IstioObject {
    serde_json::from_value(json!({
        "kind": kind,
        "metadata": {"name": name, "namespace": "bookinfo"},
        "spec": {}
    }))
    .unwrap()
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects(mut self, kind: ResourceKind, objects: Vec<IstioObject>) -> Self {
        self.objects.insert(kind, objects);
        self
    }

    pub fn failing(mut self, kind: ResourceKind, message: &str) -> Self {
        self.failing.insert(kind, message.to_string());
        self
    }

    pub fn with_permissions(mut self, decisions: &[(&str, bool)]) -> Self {
        self.permissions = Some(
            decisions
                .iter()
                .map(|(verb, allowed)| VerbDecision {
                    verb: verb.to_string(),
                    allowed: *allowed,
                })
                .collect(),
        );
        self
    }

    pub fn failing_mutations(mut self, message: &str) -> Self {
        self.mutation_error = Some(message.to_string());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn record(&self, entry: String) -> Result<()> {
        self.mutations.lock().unwrap().push(entry);
        match &self.mutation_error {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IstioClient for FakeClient {
    async fn get_istio_objects(&self, kind: ResourceKind, _namespace: &str) -> Result<Vec<IstioObject>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        // Let sibling fetches interleave
        tokio::task::yield_now().await;
        if let Some(message) = self.failing.get(&kind) {
            return Err(anyhow!(message.clone()));
        }
        Ok(self.objects.get(&kind).cloned().unwrap_or_default())
    }

    async fn get_istio_object(
        &self,
        kind: ResourceKind,
        _namespace: &str,
        _subtype: &str,
        name: &str,
    ) -> Result<IstioObject> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failing.get(&kind) {
            return Err(anyhow!(message.clone()));
        }
        self.objects
            .get(&kind)
            .and_then(|objects| objects.iter().find(|o| o.metadata.name == name))
            .cloned()
            .ok_or_else(|| anyhow!("{} \"{}\" not found", kind, name))
    }

    async fn create_istio_object(
        &self,
        api: &str,
        namespace: &str,
        resource_type: &str,
        body: &str,
    ) -> Result<IstioObject> {
        self.record(format!("create {} {} {}", api, namespace, resource_type))?;
        let mut created: IstioObject = serde_json::from_str(body)?;
        created.metadata.namespace = namespace.to_string();
        Ok(created)
    }

    async fn update_istio_object(
        &self,
        api: &str,
        namespace: &str,
        resource_type: &str,
        name: &str,
        patch: &str,
    ) -> Result<IstioObject> {
        self.record(format!("update {} {} {} {}", api, namespace, resource_type, name))?;
        let mut updated: IstioObject = serde_json::from_str(patch)?;
        updated.metadata.name = name.to_string();
        updated.metadata.namespace = namespace.to_string();
        Ok(updated)
    }

    async fn delete_istio_object(
        &self,
        api: &str,
        namespace: &str,
        resource_type: &str,
        name: &str,
    ) -> Result<()> {
        self.record(format!("delete {} {} {} {}", api, namespace, resource_type, name))
    }

    async fn get_self_subject_access_review(
        &self,
        _namespace: &str,
        api: &str,
        resource_type: &str,
        verbs: &[&str],
    ) -> Result<Vec<VerbDecision>> {
        self.reviews
            .lock()
            .unwrap()
            .push((api.to_string(), resource_type.to_string()));
        let decisions = self
            .permissions
            .clone()
            .ok_or_else(|| anyhow!("selfsubjectaccessreviews is forbidden"))?;
        Ok(decisions
            .into_iter()
            .filter(|d| verbs.contains(&d.verb.as_str()))
            .collect())
    }
}
