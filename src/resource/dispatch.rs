//! CRUD Dispatch
//!
//! Routes create/update/delete calls to the cluster API. Adapters and
//! templates are addressed by their subtype; results are always indexed by
//! the top-level kind.

use super::registry::ResourceKind;
use super::IstioConfigService;
use crate::error::ConfigResult;
use crate::models::{ConfigObject, IstioConfigDetails};

/// Store operation applied by [`IstioConfigService::modify_istio_config_detail`]
#[derive(Debug, Clone, Copy)]
enum Mutation<'a> {
    Create,
    Update { name: &'a str },
}

impl IstioConfigService {
    /// Delete an Istio resource
    pub async fn delete_istio_config_detail(
        &self,
        api: &str,
        namespace: &str,
        resource_type: &str,
        resource_subtype: &str,
        name: &str,
    ) -> ConfigResult<()> {
        let kind: ResourceKind = resource_type.parse()?;
        let operational = kind.operational_name(resource_subtype)?;

        tracing::debug!("delete: api={}, resource={}/{}", api, operational, name);
        self.client
            .delete_istio_object(api, namespace, operational, name)
            .await?;
        Ok(())
    }

    /// Merge-patch an existing Istio resource
    pub async fn update_istio_config_detail(
        &self,
        api: &str,
        namespace: &str,
        resource_type: &str,
        resource_subtype: &str,
        name: &str,
        json_patch: &str,
    ) -> ConfigResult<IstioConfigDetails> {
        self.modify_istio_config_detail(
            api,
            namespace,
            resource_type,
            resource_subtype,
            Mutation::Update { name },
            json_patch,
        )
        .await
    }

    /// Create an Istio resource from a body prepared by
    /// [`parse_json_for_create`](super::parse_json_for_create)
    pub async fn create_istio_config_detail(
        &self,
        api: &str,
        namespace: &str,
        resource_type: &str,
        resource_subtype: &str,
        json: &str,
    ) -> ConfigResult<IstioConfigDetails> {
        self.modify_istio_config_detail(
            api,
            namespace,
            resource_type,
            resource_subtype,
            Mutation::Create,
            json,
        )
        .await
    }

    async fn modify_istio_config_detail(
        &self,
        api: &str,
        namespace: &str,
        resource_type: &str,
        resource_subtype: &str,
        mutation: Mutation<'_>,
        json: &str,
    ) -> ConfigResult<IstioConfigDetails> {
        let kind: ResourceKind = resource_type.parse()?;
        let operational = kind.operational_name(resource_subtype)?;

        tracing::debug!("{:?}: api={}, resource={}", mutation, api, operational);
        let result = match mutation {
            Mutation::Create => {
                self.client
                    .create_istio_object(api, namespace, operational, json)
                    .await?
            },
            Mutation::Update { name } => {
                self.client
                    .update_istio_object(api, namespace, operational, name, json)
                    .await?
            },
        };

        let mut details = IstioConfigDetails::new(namespace, kind);
        details.object = Some(ConfigObject::parse(kind, &result));
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::resource::testing::FakeClient;
    use std::sync::Arc;

    fn setup(client: FakeClient) -> (IstioConfigService, Arc<FakeClient>) {
        let client = Arc::new(client);
        (IstioConfigService::new(client.clone()), client)
    }

    #[tokio::test]
    async fn test_delete_routes_plain_kind() {
        let (service, client) = setup(FakeClient::new());
        service
            .delete_istio_config_detail("networking.istio.io", "bookinfo", "gateways", "", "gw")
            .await
            .unwrap();

        assert_eq!(
            client.mutations.lock().unwrap().as_slice(),
            &["delete networking.istio.io bookinfo gateways gw".to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_routes_subtype() {
        let (service, client) = setup(FakeClient::new());
        service
            .delete_istio_config_detail("config.istio.io", "istio-system", "adapters", "stdios", "handler")
            .await
            .unwrap();

        assert_eq!(
            client.mutations.lock().unwrap()[0],
            "delete config.istio.io istio-system stdios handler"
        );
    }

    #[tokio::test]
    async fn test_delete_passes_store_error_through() {
        let (service, _) = setup(FakeClient::new().failing_mutations("rules \"x\" not found"));
        let err = service
            .delete_istio_config_detail("config.istio.io", "ns", "rules", "", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Upstream(_)));
        assert_eq!(err.to_string(), "rules \"x\" not found");
    }

    #[tokio::test]
    async fn test_update_indexes_by_top_level_kind() {
        let (service, client) = setup(FakeClient::new());
        let details = service
            .update_istio_config_detail(
                "config.istio.io",
                "istio-system",
                "templates",
                "metrics",
                "requestcount",
                r#"{"kind": "metric", "spec": {"value": "1"}}"#,
            )
            .await
            .unwrap();

        assert_eq!(
            client.mutations.lock().unwrap()[0],
            "update config.istio.io istio-system metrics requestcount"
        );
        assert_eq!(details.object_type, ResourceKind::Templates);
        let Some(ConfigObject::Template(template)) = details.object else {
            panic!("expected a template");
        };
        assert_eq!(template.metadata.name, "requestcount");
        assert_eq!(template.templates, "metrics");
    }

    #[tokio::test]
    async fn test_create_round_trip() {
        let (service, client) = setup(FakeClient::new());
        let body = r#"{"kind": "VirtualService", "metadata": {"name": "reviews"}, "spec": {"hosts": ["reviews"]}}"#;
        let details = service
            .create_istio_config_detail("networking.istio.io", "bookinfo", "virtualservices", "", body)
            .await
            .unwrap();

        assert_eq!(
            client.mutations.lock().unwrap()[0],
            "create networking.istio.io bookinfo virtualservices"
        );
        assert_eq!(details.namespace.name, "bookinfo");
        let object = details.object.unwrap();
        assert_eq!(object.kind(), ResourceKind::VirtualServices);
        assert_eq!(object.metadata().name, "reviews");
    }

    #[tokio::test]
    async fn test_mutations_reject_bad_kinds_before_store() {
        let (service, client) = setup(FakeClient::new());

        let err = service
            .create_istio_config_detail("apps", "ns", "deployments", "", "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedKind(_)));

        let err = service
            .update_istio_config_detail("config.istio.io", "ns", "adapters", "", "x", "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingSubtype(ResourceKind::Adapters)));

        assert!(client.mutations.lock().unwrap().is_empty());
    }
}
