//! Resource Fetcher
//!
//! Concurrent retrieval of Istio configuration: the namespace-wide list
//! bundle and the single-object detail with its permission co-query.

use super::registry::{api_group_of, ResourceKind};
use super::IstioConfigService;
use crate::error::{ConfigError, ConfigResult};
use crate::kube::IstioClient;
use crate::models::{
    parse_all, ConfigObject, DestinationRule, Gateway, IstioAdapter, IstioConfigDetails,
    IstioConfigList, IstioModel, IstioRule, IstioTemplate, Namespace, Policy, QuotaSpec,
    QuotaSpecBinding, ResourcePermissions, ServiceEntry, VirtualService,
};
use anyhow::Result;

/// Verbs asked for when computing [`ResourcePermissions`]
const PERMISSION_VERBS: [&str; 3] = ["patch", "update", "delete"];

/// Which kinds a list call should fetch for a namespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IstioConfigCriteria {
    pub namespace: String,
    pub include_gateways: bool,
    pub include_virtual_services: bool,
    pub include_destination_rules: bool,
    pub include_service_entries: bool,
    pub include_rules: bool,
    pub include_adapters: bool,
    pub include_templates: bool,
    pub include_quota_specs: bool,
    pub include_quota_spec_bindings: bool,
    pub include_policies: bool,
}

impl IstioConfigCriteria {
    /// Criteria with no kind included
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }

    /// Criteria including every kind
    pub fn all(namespace: &str) -> Self {
        let mut criteria = Self::new(namespace);
        for kind in ResourceKind::ALL {
            criteria.set(kind, true);
        }
        criteria
    }

    /// Build criteria from a comma-separated list of kinds; empty means all
    pub fn from_object_types(namespace: &str, objects: &str) -> ConfigResult<Self> {
        let names: Vec<&str> = objects
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(Self::all(namespace));
        }

        let mut criteria = Self::new(namespace);
        for name in names {
            criteria.set(name.parse()?, true);
        }
        Ok(criteria)
    }

    pub fn includes(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Gateways => self.include_gateways,
            ResourceKind::VirtualServices => self.include_virtual_services,
            ResourceKind::DestinationRules => self.include_destination_rules,
            ResourceKind::ServiceEntries => self.include_service_entries,
            ResourceKind::Rules => self.include_rules,
            ResourceKind::Adapters => self.include_adapters,
            ResourceKind::Templates => self.include_templates,
            ResourceKind::QuotaSpecs => self.include_quota_specs,
            ResourceKind::QuotaSpecBindings => self.include_quota_spec_bindings,
            ResourceKind::Policies => self.include_policies,
        }
    }

    pub fn set(&mut self, kind: ResourceKind, include: bool) {
        let flag = match kind {
            ResourceKind::Gateways => &mut self.include_gateways,
            ResourceKind::VirtualServices => &mut self.include_virtual_services,
            ResourceKind::DestinationRules => &mut self.include_destination_rules,
            ResourceKind::ServiceEntries => &mut self.include_service_entries,
            ResourceKind::Rules => &mut self.include_rules,
            ResourceKind::Adapters => &mut self.include_adapters,
            ResourceKind::Templates => &mut self.include_templates,
            ResourceKind::QuotaSpecs => &mut self.include_quota_specs,
            ResourceKind::QuotaSpecBindings => &mut self.include_quota_spec_bindings,
            ResourceKind::Policies => &mut self.include_policies,
        };
        *flag = include;
    }
}

/// One unit of the list fan-out. Disabled units resolve to `Ok(None)` at once.
async fn fetch_collection<T: IstioModel>(
    client: &dyn IstioClient,
    criteria: &IstioConfigCriteria,
    kind: ResourceKind,
) -> Result<Option<Vec<T>>> {
    if !criteria.includes(kind) {
        return Ok(None);
    }

    match client.get_istio_objects(kind, &criteria.namespace).await {
        Ok(objects) => Ok(Some(parse_all(&objects))),
        Err(e) => {
            tracing::warn!("Failed to list {} in {}: {:#}", kind, criteria.namespace, e);
            Err(e)
        },
    }
}

/// Ask which write verbs the caller holds on a kind (or its subtype).
///
/// Unmanaged kinds and failed reviews yield no permissions.
pub async fn get_update_delete_permissions(
    client: &dyn IstioClient,
    namespace: &str,
    object_type: &str,
    object_subtype: &str,
) -> ResourcePermissions {
    let Some(api) = api_group_of(object_type) else {
        return ResourcePermissions::default();
    };

    let resource_type = if object_subtype.is_empty() {
        object_type
    } else {
        object_subtype
    };

    let decisions = match client
        .get_self_subject_access_review(namespace, api, resource_type, &PERMISSION_VERBS)
        .await
    {
        Ok(decisions) => decisions,
        Err(e) => {
            tracing::error!(
                "Error getting permissions [namespace: {}, api: {}, resourceType: {}]: {:#}",
                namespace,
                api,
                resource_type,
                e
            );
            return ResourcePermissions::default();
        },
    };

    let (mut can_patch, mut can_update, mut can_delete) = (false, false, false);
    for decision in decisions {
        match decision.verb.as_str() {
            "patch" => can_patch = decision.allowed,
            "update" => can_update = decision.allowed,
            "delete" => can_delete = decision.allowed,
            _ => {},
        }
    }

    ResourcePermissions {
        update: can_patch || can_update,
        delete: can_delete,
    }
}

impl IstioConfigService {
    /// Fetch every requested kind of a namespace concurrently.
    ///
    /// Either every requested collection is returned or the first error is,
    /// checking quota kinds ahead of adapters and templates and policies last.
    pub async fn get_istio_config_list(
        &self,
        criteria: &IstioConfigCriteria,
    ) -> ConfigResult<IstioConfigList> {
        if criteria.namespace.is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }

        let client = self.client.as_ref();
        let (gw, vs, dr, se, mr, aa, tt, qs, qb, pc) = tokio::join!(
            fetch_collection::<Gateway>(client, criteria, ResourceKind::Gateways),
            fetch_collection::<VirtualService>(client, criteria, ResourceKind::VirtualServices),
            fetch_collection::<DestinationRule>(client, criteria, ResourceKind::DestinationRules),
            fetch_collection::<ServiceEntry>(client, criteria, ResourceKind::ServiceEntries),
            fetch_collection::<IstioRule>(client, criteria, ResourceKind::Rules),
            fetch_collection::<IstioAdapter>(client, criteria, ResourceKind::Adapters),
            fetch_collection::<IstioTemplate>(client, criteria, ResourceKind::Templates),
            fetch_collection::<QuotaSpec>(client, criteria, ResourceKind::QuotaSpecs),
            fetch_collection::<QuotaSpecBinding>(client, criteria, ResourceKind::QuotaSpecBindings),
            fetch_collection::<Policy>(client, criteria, ResourceKind::Policies),
        );

        // Fields are evaluated in the order written here, which fixes the
        // reported error: mixer kinds before adapters and templates, policies last
        Ok(IstioConfigList {
            namespace: Namespace::new(&criteria.namespace),
            gateways: gw?,
            virtual_services: vs?,
            destination_rules: dr?,
            service_entries: se?,
            rules: mr?,
            quota_specs: qs?,
            quota_spec_bindings: qb?,
            adapters: aa?,
            templates: tt?,
            policies: pc?,
        })
    }

    /// Fetch one object together with the caller's permissions on its kind.
    ///
    /// `object_subtype` names the concrete schema for adapters and templates
    /// and is ignored by the fetch for the other kinds.
    pub async fn get_istio_config_details(
        &self,
        namespace: &str,
        object_type: &str,
        object_subtype: &str,
        object: &str,
    ) -> ConfigResult<IstioConfigDetails> {
        let kind: ResourceKind = object_type.parse()?;
        if kind.is_polymorphic() && object_subtype.is_empty() {
            return Err(ConfigError::MissingSubtype(kind));
        }

        let client = self.client.as_ref();
        let (permissions, fetched) = tokio::join!(
            get_update_delete_permissions(client, namespace, object_type, object_subtype),
            client.get_istio_object(kind, namespace, object_subtype, object),
        );

        let fetched = fetched.map_err(|source| ConfigError::ObjectFetch {
            permissions,
            source,
        })?;

        let mut details = IstioConfigDetails::new(namespace, kind);
        details.permissions = permissions;
        details.object = Some(ConfigObject::parse(kind, &fetched));
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::{object, FakeClient};
    use std::sync::Arc;

    fn setup(client: FakeClient) -> (IstioConfigService, Arc<FakeClient>) {
        let client = Arc::new(client);
        (IstioConfigService::new(client.clone()), client)
    }

    fn populated() -> FakeClient {
        FakeClient::new()
            .with_objects(ResourceKind::Gateways, vec![object("Gateway", "bookinfo-gateway")])
            .with_objects(
                ResourceKind::VirtualServices,
                vec![object("VirtualService", "reviews"), object("VirtualService", "ratings")],
            )
            .with_objects(ResourceKind::Adapters, vec![object("stdio", "handler")])
            .with_objects(ResourceKind::Policies, vec![object("Policy", "default")])
    }

    #[test]
    fn test_criteria_from_object_types() {
        let criteria =
            IstioConfigCriteria::from_object_types("ns", "gateways, rules,,").unwrap();
        assert!(criteria.include_gateways);
        assert!(criteria.include_rules);
        assert!(!criteria.include_policies);

        let all = IstioConfigCriteria::from_object_types("ns", "").unwrap();
        assert_eq!(all, IstioConfigCriteria::all("ns"));

        assert!(matches!(
            IstioConfigCriteria::from_object_types("ns", "gateways,pods"),
            Err(ConfigError::UnsupportedKind(ref k)) if k == "pods"
        ));
    }

    #[tokio::test]
    async fn test_list_requires_namespace() {
        let (service, client) = setup(populated());
        let result = service
            .get_istio_config_list(&IstioConfigCriteria::all(""))
            .await;

        assert!(matches!(result, Err(ConfigError::EmptyNamespace)));
        assert_eq!(client.fetches(), 0);
    }

    #[tokio::test]
    async fn test_list_populates_exactly_requested_kinds() {
        // Every subset of the ten kinds
        for mask in 0u32..(1 << ResourceKind::ALL.len()) {
            let (service, client) = setup(populated());
            let mut criteria = IstioConfigCriteria::new("bookinfo");
            for (i, kind) in ResourceKind::ALL.into_iter().enumerate() {
                criteria.set(kind, mask & (1 << i) != 0);
            }

            let list = service.get_istio_config_list(&criteria).await.unwrap();
            for kind in ResourceKind::ALL {
                assert_eq!(list.contains(kind), criteria.includes(kind), "mask {:b}", mask);
            }
            assert_eq!(client.fetches(), mask.count_ones() as usize);
        }
    }

    #[tokio::test]
    async fn test_list_parses_collections() {
        let (service, _) = setup(populated());
        let list = service
            .get_istio_config_list(&IstioConfigCriteria::all("bookinfo"))
            .await
            .unwrap();

        assert_eq!(list.namespace.name, "bookinfo");
        assert_eq!(list.virtual_services.as_ref().unwrap().len(), 2);
        assert_eq!(list.adapters.as_ref().unwrap()[0].adapter, "stdio");
        assert!(list.rules.as_ref().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_fails_whole_on_any_error() {
        for failing in ResourceKind::ALL {
            let (service, client) = setup(populated().failing(failing, "boom"));
            let result = service
                .get_istio_config_list(&IstioConfigCriteria::all("bookinfo"))
                .await;

            let err = result.expect_err("a failed kind must fail the list");
            assert_eq!(err.to_string(), "boom", "failing {}", failing);
            // No early cancellation: every unit ran
            assert_eq!(client.fetches(), ResourceKind::ALL.len());
        }
    }

    #[tokio::test]
    async fn test_list_ignores_errors_of_disabled_kinds() {
        let (service, _) = setup(populated().failing(ResourceKind::Rules, "boom"));
        let mut criteria = IstioConfigCriteria::all("bookinfo");
        criteria.include_rules = false;

        let list = service.get_istio_config_list(&criteria).await.unwrap();
        assert!(list.rules.is_none());
        assert!(list.policies.is_some());
    }

    #[tokio::test]
    async fn test_list_reports_first_error_in_check_order() {
        let (service, _) = setup(
            populated()
                .failing(ResourceKind::Policies, "policies failed")
                .failing(ResourceKind::VirtualServices, "virtualservices failed")
                .failing(ResourceKind::Templates, "templates failed"),
        );
        let err = service
            .get_istio_config_list(&IstioConfigCriteria::all("bookinfo"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "virtualservices failed");
    }

    #[tokio::test]
    async fn test_list_reports_quota_errors_before_adapters() {
        let (service, _) = setup(
            populated()
                .failing(ResourceKind::Templates, "templates failed")
                .failing(ResourceKind::Adapters, "adapters failed")
                .failing(ResourceKind::QuotaSpecBindings, "quotaspecbindings failed"),
        );
        let err = service
            .get_istio_config_list(&IstioConfigCriteria::all("bookinfo"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "quotaspecbindings failed");

        let (service, _) = setup(
            populated()
                .failing(ResourceKind::Policies, "policies failed")
                .failing(ResourceKind::Templates, "templates failed"),
        );
        let err = service
            .get_istio_config_list(&IstioConfigCriteria::all("bookinfo"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "templates failed");
    }

    #[tokio::test]
    async fn test_details_with_permissions() {
        let (service, client) = setup(
            populated().with_permissions(&[("patch", false), ("update", true), ("delete", true)]),
        );
        let details = service
            .get_istio_config_details("bookinfo", "virtualservices", "", "reviews")
            .await
            .unwrap();

        assert_eq!(details.object_type, ResourceKind::VirtualServices);
        assert_eq!(details.object.as_ref().unwrap().metadata().name, "reviews");
        assert_eq!(details.object.unwrap().kind(), ResourceKind::VirtualServices);
        assert_eq!(
            details.permissions,
            ResourcePermissions {
                update: true,
                delete: true
            }
        );
        assert_eq!(
            client.reviews.lock().unwrap().as_slice(),
            &[("networking.istio.io".to_string(), "virtualservices".to_string())]
        );
    }

    #[tokio::test]
    async fn test_details_patch_alone_grants_update() {
        let (service, _) = setup(populated().with_permissions(&[("patch", true)]));
        let details = service
            .get_istio_config_details("bookinfo", "gateways", "", "bookinfo-gateway")
            .await
            .unwrap();
        assert!(details.permissions.update);
        assert!(!details.permissions.delete);
    }

    #[tokio::test]
    async fn test_details_survive_permission_failure() {
        // No permissions configured: every review fails
        let (service, _) = setup(populated());
        let details = service
            .get_istio_config_details("bookinfo", "policies", "", "default")
            .await
            .unwrap();

        assert_eq!(details.permissions, ResourcePermissions::default());
        assert!(matches!(details.object, Some(ConfigObject::Policy(_))));
    }

    #[tokio::test]
    async fn test_details_subtype_drives_permission_check() {
        let (service, client) = setup(populated().with_permissions(&[("delete", true)]));
        let details = service
            .get_istio_config_details("bookinfo", "adapters", "stdios", "handler")
            .await
            .unwrap();

        assert!(details.permissions.delete);
        assert_eq!(
            client.reviews.lock().unwrap()[0],
            ("config.istio.io".to_string(), "stdios".to_string())
        );
        let Some(ConfigObject::Adapter(adapter)) = details.object else {
            panic!("expected an adapter");
        };
        assert_eq!(adapter.adapters, "stdios");
    }

    #[tokio::test]
    async fn test_details_unsupported_kind() {
        let (service, client) = setup(populated());
        let err = service
            .get_istio_config_details("bookinfo", "deployments", "", "x")
            .await
            .unwrap_err();

        assert!(matches!(err, ConfigError::UnsupportedKind(ref k) if k == "deployments"));
        assert_eq!(client.fetches(), 0);
        assert!(client.reviews.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_details_polymorphic_needs_subtype() {
        let (service, client) = setup(populated());
        let err = service
            .get_istio_config_details("bookinfo", "templates", "", "x")
            .await
            .unwrap_err();

        assert!(matches!(err, ConfigError::MissingSubtype(ResourceKind::Templates)));
        assert_eq!(client.fetches(), 0);
    }

    #[tokio::test]
    async fn test_details_fetch_failure_fails_call() {
        let (service, _) = setup(populated().with_permissions(&[("delete", true)]));
        let err = service
            .get_istio_config_details("bookinfo", "rules", "", "missing")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "rules \"missing\" not found");
        let ConfigError::ObjectFetch { permissions, .. } = err else {
            panic!("expected a fetch failure, got {:?}", err);
        };
        assert_eq!(
            permissions,
            ResourcePermissions {
                update: false,
                delete: true
            }
        );
    }

    #[tokio::test]
    async fn test_details_fetch_failure_without_permissions() {
        let (service, _) = setup(populated().failing(ResourceKind::Gateways, "gateways down"));
        let err = service
            .get_istio_config_details("bookinfo", "gateways", "", "bookinfo-gateway")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ObjectFetch { permissions, .. } if permissions == ResourcePermissions::default()
        ));
    }

    #[tokio::test]
    async fn test_permissions_for_unmanaged_kind() {
        let client = FakeClient::new().with_permissions(&[("delete", true)]);
        let permissions = get_update_delete_permissions(&client, "ns", "pods", "").await;
        assert_eq!(permissions, ResourcePermissions::default());
        assert!(client.reviews.lock().unwrap().is_empty());
    }
}
