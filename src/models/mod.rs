//! Typed Istio configuration models
//!
//! Objects arrive from the cluster API as untyped [`IstioObject`]s and are
//! parsed into one typed model per resource kind.
//!
//! - [`networking`] - Gateways, VirtualServices, DestinationRules, ServiceEntries
//! - [`mixer`] - Rules, Adapters, Templates, QuotaSpecs, QuotaSpecBindings
//! - [`authentication`] - Policies

pub mod authentication;
pub mod mixer;
pub mod networking;

pub use authentication::*;
pub use mixer::*;
pub use networking::*;

use crate::resource::ResourceKind;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Raw object as returned by the cluster API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IstioObject {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Map<String, Value>,
}

/// Standard Kubernetes object metadata (the subset we surface)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Creation time, if present and valid RFC3339
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.creation_timestamp.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Age relative to `now`, kubectl style (`45s`, `12m`, `3h`, `7d`)
    pub fn age(&self, now: DateTime<Utc>) -> String {
        let Some(created) = self.created_at() else {
            return "-".to_string();
        };
        let secs = (now - created).num_seconds().max(0);
        match secs {
            s if s < 60 => format!("{}s", s),
            s if s < 3600 => format!("{}m", s / 60),
            s if s < 86400 => format!("{}h", s / 3600),
            s => format!("{}d", s / 86400),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
}

impl Namespace {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

/// What the caller may do with a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePermissions {
    pub update: bool,
    pub delete: bool,
}

/// A typed model parsed from an [`IstioObject`]
pub trait IstioModel: Serialize + DeserializeOwned + Sized {
    /// Build the model from a raw object; malformed spec fields fall back to defaults
    fn parse(object: &IstioObject) -> Self;

    fn metadata(&self) -> &ObjectMeta;
}

/// Parse a list of raw objects into a typed collection
pub fn parse_all<T: IstioModel>(objects: &[IstioObject]) -> Vec<T> {
    objects.iter().map(T::parse).collect()
}

/// Lenient spec decode shared by the typed models
pub(crate) fn parse_spec<S: DeserializeOwned + Default>(object: &IstioObject) -> S {
    match serde_json::from_value(Value::Object(object.spec.clone())) {
        Ok(spec) => spec,
        Err(e) => {
            tracing::warn!(
                "Malformed spec in {}/{}: {}",
                object.kind,
                object.metadata.name,
                e
            );
            S::default()
        },
    }
}

/// A single typed configuration object, one variant per resource kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigObject {
    Gateway(Gateway),
    VirtualService(VirtualService),
    DestinationRule(DestinationRule),
    ServiceEntry(ServiceEntry),
    Rule(IstioRule),
    Adapter(IstioAdapter),
    Template(IstioTemplate),
    QuotaSpec(QuotaSpec),
    QuotaSpecBinding(QuotaSpecBinding),
    Policy(Policy),
}

impl ConfigObject {
    /// Parse a raw object into the slot selected by `kind`
    pub fn parse(kind: ResourceKind, object: &IstioObject) -> Self {
        match kind {
            ResourceKind::Gateways => ConfigObject::Gateway(Gateway::parse(object)),
            ResourceKind::VirtualServices => {
                ConfigObject::VirtualService(VirtualService::parse(object))
            },
            ResourceKind::DestinationRules => {
                ConfigObject::DestinationRule(DestinationRule::parse(object))
            },
            ResourceKind::ServiceEntries => ConfigObject::ServiceEntry(ServiceEntry::parse(object)),
            ResourceKind::Rules => ConfigObject::Rule(IstioRule::parse(object)),
            ResourceKind::Adapters => ConfigObject::Adapter(IstioAdapter::parse(object)),
            ResourceKind::Templates => ConfigObject::Template(IstioTemplate::parse(object)),
            ResourceKind::QuotaSpecs => ConfigObject::QuotaSpec(QuotaSpec::parse(object)),
            ResourceKind::QuotaSpecBindings => {
                ConfigObject::QuotaSpecBinding(QuotaSpecBinding::parse(object))
            },
            ResourceKind::Policies => ConfigObject::Policy(Policy::parse(object)),
        }
    }

    /// Strict structural decode of a JSON document into the model for `kind`
    pub fn decode(kind: ResourceKind, body: &[u8]) -> Result<Self, serde_json::Error> {
        let object = match kind {
            ResourceKind::Gateways => ConfigObject::Gateway(serde_json::from_slice(body)?),
            ResourceKind::VirtualServices => {
                ConfigObject::VirtualService(serde_json::from_slice(body)?)
            },
            ResourceKind::DestinationRules => {
                ConfigObject::DestinationRule(serde_json::from_slice(body)?)
            },
            ResourceKind::ServiceEntries => ConfigObject::ServiceEntry(serde_json::from_slice(body)?),
            ResourceKind::Rules => ConfigObject::Rule(serde_json::from_slice(body)?),
            ResourceKind::Adapters => ConfigObject::Adapter(serde_json::from_slice(body)?),
            ResourceKind::Templates => ConfigObject::Template(serde_json::from_slice(body)?),
            ResourceKind::QuotaSpecs => ConfigObject::QuotaSpec(serde_json::from_slice(body)?),
            ResourceKind::QuotaSpecBindings => {
                ConfigObject::QuotaSpecBinding(serde_json::from_slice(body)?)
            },
            ResourceKind::Policies => ConfigObject::Policy(serde_json::from_slice(body)?),
        };
        Ok(object)
    }

    /// The top-level kind this object belongs to
    pub fn kind(&self) -> ResourceKind {
        match self {
            ConfigObject::Gateway(_) => ResourceKind::Gateways,
            ConfigObject::VirtualService(_) => ResourceKind::VirtualServices,
            ConfigObject::DestinationRule(_) => ResourceKind::DestinationRules,
            ConfigObject::ServiceEntry(_) => ResourceKind::ServiceEntries,
            ConfigObject::Rule(_) => ResourceKind::Rules,
            ConfigObject::Adapter(_) => ResourceKind::Adapters,
            ConfigObject::Template(_) => ResourceKind::Templates,
            ConfigObject::QuotaSpec(_) => ResourceKind::QuotaSpecs,
            ConfigObject::QuotaSpecBinding(_) => ResourceKind::QuotaSpecBindings,
            ConfigObject::Policy(_) => ResourceKind::Policies,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            ConfigObject::Gateway(o) => o.metadata(),
            ConfigObject::VirtualService(o) => o.metadata(),
            ConfigObject::DestinationRule(o) => o.metadata(),
            ConfigObject::ServiceEntry(o) => o.metadata(),
            ConfigObject::Rule(o) => o.metadata(),
            ConfigObject::Adapter(o) => o.metadata(),
            ConfigObject::Template(o) => o.metadata(),
            ConfigObject::QuotaSpec(o) => o.metadata(),
            ConfigObject::QuotaSpecBinding(o) => o.metadata(),
            ConfigObject::Policy(o) => o.metadata(),
        }
    }
}

/// Namespace-scoped bundle returned by a list call.
///
/// A collection is `Some` exactly when its kind was requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IstioConfigList {
    pub namespace: Namespace,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateways: Option<Vec<Gateway>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_services: Option<Vec<VirtualService>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_rules: Option<Vec<DestinationRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_entries: Option<Vec<ServiceEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<IstioRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapters: Option<Vec<IstioAdapter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates: Option<Vec<IstioTemplate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_specs: Option<Vec<QuotaSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_spec_bindings: Option<Vec<QuotaSpecBinding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policies: Option<Vec<Policy>>,
}

impl IstioConfigList {
    /// Whether the collection for `kind` is present
    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.metadata_of(kind).is_some()
    }

    /// Metadata of every object in the collection for `kind`, if present
    pub fn metadata_of(&self, kind: ResourceKind) -> Option<Vec<&ObjectMeta>> {
        fn collect<T: IstioModel>(items: &Option<Vec<T>>) -> Option<Vec<&ObjectMeta>> {
            items
                .as_ref()
                .map(|items| items.iter().map(|item| item.metadata()).collect())
        }

        match kind {
            ResourceKind::Gateways => collect(&self.gateways),
            ResourceKind::VirtualServices => collect(&self.virtual_services),
            ResourceKind::DestinationRules => collect(&self.destination_rules),
            ResourceKind::ServiceEntries => collect(&self.service_entries),
            ResourceKind::Rules => collect(&self.rules),
            ResourceKind::Adapters => collect(&self.adapters),
            ResourceKind::Templates => collect(&self.templates),
            ResourceKind::QuotaSpecs => collect(&self.quota_specs),
            ResourceKind::QuotaSpecBindings => collect(&self.quota_spec_bindings),
            ResourceKind::Policies => collect(&self.policies),
        }
    }
}

/// A single resource plus the caller's permissions on it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IstioConfigDetails {
    pub namespace: Namespace,
    pub object_type: ResourceKind,
    pub permissions: ResourcePermissions,
    #[serde(flatten)]
    pub object: Option<ConfigObject>,
}

impl IstioConfigDetails {
    pub fn new(namespace: &str, object_type: ResourceKind) -> Self {
        Self {
            namespace: Namespace::new(namespace),
            object_type,
            permissions: ResourcePermissions::default(),
            object: None,
        }
    }
}
