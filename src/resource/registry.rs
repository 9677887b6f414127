//! Resource Registry - Istio resource kinds and their API registration
//!
//! Kind, group and version tables are loaded once from embedded JSON and
//! never mutated afterwards. Every lookup is a pure function over them.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Embedded registration table (compiled into the binary)
const REGISTRY_FILE: &str = include_str!("../resources/istio.json");

/// The configuration categories managed by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Gateways,
    VirtualServices,
    DestinationRules,
    ServiceEntries,
    Rules,
    Adapters,
    Templates,
    QuotaSpecs,
    QuotaSpecBindings,
    Policies,
}

impl ResourceKind {
    /// Every kind, in the order list errors are inspected
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::Gateways,
        ResourceKind::VirtualServices,
        ResourceKind::DestinationRules,
        ResourceKind::ServiceEntries,
        ResourceKind::Rules,
        ResourceKind::Adapters,
        ResourceKind::Templates,
        ResourceKind::QuotaSpecs,
        ResourceKind::QuotaSpecBindings,
        ResourceKind::Policies,
    ];

    /// Plural resource name, as used in API paths
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Gateways => "gateways",
            ResourceKind::VirtualServices => "virtualservices",
            ResourceKind::DestinationRules => "destinationrules",
            ResourceKind::ServiceEntries => "serviceentries",
            ResourceKind::Rules => "rules",
            ResourceKind::Adapters => "adapters",
            ResourceKind::Templates => "templates",
            ResourceKind::QuotaSpecs => "quotaspecs",
            ResourceKind::QuotaSpecBindings => "quotaspecbindings",
            ResourceKind::Policies => "policies",
        }
    }

    /// Adapters and templates are containers for caller-named subtypes
    pub fn is_polymorphic(&self) -> bool {
        matches!(self, ResourceKind::Adapters | ResourceKind::Templates)
    }

    /// Resource name used to address the store for create/update/delete.
    ///
    /// For the polymorphic kinds this is the subtype, which must be present.
    pub fn operational_name<'a>(&self, subtype: &'a str) -> ConfigResult<&'a str> {
        if !self.is_polymorphic() {
            return Ok(self.as_str());
        }
        if subtype.is_empty() {
            return Err(ConfigError::MissingSubtype(*self));
        }
        Ok(subtype)
    }

    /// Resource name used for permission checks: any non-empty subtype wins
    pub fn permission_name<'a>(&self, subtype: &'a str) -> &'a str {
        if subtype.is_empty() {
            self.as_str()
        } else {
            subtype
        }
    }

    /// Schema (Kind) name a new object of this kind must carry
    pub fn schema_name(&self, subtype: &str) -> ConfigResult<&'static str> {
        let plural = self.operational_name(subtype)?;
        schema_name_of(plural).ok_or_else(|| ConfigError::UnsupportedKind(plural.to_string()))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigError::UnsupportedKind(s.to_string()))
    }
}

/// Kind definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct KindDef {
    pub group: String,
    pub kind: String,
    #[serde(default)]
    pub subtypes: Vec<String>,
}

/// Root structure of resources/istio.json
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// API group -> version
    pub groups: HashMap<String, String>,
    /// Top-level plural -> definition
    pub kinds: HashMap<String, KindDef>,
    /// Subtype plural -> schema name
    #[serde(default)]
    pub subtypes: HashMap<String, String>,
}

static REGISTRY: OnceLock<RegistryConfig> = OnceLock::new();

/// Get the registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static RegistryConfig {
    REGISTRY.get_or_init(|| {
        serde_json::from_str(REGISTRY_FILE)
            .unwrap_or_else(|e| panic!("Failed to parse embedded registry JSON: {}", e))
    })
}

/// API group owning a resource kind, or `None` if not managed
pub fn api_group_of(resource_type: &str) -> Option<&'static str> {
    get_registry()
        .kinds
        .get(resource_type)
        .map(|def| def.group.as_str())
}

/// API version served for a group
pub fn version_of(group: &str) -> Option<&'static str> {
    get_registry().groups.get(group).map(|s| s.as_str())
}

/// Schema (Kind) name for a top-level or subtype plural
pub fn schema_name_of(plural: &str) -> Option<&'static str> {
    let registry = get_registry();
    registry
        .kinds
        .get(plural)
        .map(|def| def.kind.as_str())
        .or_else(|| registry.subtypes.get(plural).map(|s| s.as_str()))
}

/// Subtype plural registered for a schema name (`stdio` -> `stdios`)
pub fn subtype_plural_of(schema: &str) -> Option<&'static str> {
    get_registry()
        .subtypes
        .iter()
        .find(|(_, kind)| kind.as_str() == schema)
        .map(|(plural, _)| plural.as_str())
}

/// Registered subtypes of a polymorphic kind (empty for the others)
pub fn subtypes_of(kind: ResourceKind) -> &'static [String] {
    get_registry()
        .kinds
        .get(kind.as_str())
        .map(|def| def.subtypes.as_slice())
        .unwrap_or_default()
}

/// Kubernetes API that manages this resource type, or `None` if unmanaged
pub fn get_istio_api(resource_type: &str) -> Option<&'static str> {
    api_group_of(resource_type)
}

/// `group/version` string for a kind
pub fn api_version_of(kind: ResourceKind) -> Option<String> {
    let group = api_group_of(kind.as_str())?;
    let version = version_of(group)?;
    Some(format!("{}/{}", group, version))
}
