//! Mixer resources (config.istio.io)
//!
//! Adapters and templates are polymorphic: every object carries its own
//! Kind (`stdio`, `metric`, ...) which is recorded on the cast model.

use super::{parse_spec, IstioModel, IstioObject, ObjectMeta};
use crate::resource::subtype_plural_of;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleSpec {
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_expr: Option<Value>,
    pub actions: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IstioRule {
    pub metadata: ObjectMeta,
    pub spec: RuleSpec,
}

impl IstioModel for IstioRule {
    fn parse(object: &IstioObject) -> Self {
        Self {
            metadata: object.metadata.clone(),
            spec: parse_spec(object),
        }
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

/// Mixer adapter of any registered subtype
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IstioAdapter {
    pub metadata: ObjectMeta,
    pub spec: Value,
    /// Subtype Kind, e.g. `stdio`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub adapter: String,
    /// Subtype plural, e.g. `stdios`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub adapters: String,
}

impl IstioModel for IstioAdapter {
    fn parse(object: &IstioObject) -> Self {
        Self {
            metadata: object.metadata.clone(),
            spec: Value::Object(object.spec.clone()),
            adapter: object.kind.clone(),
            adapters: subtype_plural_of(&object.kind)
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

/// Mixer template of any registered subtype
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IstioTemplate {
    pub metadata: ObjectMeta,
    pub spec: Value,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub template: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub templates: String,
}

impl IstioModel for IstioTemplate {
    fn parse(object: &IstioObject) -> Self {
        Self {
            metadata: object.metadata.clone(),
            spec: Value::Object(object.spec.clone()),
            template: object.kind.clone(),
            templates: subtype_plural_of(&object.kind)
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuotaSpecSpec {
    pub rules: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaSpec {
    pub metadata: ObjectMeta,
    pub spec: QuotaSpecSpec,
}

impl IstioModel for QuotaSpec {
    fn parse(object: &IstioObject) -> Self {
        Self {
            metadata: object.metadata.clone(),
            spec: parse_spec(object),
        }
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuotaSpecBindingSpec {
    pub quota_specs: Vec<Value>,
    pub services: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaSpecBinding {
    pub metadata: ObjectMeta,
    pub spec: QuotaSpecBindingSpec,
}

impl IstioModel for QuotaSpecBinding {
    fn parse(object: &IstioObject) -> Self {
        Self {
            metadata: object.metadata.clone(),
            spec: parse_spec(object),
        }
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}
