//! Authentication policies (authentication.istio.io)

use super::{parse_spec, IstioModel, IstioObject, ObjectMeta};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicySpec {
    pub targets: Vec<Value>,
    pub peers: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_is_optional: Option<bool>,
    pub origins: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_is_optional: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_binding: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub metadata: ObjectMeta,
    pub spec: PolicySpec,
}

impl IstioModel for Policy {
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
