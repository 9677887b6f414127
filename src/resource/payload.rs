//! Create payload normalization
//!
//! Checks a caller-supplied body against the target kind's model and stamps
//! it with the `kind` and `apiVersion` the API server expects.

use super::registry::{api_version_of, ResourceKind};
use crate::error::{ConfigError, ConfigResult};
use crate::models::ConfigObject;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// Walks a JSON document and fails on the first object that repeats a key
struct UniqueKeys;

impl<'de> Deserialize<'de> for UniqueKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(UniqueKeysVisitor)
    }
}

struct UniqueKeysVisitor;

impl<'de> Visitor<'de> for UniqueKeysVisitor {
    type Value = UniqueKeys;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_unit<E: de::Error>(self) -> Result<UniqueKeys, E> {
        Ok(UniqueKeys)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<UniqueKeys, A::Error> {
        while seq.next_element::<UniqueKeys>()?.is_some() {}
        Ok(UniqueKeys)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<UniqueKeys, A::Error> {
        let mut seen = HashSet::new();
        while let Some(key) = map.next_key::<String>()? {
            if !seen.insert(key.clone()) {
                return Err(de::Error::custom(format_args!("duplicate key `{}`", key)));
            }
            map.next_value::<UniqueKeys>()?;
        }
        Ok(UniqueKeys)
    }
}

/// Validate `body` for `resource_type` (and subtype) and return the JSON to
/// submit on create.
///
/// The result starts with `kind` and `apiVersion`, followed by every other
/// field of the original object in its original order. A body that repeats a
/// key in any object is rejected rather than collapsed. Nothing is sent to
/// the cluster.
pub fn parse_json_for_create(
    resource_type: &str,
    subresource_type: &str,
    body: &[u8],
) -> ConfigResult<String> {
    let kind: ResourceKind = resource_type.parse()?;
    let schema = kind.schema_name(subresource_type)?;
    let api_version =
        api_version_of(kind).ok_or_else(|| ConfigError::UnsupportedKind(resource_type.to_string()))?;

    serde_json::from_slice::<UniqueKeys>(body)
        .map_err(|source| ConfigError::InvalidPayload { kind, source })?;
    ConfigObject::decode(kind, body).map_err(|source| ConfigError::InvalidPayload { kind, source })?;

    let original = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) if !map.is_empty() => map,
        Ok(_) => return Err(ConfigError::NotAnObject(kind)),
        Err(source) => return Err(ConfigError::InvalidPayload { kind, source }),
    };

    let mut normalized = Map::with_capacity(original.len() + 2);
    normalized.insert("kind".to_string(), Value::String(schema.to_string()));
    normalized.insert("apiVersion".to_string(), Value::String(api_version));
    for (key, value) in original {
        if key != "kind" && key != "apiVersion" {
            normalized.insert(key, value);
        }
    }

    serde_json::to_string(&Value::Object(normalized))
        .map_err(|source| ConfigError::InvalidPayload { kind, source })
}
