use crate::{Error, Result};
use chrono::{SecondsFormat, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{Map, Value};

/// RFC 3339 UTC timestamp with second precision, the format the API server uses.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn new_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Parse the `metadata` block with k8s-openapi's `ObjectMeta`, rejecting
/// objects whose metadata does not have the Kubernetes shape.
pub fn extract_metadata(object: &Value) -> Result<ObjectMeta> {
    let meta_value = object
        .get("metadata")
        .ok_or_else(|| Error::InvalidRequest("Object missing metadata field".to_string()))?;

    serde_json::from_value(meta_value.clone())
        .map_err(|e| Error::InvalidRequest(format!("Failed to parse metadata: {}", e)))
}

/// Mutable access to `metadata`, creating it when absent.
pub fn metadata_mut(object: &mut Value) -> Result<&mut Map<String, Value>> {
    let obj = object
        .as_object_mut()
        .ok_or_else(|| Error::InvalidRequest("Resource body must be an object".to_string()))?;

    let meta = obj
        .entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()));
    if meta.is_null() {
        *meta = Value::Object(Map::new());
    }

    meta.as_object_mut()
        .ok_or_else(|| Error::InvalidRequest("metadata must be an object".to_string()))
}

pub fn metadata_str<'a>(object: &'a Value, field: &str) -> Option<&'a str> {
    object
        .get("metadata")
        .and_then(|m| m.get(field))
        .and_then(Value::as_str)
}

/// Set `namespace` for namespaced resources, strip it for cluster-scoped ones.
pub fn set_namespace(meta: &mut Map<String, Value>, namespace: Option<&str>) {
    match namespace {
        Some(ns) => {
            meta.insert("namespace".to_string(), Value::String(ns.to_string()));
        }
        None => {
            meta.remove("namespace");
        }
    }
}

/// Default `labels` and `annotations` to empty maps.
pub fn ensure_label_maps(meta: &mut Map<String, Value>) {
    for field in ["labels", "annotations"] {
        let entry = meta
            .entry(field)
            .or_insert_with(|| Value::Object(Map::new()));
        if entry.is_null() {
            *entry = Value::Object(Map::new());
        }
    }
}

/// Recursively merge `patch` into `target`.
///
/// Objects merge key by key; any other value, `null` included, overwrites.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Look up a dotted path such as `spec.containers.0.name`.
///
/// Numeric segments index into arrays.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
