//! Read-only accessor wrapper over resource payloads
//!
//! Every instance operation hands back a [`ResourceField`]: an owned copy of
//! the stored JSON with path lookup and named accessors for the metadata that
//! calling code reads most.
//!
//! ```
//! use kube_fake_dynamic_client::ResourceField;
//! use serde_json::json;
//!
//! let field = ResourceField::new(json!({
//!     "kind": "Pod",
//!     "metadata": {"name": "p1", "labels": {"app": "web"}},
//!     "spec": {"containers": [{"name": "c"}]}
//! }));
//!
//! assert_eq!(field.kind(), Some("Pod"));
//! assert_eq!(field.name(), Some("p1"));
//! assert_eq!(field.str_at("spec.containers.0.name"), Some("c"));
//! assert_eq!(field.labels().get("app").map(String::as_str), Some("web"));
//! ```

use crate::utils::lookup_path;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceField(Value);

impl ResourceField {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Value at a dotted path (`metadata.name`, `spec.containers.0.image`)
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.0, path)
    }

    /// Wrapped copy of the value at a dotted path
    pub fn field(&self, path: &str) -> Option<ResourceField> {
        self.get(path).cloned().map(Self)
    }

    pub fn str_at(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn as_mapping(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    /// Key/value pairs of a mapping; empty for anything else
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.as_object().into_iter().flat_map(|m| m.iter())
    }

    /// The `items` of a List payload
    pub fn items(&self) -> Vec<ResourceField> {
        self.0
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().cloned().map(Self).collect())
            .unwrap_or_default()
    }

    pub fn kind(&self) -> Option<&str> {
        self.str_at("kind")
    }

    pub fn api_version(&self) -> Option<&str> {
        self.str_at("apiVersion")
    }

    pub fn name(&self) -> Option<&str> {
        self.str_at("metadata.name")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.str_at("metadata.namespace")
    }

    pub fn uid(&self) -> Option<&str> {
        self.str_at("metadata.uid")
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.str_at("metadata.resourceVersion")
    }

    pub fn creation_timestamp(&self) -> Option<&str> {
        self.str_at("metadata.creationTimestamp")
    }

    pub fn generation(&self) -> Option<i64> {
        self.get("metadata.generation").and_then(Value::as_i64)
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.string_map("metadata.labels")
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.string_map("metadata.annotations")
    }

    pub fn spec(&self) -> Option<&Value> {
        self.get("spec")
    }

    pub fn status(&self) -> Option<&Value> {
        self.get("status")
    }

    fn string_map(&self, path: &str) -> BTreeMap<String, String> {
        self.get(path)
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Deserialize into a typed resource such as `k8s_openapi::api::core::v1::Pod`
    pub fn try_parse<K: DeserializeOwned>(&self) -> Result<K> {
        Ok(serde_json::from_value(self.0.clone())?)
    }
}

impl From<Value> for ResourceField {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<ResourceField> for Value {
    fn from(field: ResourceField) -> Self {
        field.0
    }
}

impl Index<&str> for ResourceField {
    type Output = Value;

    /// Top-level key access; missing keys yield `Value::Null`
    fn index(&self, key: &str) -> &Value {
        &self.0[key]
    }
}

impl fmt::Display for ResourceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
