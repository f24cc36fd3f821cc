//! In-memory resource storage
//!
//! Objects are keyed by `(kind, group_version, namespace, name)` where the
//! namespace is `None` for cluster-scoped resources. Every value crossing the
//! storage boundary is cloned, so callers never alias stored state.

use crate::client_utils::canonical_api_version;
use crate::field_selector::FieldSelector;
use crate::label_selector::{object_labels, parse_label_selector};
use crate::Result;
use kube::core::SelectorExt;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

/// Composite key identifying at most one stored resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    pub kind: String,
    pub group_version: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl StorageKey {
    pub fn new(kind: &str, api_version: &str, namespace: Option<&str>, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            group_version: canonical_api_version(api_version),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    fn type_key(&self) -> TypeKey {
        TypeKey {
            kind: self.kind.clone(),
            group_version: self.group_version.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TypeKey {
    kind: String,
    group_version: String,
}

impl TypeKey {
    fn new(kind: &str, api_version: &str) -> Self {
        Self {
            kind: kind.to_string(),
            group_version: canonical_api_version(api_version),
        }
    }
}

type ObjectsByName = BTreeMap<String, Value>;
type ObjectsByNamespace = BTreeMap<Option<String>, ObjectsByName>;
type ObjectStorage = HashMap<TypeKey, ObjectsByNamespace>;

/// Key/value store for resources with no business logic beyond filtering.
#[derive(Debug, Default)]
pub struct ResourceStorage {
    objects: RwLock<ObjectStorage>,
    resource_version: AtomicU64,
}

impl ResourceStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, ObjectStorage> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ObjectStorage> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand out the next resource version. Shared by every object in the
    /// storage, so versions increase across the whole fake cluster.
    pub fn next_resource_version(&self) -> String {
        (self.resource_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Store a copy of `resource`, replacing whatever occupied the slot.
    pub fn store(
        &self,
        kind: &str,
        api_version: &str,
        name: &str,
        namespace: Option<&str>,
        resource: &Value,
    ) {
        self.store_key(&StorageKey::new(kind, api_version, namespace, name), resource);
    }

    pub fn store_key(&self, key: &StorageKey, resource: &Value) {
        trace!("Storing object: {:?}", key);

        let mut objects = self.write();
        objects
            .entry(key.type_key())
            .or_default()
            .entry(key.namespace.clone())
            .or_default()
            .insert(key.name.clone(), resource.clone());

        debug!(
            "Stored object: {} {}/{}",
            key.kind,
            key.namespace.as_deref().unwrap_or(""),
            key.name
        );
    }

    pub fn get(
        &self,
        kind: &str,
        api_version: &str,
        name: &str,
        namespace: Option<&str>,
    ) -> Option<Value> {
        self.get_key(&StorageKey::new(kind, api_version, namespace, name))
    }

    pub fn get_key(&self, key: &StorageKey) -> Option<Value> {
        trace!("Getting object: {:?}", key);

        self.read()
            .get(&key.type_key())
            .and_then(|by_ns| by_ns.get(&key.namespace))
            .and_then(|by_name| by_name.get(&key.name))
            .cloned()
    }

    pub fn contains_key(&self, key: &StorageKey) -> bool {
        self.read()
            .get(&key.type_key())
            .and_then(|by_ns| by_ns.get(&key.namespace))
            .is_some_and(|by_name| by_name.contains_key(&key.name))
    }

    /// Remove and return the stored value, if any.
    pub fn delete(
        &self,
        kind: &str,
        api_version: &str,
        name: &str,
        namespace: Option<&str>,
    ) -> Option<Value> {
        self.delete_key(&StorageKey::new(kind, api_version, namespace, name))
    }

    pub fn delete_key(&self, key: &StorageKey) -> Option<Value> {
        trace!("Deleting object: {:?}", key);

        let mut objects = self.write();
        let type_key = key.type_key();
        let by_ns = objects.get_mut(&type_key)?;
        let by_name = by_ns.get_mut(&key.namespace)?;
        let removed = by_name.remove(&key.name);

        if by_name.is_empty() {
            by_ns.remove(&key.namespace);
        }
        if by_ns.is_empty() {
            objects.remove(&type_key);
        }

        if removed.is_some() {
            debug!(
                "Deleted object: {} {}/{}",
                key.kind,
                key.namespace.as_deref().unwrap_or(""),
                key.name
            );
        }
        removed
    }

    /// List copies of stored objects of one type.
    ///
    /// `namespace: None` returns every namespace plus the cluster-scoped slot.
    /// Selectors are applied as a post-filter; only a malformed selector
    /// string is an error.
    pub fn list(
        &self,
        kind: &str,
        api_version: &str,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        field_selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        trace!(
            "Listing objects: {} {} in namespace: {:?}",
            kind,
            api_version,
            namespace
        );

        let labels = label_selector.map(parse_label_selector).transpose()?;
        let fields = field_selector.map(FieldSelector::parse).transpose()?;

        let objects = self.read();
        let Some(by_ns) = objects.get(&TypeKey::new(kind, api_version)) else {
            return Ok(Vec::new());
        };

        let buckets: Vec<&ObjectsByName> = match namespace {
            Some(ns) => by_ns.get(&Some(ns.to_string())).into_iter().collect(),
            None => by_ns.values().collect(),
        };

        Ok(buckets
            .into_iter()
            .flat_map(|by_name| by_name.values())
            .filter(|obj| {
                labels
                    .as_ref()
                    .is_none_or(|selector| selector.matches(&object_labels(obj)))
            })
            .filter(|obj| fields.as_ref().is_none_or(|selector| selector.matches(obj)))
            .cloned()
            .collect())
    }

    /// Distinct `(kind, group_version)` pairs with at least one stored object
    pub fn kinds(&self) -> Vec<(String, String)> {
        let mut kinds: Vec<_> = self
            .read()
            .keys()
            .map(|k| (k.kind.clone(), k.group_version.clone()))
            .collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.read()
            .values()
            .flat_map(|by_ns| by_ns.values())
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored object. The resource version counter keeps running
    /// so versions stay monotonic for the life of the storage.
    pub fn clear(&self) {
        self.write().clear();
        debug!("Cleared storage");
    }
}
