//! Per-resource-type CRUD over the shared storage

use crate::events::{emits_events, record_event, EventReason};
use crate::field::ResourceField;
use crate::registry::{ResourceDefinition, ResourceRegistry};
use crate::status::add_status;
use crate::storage::{ResourceStorage, StorageKey};
use crate::utils::{
    ensure_label_maps, extract_metadata, metadata_mut, metadata_str, new_uid, now_timestamp,
    set_namespace,
};
use crate::{Error, Result};
use futures::Stream;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{ListParams, Patch};
use phf::phf_map;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub const DEFAULT_NAMESPACE: &str = "default";

type EphemeralEntry = (&'static str, &'static str, &'static str);

/// Kinds that are never stored themselves; creating one creates the target
/// kind instead. Values are (group of the requested kind, target kind,
/// target apiVersion).
static DEFAULT_EPHEMERAL_KINDS: phf::Map<&'static str, EphemeralEntry> = phf_map! {
    "ProjectRequest" => ("project.openshift.io", "Project", "project.openshift.io/v1"),
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralTarget {
    pub kind: String,
    pub api_version: String,
}

/// Redirect table for ephemeral kinds, keyed by the requested group and kind
#[derive(Debug, Clone)]
pub struct EphemeralRedirects {
    redirects: HashMap<(String, String), EphemeralTarget>,
}

impl EphemeralRedirects {
    /// No redirects at all
    pub fn empty() -> Self {
        Self {
            redirects: HashMap::new(),
        }
    }

    pub fn with_redirect(
        mut self,
        group: impl Into<String>,
        kind: impl Into<String>,
        target_kind: impl Into<String>,
        target_api_version: impl Into<String>,
    ) -> Self {
        self.insert(group, kind, target_kind, target_api_version);
        self
    }

    pub fn insert(
        &mut self,
        group: impl Into<String>,
        kind: impl Into<String>,
        target_kind: impl Into<String>,
        target_api_version: impl Into<String>,
    ) {
        self.redirects.insert(
            (group.into(), kind.into()),
            EphemeralTarget {
                kind: target_kind.into(),
                api_version: target_api_version.into(),
            },
        );
    }

    pub fn target(&self, group: &str, kind: &str) -> Option<&EphemeralTarget> {
        self.redirects.get(&(group.to_string(), kind.to_string()))
    }

    pub fn is_ephemeral(&self, group: &str, kind: &str) -> bool {
        self.target(group, kind).is_some()
    }
}

impl Default for EphemeralRedirects {
    fn default() -> Self {
        let mut redirects = Self::empty();
        for (kind, (group, target_kind, target_api_version)) in DEFAULT_EPHEMERAL_KINDS.entries()
        {
            redirects.insert(*group, *kind, *target_kind, *target_api_version);
        }
        redirects
    }
}

/// Behaviour shared by every instance of one client
#[derive(Debug, Clone)]
pub(crate) struct InstanceConfig {
    pub ephemeral: EphemeralRedirects,
    pub emit_events: bool,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            ephemeral: EphemeralRedirects::default(),
            emit_events: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchEventType {
    Added,
}

/// One entry of a [`ResourceInstance::watch`] enumeration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub event_type: WatchEventType,
    pub object: ResourceField,
}

/// CRUD handle for one resource type, bound to the client's storage.
///
/// Obtained from [`ResourceManager::get`](crate::ResourceManager::get).
/// Every returned object is a copy; mutating it never touches storage.
#[derive(Debug, Clone)]
pub struct ResourceInstance {
    definition: ResourceDefinition,
    storage: Arc<ResourceStorage>,
    registry: Arc<ResourceRegistry>,
    config: Arc<InstanceConfig>,
}

impl ResourceInstance {
    pub(crate) fn new(
        definition: ResourceDefinition,
        storage: Arc<ResourceStorage>,
        registry: Arc<ResourceRegistry>,
        config: Arc<InstanceConfig>,
    ) -> Self {
        Self {
            definition,
            storage,
            registry,
            config,
        }
    }

    pub fn definition(&self) -> &ResourceDefinition {
        &self.definition
    }

    pub fn kind(&self) -> &str {
        &self.definition.kind
    }

    pub fn api_version(&self) -> String {
        self.definition.api_version()
    }

    pub fn group(&self) -> &str {
        &self.definition.group
    }

    pub fn version(&self) -> &str {
        &self.definition.version
    }

    pub fn plural(&self) -> &str {
        &self.definition.plural
    }

    pub fn singular(&self) -> &str {
        &self.definition.singular
    }

    pub fn namespaced(&self) -> bool {
        self.definition.namespaced
    }

    pub fn short_names(&self) -> &[String] {
        &self.definition.short_names
    }

    /// Namespace a single-object operation addresses
    fn object_namespace<'a>(&self, namespace: Option<&'a str>) -> Option<&'a str> {
        if self.definition.namespaced {
            Some(namespace.unwrap_or(DEFAULT_NAMESPACE))
        } else {
            None
        }
    }

    /// Namespace a list or watch is limited to; `None` means all of them
    fn list_namespace<'a>(&self, namespace: Option<&'a str>) -> Option<&'a str> {
        namespace.filter(|_| self.definition.namespaced)
    }

    fn key(&self, name: &str, namespace: Option<&str>) -> StorageKey {
        StorageKey::new(
            &self.definition.kind,
            &self.definition.group_version(),
            namespace,
            name,
        )
    }

    fn not_found(&self, name: &str, namespace: Option<&str>) -> Error {
        Error::not_found(&self.definition.kind, name, namespace)
    }

    fn emit(&self, reason: EventReason, object: &Value) {
        if self.config.emit_events && emits_events(&self.definition.kind) {
            record_event(&self.storage, reason, object);
        }
    }

    /// Create an object.
    ///
    /// `namespace` wins over `metadata.namespace` in the body; namespaced
    /// kinds default to `"default"` and cluster-scoped kinds drop it.
    /// Ephemeral kinds create their target kind and return that object.
    pub fn create(&self, body: &Value, namespace: Option<&str>) -> Result<ResourceField> {
        trace!(
            "Creating {} in namespace: {:?}",
            self.definition.kind,
            namespace
        );

        if let Some(target) = self
            .config
            .ephemeral
            .target(&self.definition.group, &self.definition.kind)
        {
            let definition = self
                .registry
                .get_definition(&target.kind, &target.api_version)?;
            debug!(
                "Redirecting ephemeral {} to {} {}",
                self.definition.kind,
                definition.kind,
                definition.group_version()
            );
            let target = ResourceInstance::new(
                definition,
                Arc::clone(&self.storage),
                Arc::clone(&self.registry),
                Arc::clone(&self.config),
            );
            return target.create_object(body, namespace);
        }

        self.create_object(body, namespace)
    }

    fn create_object(&self, body: &Value, namespace: Option<&str>) -> Result<ResourceField> {
        if !body.is_object() {
            return Err(Error::InvalidRequest(
                "resource body must be an object".to_string(),
            ));
        }
        let name = metadata_str(body, "name")
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::InvalidRequest("metadata.name is required".to_string()))?
            .to_string();

        let namespace = if self.definition.namespaced {
            Some(
                namespace
                    .or_else(|| metadata_str(body, "namespace"))
                    .unwrap_or(DEFAULT_NAMESPACE)
                    .to_string(),
            )
        } else {
            None
        };

        let key = self.key(&name, namespace.as_deref());
        if self.storage.contains_key(&key) {
            return Err(Error::AlreadyExists {
                kind: self.definition.kind.clone(),
                name,
                namespace: namespace.unwrap_or_default(),
            });
        }

        let mut object = body.clone();
        object["apiVersion"] = json!(self.definition.api_version());
        object["kind"] = json!(self.definition.kind);

        let meta = metadata_mut(&mut object)?;
        set_namespace(meta, namespace.as_deref());
        meta.insert("uid".to_string(), json!(new_uid()));
        meta.insert(
            "resourceVersion".to_string(),
            json!(self.storage.next_resource_version()),
        );
        meta.insert("creationTimestamp".to_string(), json!(now_timestamp()));
        meta.insert("generation".to_string(), json!(1));
        ensure_label_maps(meta);
        extract_metadata(&object)?;

        let status_schema = self.registry.status_schema(&self.definition);
        add_status(&mut object, &self.definition, status_schema.as_ref());

        self.storage.store_key(&key, &object);
        self.emit(EventReason::Created, &object);
        self.register_if_crd(&object);

        debug!(
            "Created {} {}/{}",
            self.definition.kind,
            namespace.as_deref().unwrap_or(""),
            name
        );
        Ok(ResourceField::new(object))
    }

    /// Creating a CRD object makes its kinds resolvable right away.
    fn register_if_crd(&self, object: &Value) {
        if self.definition.kind != "CustomResourceDefinition"
            || self.definition.group != "apiextensions.k8s.io"
        {
            return;
        }

        let registered = serde_json::from_value::<CustomResourceDefinition>(object.clone())
            .map_err(Error::from)
            .and_then(|crd| self.registry.register_crd(&crd));
        if let Err(e) = registered {
            warn!("Created CRD could not be registered: {}", e);
        }
    }

    /// Fetch one object
    pub fn get(&self, name: &str, namespace: Option<&str>) -> Result<ResourceField> {
        trace!(
            "Getting {} {} in namespace: {:?}",
            self.definition.kind,
            name,
            namespace
        );

        let namespace = self.object_namespace(namespace);
        self.storage
            .get_key(&self.key(name, namespace))
            .map(ResourceField::new)
            .ok_or_else(|| self.not_found(name, namespace))
    }

    /// List objects as a `<Kind>List`.
    ///
    /// Honors the label and field selectors and the limit of `params`.
    pub fn list(&self, namespace: Option<&str>, params: &ListParams) -> Result<ResourceField> {
        trace!(
            "Listing {} in namespace: {:?}",
            self.definition.kind,
            namespace
        );

        let mut items = self.matching(namespace, params)?;
        if let Some(limit) = params.limit {
            items.truncate(limit as usize);
        }

        Ok(ResourceField::new(json!({
            "apiVersion": self.definition.api_version(),
            "kind": format!("{}List", self.definition.kind),
            "metadata": {"resourceVersion": self.storage.next_resource_version()},
            "items": items,
        })))
    }

    fn matching(&self, namespace: Option<&str>, params: &ListParams) -> Result<Vec<Value>> {
        self.storage.list(
            &self.definition.kind,
            &self.definition.group_version(),
            self.list_namespace(namespace),
            params.label_selector.as_deref(),
            params.field_selector.as_deref(),
        )
    }

    /// Delete one object, returning it as it was stored
    pub fn delete(&self, name: &str, namespace: Option<&str>) -> Result<ResourceField> {
        trace!(
            "Deleting {} {} in namespace: {:?}",
            self.definition.kind,
            name,
            namespace
        );

        let namespace = self.object_namespace(namespace);
        let removed = self
            .storage
            .delete_key(&self.key(name, namespace))
            .ok_or_else(|| self.not_found(name, namespace))?;

        self.emit(EventReason::Deleted, &removed);
        debug!(
            "Deleted {} {}/{}",
            self.definition.kind,
            namespace.unwrap_or(""),
            name
        );
        Ok(ResourceField::new(removed))
    }

    /// Collection deletes are not supported.
    pub fn delete_collection(
        &self,
        _namespace: Option<&str>,
        _params: &ListParams,
    ) -> Result<ResourceField> {
        Err(Error::MethodNotAllowed {
            verb: "deletecollection".to_string(),
            kind: self.definition.kind.clone(),
        })
    }

    /// Deep-merge `body` into the stored object.
    ///
    /// Objects merge recursively, anything else overwrites. The name cannot
    /// change; uid, creation time and namespace are kept.
    pub fn patch(&self, name: &str, body: &Value, namespace: Option<&str>) -> Result<ResourceField> {
        if !body.is_object() {
            return Err(Error::InvalidRequest(
                "patch body must be an object".to_string(),
            ));
        }
        self.update_with(name, namespace, |current| {
            crate::utils::deep_merge(current, body);
            Ok(())
        })
    }

    /// Apply a kube-rs [`Patch`].
    ///
    /// `Json` runs RFC 6902 operations and `Merge` RFC 7386 merging;
    /// `Strategic` and `Apply` use the same deep merge as [`patch`](Self::patch).
    pub fn patch_with<P: Serialize>(
        &self,
        name: &str,
        patch: &Patch<P>,
        namespace: Option<&str>,
    ) -> Result<ResourceField> {
        self.update_with(name, namespace, |current| match patch {
            Patch::Json(operations) => Ok(json_patch::patch(current, operations)?),
            Patch::Merge(body) => {
                json_patch::merge(current, &serde_json::to_value(body)?);
                Ok(())
            }
            Patch::Strategic(body) | Patch::Apply(body) => {
                crate::utils::deep_merge(current, &serde_json::to_value(body)?);
                Ok(())
            }
            #[allow(unreachable_patterns)]
            _ => Err(Error::InvalidRequest("unsupported patch type".to_string())),
        })
    }

    /// Replace the stored object with `body`.
    ///
    /// A `metadata.resourceVersion` in the body must match the stored one.
    /// The stored status is kept when the body carries none.
    pub fn replace(&self, name: &str, body: &Value, namespace: Option<&str>) -> Result<ResourceField> {
        if !body.is_object() {
            return Err(Error::InvalidRequest(
                "resource body must be an object".to_string(),
            ));
        }

        let supplied = match body.pointer("/metadata/resourceVersion") {
            None | Some(Value::Null) => None,
            Some(Value::String(rv)) => Some(rv.as_str()),
            Some(other) => {
                return Err(Error::InvalidRequest(format!(
                    "metadata.resourceVersion must be a string, got {}",
                    other
                )))
            }
        };

        if let Some(supplied) = supplied {
            let namespace = self.object_namespace(namespace);
            let stored = self
                .storage
                .get_key(&self.key(name, namespace))
                .ok_or_else(|| self.not_found(name, namespace))?;
            let current = metadata_str(&stored, "resourceVersion").unwrap_or_default();
            if supplied != current {
                return Err(Error::Conflict(format!(
                    "Operation cannot be fulfilled on {} {:?}: the object has been modified \
                     (resourceVersion {} does not match {})",
                    self.definition.plural, name, supplied, current
                )));
            }
        }

        self.update_with(name, namespace, |current| {
            let mut replacement = body.clone();
            if metadata_str(&replacement, "name").is_none() {
                metadata_mut(&mut replacement)?.insert("name".to_string(), json!(name));
            }
            if replacement.get("status").is_none_or(Value::is_null) {
                if let Some(status) = current.get("status") {
                    replacement["status"] = status.clone();
                }
            }
            *current = replacement;
            Ok(())
        })
    }

    /// Load, mutate, re-stamp and store one object, then emit `Updated`.
    fn update_with<F>(&self, name: &str, namespace: Option<&str>, mutate: F) -> Result<ResourceField>
    where
        F: FnOnce(&mut Value) -> Result<()>,
    {
        trace!(
            "Updating {} {} in namespace: {:?}",
            self.definition.kind,
            name,
            namespace
        );

        let namespace = self.object_namespace(namespace);
        let key = self.key(name, namespace);
        let stored = self
            .storage
            .get_key(&key)
            .ok_or_else(|| self.not_found(name, namespace))?;

        let mut updated = stored.clone();
        mutate(&mut updated)?;

        if metadata_str(&updated, "name") != Some(name) {
            return Err(Error::InvalidRequest(format!(
                "metadata.name is immutable: {} cannot be renamed",
                name
            )));
        }

        let generation = stored
            .pointer("/metadata/generation")
            .and_then(Value::as_i64)
            .unwrap_or(0)
            + 1;

        updated["apiVersion"] = json!(self.definition.api_version());
        updated["kind"] = json!(self.definition.kind);

        let meta = metadata_mut(&mut updated)?;
        set_namespace(meta, namespace);
        for preserved in ["uid", "creationTimestamp"] {
            match stored.get("metadata").and_then(|m| m.get(preserved)) {
                Some(value) => meta.insert(preserved.to_string(), value.clone()),
                None => meta.remove(preserved),
            };
        }
        meta.insert(
            "resourceVersion".to_string(),
            json!(self.storage.next_resource_version()),
        );
        meta.insert("generation".to_string(), json!(generation));
        ensure_label_maps(meta);
        extract_metadata(&updated)?;

        self.storage.store_key(&key, &updated);
        self.emit(EventReason::Updated, &updated);

        debug!(
            "Updated {} {}/{} to generation {}",
            self.definition.kind,
            namespace.unwrap_or(""),
            name,
            generation
        );
        Ok(ResourceField::new(updated))
    }

    /// One `ADDED` event per currently stored matching object.
    ///
    /// The enumeration is finite and reflects storage at call time; call
    /// again to re-enumerate. Selector errors surface here, not mid-iteration.
    pub fn watch(
        &self,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> Result<impl Iterator<Item = WatchEvent>> {
        trace!(
            "Watching {} in namespace: {:?}",
            self.definition.kind,
            namespace
        );

        Ok(self
            .matching(namespace, params)?
            .into_iter()
            .map(|object| WatchEvent {
                event_type: WatchEventType::Added,
                object: ResourceField::new(object),
            }))
    }

    /// [`watch`](Self::watch) as a [`Stream`] for async callers
    pub fn watch_stream(
        &self,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> Result<impl Stream<Item = WatchEvent>> {
        Ok(futures::stream::iter(self.watch(namespace, params)?))
    }
}
