//! Resource registry
//!
//! Resolves `(kind, apiVersion)` pairs to [`ResourceDefinition`]s. Definitions
//! come from three places, highest precedence first:
//!
//! 1. Definitions registered explicitly by the caller (including CRDs)
//! 2. The schema mapping loaded from the registry's [`SchemaSource`]
//! 3. Fallback synthesis for unmapped kinds, allowed only when the caller
//!    configured the scope of the kind or its group in [`FallbackScopes`]
//!
//! A kind resolved by none of these is a [`Error::ResourceNotFound`]; the
//! registry never guesses whether an unknown kind is namespaced.

use crate::client_utils::{group_version, pluralize, split_api_version};
use crate::schema::{SchemaCache, SchemaMapping, SchemaSource};
use crate::{Error, Result};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::core::CustomResourceExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, trace};

/// Descriptor of one resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    /// The Kind name (e.g., "Deployment")
    pub kind: String,
    /// The API group, empty for the core group
    #[serde(default)]
    pub group: String,
    pub version: String,
    #[serde(default)]
    pub plural: String,
    #[serde(default)]
    pub singular: String,
    pub namespaced: bool,
    #[serde(default)]
    pub short_names: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl ResourceDefinition {
    /// Create a definition, deriving plural and singular names from the kind
    pub fn new(
        kind: impl Into<String>,
        group: impl Into<String>,
        version: impl Into<String>,
        namespaced: bool,
    ) -> Self {
        let kind = kind.into();
        Self {
            plural: pluralize(&kind),
            singular: kind.to_ascii_lowercase(),
            kind,
            group: group.into(),
            version: version.into(),
            namespaced,
            short_names: Vec::new(),
            categories: Vec::new(),
        }
    }

    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = plural.into();
        self
    }

    pub fn with_singular(mut self, singular: impl Into<String>) -> Self {
        self.singular = singular.into();
        self
    }

    pub fn with_short_names<I, S>(mut self, short_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.short_names = short_names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// `group/version`, or the bare version for the core group
    pub fn group_version(&self) -> String {
        group_version(&self.group, &self.version)
    }

    /// Alias of [`group_version`](Self::group_version), the value of `apiVersion`
    pub fn api_version(&self) -> String {
        self.group_version()
    }

    fn key(&self) -> DefinitionKey {
        DefinitionKey {
            kind: self.kind.clone(),
            group_version: self.group_version(),
        }
    }

    fn fill_names(&mut self) {
        if self.plural.is_empty() {
            self.plural = pluralize(&self.kind);
        }
        if self.singular.is_empty() {
            self.singular = self.kind.to_ascii_lowercase();
        }
    }
}

/// Caller-supplied scopes for kinds missing from the schema mapping.
///
/// Kind rules win over group rules.
#[derive(Debug, Clone, Default)]
pub struct FallbackScopes {
    groups: HashMap<String, bool>,
    kinds: HashMap<String, bool>,
}

impl FallbackScopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: impl Into<String>, namespaced: bool) -> Self {
        self.groups.insert(group.into(), namespaced);
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>, namespaced: bool) -> Self {
        self.kinds.insert(kind.into(), namespaced);
        self
    }

    pub fn resolve(&self, kind: &str, group: &str) -> Option<bool> {
        self.kinds
            .get(kind)
            .or_else(|| self.groups.get(group))
            .copied()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.kinds.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DefinitionKey {
    kind: String,
    group_version: String,
}

impl DefinitionKey {
    fn new(kind: &str, api_version: &str) -> Self {
        let (group, version) = split_api_version(api_version);
        Self {
            kind: kind.to_string(),
            group_version: group_version(&group, &version),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    definition: ResourceDefinition,
    status_schema: Option<Value>,
}

/// Definitions in insertion order with keyed replacement
#[derive(Debug, Default)]
struct DefinitionTable {
    order: Vec<DefinitionKey>,
    entries: HashMap<DefinitionKey, Entry>,
}

impl DefinitionTable {
    fn insert(&mut self, entry: Entry) {
        let key = entry.definition.key();
        if self.entries.insert(key.clone(), entry).is_none() {
            self.order.push(key);
        }
    }

    fn get(&self, key: &DefinitionKey) -> Option<&Entry> {
        self.entries.get(key)
    }

    fn remove(&mut self, key: &DefinitionKey) -> Option<Entry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.order.iter().filter_map(|k| self.entries.get(k))
    }

    fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }
}

fn index_mapping(mapping: &SchemaMapping) -> DefinitionTable {
    let mut table = DefinitionTable::default();

    for (mapping_kind, entries) in mapping.iter() {
        for entry in entries {
            let Some(namespaced) = entry.namespaced else {
                debug!(
                    "Skipping schema entry for {}: no namespaced flag",
                    mapping_kind
                );
                continue;
            };

            for gvk in &entry.group_version_kinds {
                let mut definition =
                    ResourceDefinition::new(&gvk.kind, &gvk.group, &gvk.version, namespaced)
                        .with_short_names(entry.short_names.iter().cloned())
                        .with_categories(entry.categories.iter().cloned());
                if let Some(plural) = &entry.plural {
                    definition.plural = plural.clone();
                }
                if let Some(singular) = &entry.singular {
                    definition.singular = singular.clone();
                }

                table.insert(Entry {
                    definition,
                    status_schema: entry.status_schema().cloned(),
                });
            }
        }
    }

    table
}

/// Catalog of resource types known to a fake client
#[derive(Debug)]
pub struct ResourceRegistry {
    cache: SchemaCache,
    fallback: FallbackScopes,
    mapped: RwLock<DefinitionTable>,
    registered: RwLock<DefinitionTable>,
    synthesized: RwLock<DefinitionTable>,
}

impl ResourceRegistry {
    /// Create a registry, loading the schema source eagerly
    pub fn new(source: SchemaSource, fallback: FallbackScopes) -> Result<Self> {
        let cache = SchemaCache::new(source);
        let mapped = index_mapping(&*cache.load()?);
        debug!("Registry loaded {} mapped definitions", mapped.order.len());

        Ok(Self {
            cache,
            fallback,
            mapped: RwLock::new(mapped),
            registered: RwLock::new(DefinitionTable::default()),
            synthesized: RwLock::new(DefinitionTable::default()),
        })
    }

    /// A registry with no mapping and no fallback rules
    pub fn empty() -> Self {
        Self {
            cache: SchemaCache::new(SchemaSource::Empty),
            fallback: FallbackScopes::default(),
            mapped: RwLock::new(DefinitionTable::default()),
            registered: RwLock::new(DefinitionTable::default()),
            synthesized: RwLock::new(DefinitionTable::default()),
        }
    }

    pub fn fallback_scopes(&self) -> &FallbackScopes {
        &self.fallback
    }

    fn lookup(&self, key: &DefinitionKey) -> Option<Entry> {
        for table in [&self.registered, &self.mapped, &self.synthesized] {
            if let Some(entry) = table
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(key)
            {
                return Some(entry.clone());
            }
        }
        None
    }

    /// Resolve a kind in an apiVersion (`v1`, `apps/v1`, ...)
    pub fn get_definition(&self, kind: &str, api_version: &str) -> Result<ResourceDefinition> {
        trace!("Resolving definition: {} {}", kind, api_version);

        let key = DefinitionKey::new(kind, api_version);
        if let Some(entry) = self.lookup(&key) {
            return Ok(entry.definition);
        }

        self.synthesize(kind, api_version)
    }

    /// Resolve a kind within a group, preferring the first version the
    /// sources list for it
    pub fn get_definition_in_group(&self, kind: &str, group: &str) -> Result<ResourceDefinition> {
        trace!("Resolving definition: {} in group {:?}", kind, group);

        for table in [&self.registered, &self.mapped, &self.synthesized] {
            let table = table.read().unwrap_or_else(PoisonError::into_inner);
            let found = table
                .iter()
                .find(|e| e.definition.kind == kind && e.definition.group == group)
                .map(|e| e.definition.clone());
            if let Some(definition) = found {
                return Ok(definition);
            }
        }

        Err(Error::ResourceNotFound {
            kind: kind.to_string(),
            api_version: group.to_string(),
        })
    }

    fn synthesize(&self, kind: &str, api_version: &str) -> Result<ResourceDefinition> {
        let (group, version) = split_api_version(api_version);
        let namespaced = self.fallback.resolve(kind, &group).ok_or_else(|| {
            Error::ResourceNotFound {
                kind: kind.to_string(),
                api_version: api_version.to_string(),
            }
        })?;

        let definition = ResourceDefinition::new(kind, group, version, namespaced);
        debug!(
            "Synthesized definition for {} {} (plural {}, namespaced {})",
            kind,
            definition.group_version(),
            definition.plural,
            namespaced
        );

        self.synthesized
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(Entry {
                definition: definition.clone(),
                status_schema: None,
            });
        Ok(definition)
    }

    /// Definitions matching every given filter.
    ///
    /// A kind with no known definitions goes through fallback synthesis when
    /// an apiVersion is given, or a group with at least one known version; the
    /// group's first known version is used.
    pub fn search(
        &self,
        kind: Option<&str>,
        group: Option<&str>,
        api_version: Option<&str>,
    ) -> Vec<ResourceDefinition> {
        let wanted_gv = api_version.map(|av| DefinitionKey::new("", av).group_version);
        let matches = |d: &ResourceDefinition| {
            kind.is_none_or(|k| d.kind == k)
                && group.is_none_or(|g| d.group == g)
                && wanted_gv.as_ref().is_none_or(|gv| &d.group_version() == gv)
        };

        let mut seen = std::collections::HashSet::new();
        let mut found = Vec::new();
        for table in [&self.registered, &self.mapped, &self.synthesized] {
            let table = table.read().unwrap_or_else(PoisonError::into_inner);
            for entry in table.iter() {
                if matches(&entry.definition) && seen.insert(entry.definition.key()) {
                    found.push(entry.definition.clone());
                }
            }
        }

        if found.is_empty() {
            if let Some(kind) = kind {
                let api_version = api_version.map(str::to_string).or_else(|| {
                    group.and_then(|g| {
                        self.first_version_in_group(g)
                            .map(|version| group_version(g, &version))
                    })
                });
                if let Some(api_version) = api_version {
                    if let Ok(definition) = self.synthesize(kind, &api_version) {
                        if matches(&definition) {
                            found.push(definition);
                        }
                    }
                }
            }
        }

        found
    }

    /// First version any known definition of `group` is served at
    fn first_version_in_group(&self, group: &str) -> Option<String> {
        for table in [&self.registered, &self.mapped, &self.synthesized] {
            let table = table.read().unwrap_or_else(PoisonError::into_inner);
            let version = table
                .iter()
                .find(|e| e.definition.group == group)
                .map(|e| e.definition.version.clone());
            if version.is_some() {
                return version;
            }
        }
        None
    }

    /// Register definitions explicitly; they win over mapped and synthesized
    /// ones and replace earlier registrations of the same kind and apiVersion.
    pub fn register_resources<I>(&self, definitions: I) -> Result<()>
    where
        I: IntoIterator<Item = ResourceDefinition>,
    {
        for definition in definitions {
            self.register_with_status_schema(definition, None)?;
        }
        Ok(())
    }

    /// Register definitions given as JSON objects.
    ///
    /// `namespaced` is required; `apiVersion` may stand in for `group` and
    /// `version`.
    pub fn register_resource_values(&self, values: &[Value]) -> Result<()> {
        let definitions = values
            .iter()
            .map(definition_from_value)
            .collect::<Result<Vec<_>>>()?;
        self.register_resources(definitions)
    }

    /// Register a definition together with the OpenAPI schema of its status
    pub fn register_with_status_schema(
        &self,
        mut definition: ResourceDefinition,
        status_schema: Option<Value>,
    ) -> Result<()> {
        if definition.kind.is_empty() || definition.version.is_empty() {
            return Err(Error::InvalidRequest(
                "resource definitions need a kind and a version".to_string(),
            ));
        }
        definition.fill_names();

        let key = definition.key();
        self.synthesized
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);

        debug!(
            "Registered definition: {} {}",
            definition.kind,
            definition.group_version()
        );

        // Last write wins: drop the old entry so the new one takes its place
        let mut registered = self.registered.write().unwrap_or_else(PoisonError::into_inner);
        registered.remove(&key);
        registered.insert(Entry {
            definition,
            status_schema,
        });
        Ok(())
    }

    /// Register every served version of a CRD object
    pub fn register_crd(&self, crd: &CustomResourceDefinition) -> Result<Vec<ResourceDefinition>> {
        let spec = &crd.spec;
        let namespaced = match spec.scope.as_str() {
            "Namespaced" => true,
            "Cluster" => false,
            other => {
                return Err(Error::InvalidRequest(format!(
                    "unknown CRD scope {:?} for {}",
                    other, spec.names.kind
                )))
            }
        };

        let mut registered = Vec::new();
        for version in spec.versions.iter().filter(|v| v.served) {
            let mut definition =
                ResourceDefinition::new(&spec.names.kind, &spec.group, &version.name, namespaced)
                    .with_plural(&spec.names.plural)
                    .with_short_names(spec.names.short_names.clone().unwrap_or_default())
                    .with_categories(spec.names.categories.clone().unwrap_or_default());
            if let Some(singular) = spec.names.singular.as_ref().filter(|s| !s.is_empty()) {
                definition.singular = singular.clone();
            }

            let status_schema = version
                .schema
                .as_ref()
                .and_then(|s| s.open_api_v3_schema.as_ref())
                .map(serde_json::to_value)
                .transpose()?
                .and_then(|schema| schema.pointer("/properties/status").cloned());

            self.register_with_status_schema(definition.clone(), status_schema)?;
            registered.push(definition);
        }

        Ok(registered)
    }

    /// Register a kube-derive custom resource type
    pub fn register_custom_resource<K: CustomResourceExt>(&self) -> Result<Vec<ResourceDefinition>> {
        self.register_crd(&K::crd())
    }

    /// OpenAPI schema of the definition's `status`, if any source declared one
    pub fn status_schema(&self, definition: &ResourceDefinition) -> Option<Value> {
        self.lookup(&definition.key())
            .and_then(|entry| entry.status_schema)
    }

    /// Every known definition, explicit ones first
    pub fn definitions(&self) -> Vec<ResourceDefinition> {
        self.search(None, None, None)
    }

    /// Forget synthesized definitions and reload the schema source.
    /// Explicit registrations survive.
    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear();
        self.synthesized
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let mapped = index_mapping(&*self.cache.load()?);
        *self.mapped.write().unwrap_or_else(PoisonError::into_inner) = mapped;
        debug!("Registry cache cleared and reloaded");
        Ok(())
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

fn definition_from_value(value: &Value) -> Result<ResourceDefinition> {
    let object = value.as_object().ok_or_else(|| {
        Error::InvalidRequest("resource definition must be an object".to_string())
    })?;
    let kind = object.get("kind").and_then(Value::as_str).unwrap_or("<unknown>");

    match object.get("namespaced") {
        Some(Value::Bool(_)) => {}
        Some(_) => {
            return Err(Error::InvalidRequest(format!(
                "resource definition for {} has a non-boolean namespaced field",
                kind
            )))
        }
        None => {
            return Err(Error::InvalidRequest(format!(
                "resource definition for {} is missing the required namespaced field",
                kind
            )))
        }
    }

    let mut object = object.clone();
    if !object.contains_key("version") {
        if let Some(api_version) = object.get("apiVersion").and_then(Value::as_str) {
            let (group, version) = split_api_version(api_version);
            object.insert("group".to_string(), Value::String(group));
            object.insert("version".to_string(), Value::String(version));
        }
    }

    serde_json::from_value(Value::Object(object))
        .map_err(|e| Error::InvalidRequest(format!("invalid resource definition for {}: {}", kind, e)))
}
