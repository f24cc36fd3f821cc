//! Builder for constructing fake dynamic clients

use crate::client::FakeDynamicClient;
use crate::client_utils::extract_gvk;
use crate::instance::{EphemeralRedirects, InstanceConfig};
use crate::registry::{FallbackScopes, ResourceDefinition, ResourceRegistry};
use crate::schema::SchemaSource;
use crate::storage::ResourceStorage;
use crate::utils::metadata_str;
use crate::{Error, Result};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::core::CustomResourceExt;
use kube::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Builder for creating fake dynamic clients
///
/// Provides a fluent API for configuring:
/// - Where resource definitions come from (built-in catalog, schema mappings,
///   explicit definitions, custom resources)
/// - How unmapped kinds are scoped
/// - Ephemeral kinds and event recording
/// - Initial objects, inline or from YAML fixtures
///
/// # Example
///
/// ```rust
/// use kube_fake_dynamic_client::ClientBuilder;
/// use serde_json::json;
///
/// # fn main() -> kube_fake_dynamic_client::Result<()> {
/// let client = ClientBuilder::new()
///     .with_fallback_group_scope("example.com", true)
///     .with_runtime_objects(vec![json!({
///         "apiVersion": "v1",
///         "kind": "ConfigMap",
///         "metadata": {"name": "settings", "namespace": "default"},
///         "data": {"mode": "test"}
///     })])
///     .build()?;
///
/// let settings = client.resources().get("ConfigMap", "v1")?.get("settings", None)?;
/// assert_eq!(settings.str_at("data.mode"), Some("test"));
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    builtin_resources: bool,
    schema_sources: Vec<SchemaSource>,
    definitions: Vec<ResourceDefinition>,
    custom_resources: Vec<CustomResourceDefinition>,
    fallback: FallbackScopes,
    ephemeral: EphemeralRedirects,
    emit_events: bool,
    initial_objects: Vec<Value>,
    fixture_dir: Option<PathBuf>,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new() -> Self {
        Self {
            builtin_resources: true,
            schema_sources: Vec::new(),
            definitions: Vec::new(),
            custom_resources: Vec::new(),
            fallback: FallbackScopes::default(),
            ephemeral: EphemeralRedirects::default(),
            emit_events: true,
            initial_objects: Vec::new(),
            fixture_dir: None,
        }
    }

    /// Layer a schema mapping on top of the built-in catalog
    ///
    /// The value is an object keyed by lowercased kind, each holding a list of
    /// entries with `x-kubernetes-group-version-kind` and `namespaced`.
    pub fn with_schema_mapping(mut self, mapping: Value) -> Self {
        self.schema_sources.push(SchemaSource::Inline(mapping));
        self
    }

    /// Layer a JSON or YAML schema-mapping file on top of the built-in catalog
    ///
    /// A missing file yields no definitions rather than an error.
    pub fn with_schema_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_sources.push(SchemaSource::file(path));
        self
    }

    /// Start from an empty catalog instead of the bundled one
    pub fn without_builtin_resources(mut self) -> Self {
        self.builtin_resources = false;
        self
    }

    /// Register a definition explicitly; it wins over mapped ones
    pub fn with_resource_definition(mut self, definition: ResourceDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Register every served version of a kube-derive custom resource
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let client = ClientBuilder::new()
    ///     .with_custom_resource::<Widget>()
    ///     .build()?;
    /// ```
    pub fn with_custom_resource<K: CustomResourceExt>(mut self) -> Self {
        self.custom_resources.push(K::crd());
        self
    }

    /// Scope unmapped kinds of `group` as namespaced or cluster-scoped
    pub fn with_fallback_group_scope(mut self, group: impl Into<String>, namespaced: bool) -> Self {
        self.fallback = self.fallback.with_group(group, namespaced);
        self
    }

    /// Scope one unmapped kind; wins over group rules
    pub fn with_fallback_kind_scope(mut self, kind: impl Into<String>, namespaced: bool) -> Self {
        self.fallback = self.fallback.with_kind(kind, namespaced);
        self
    }

    /// Make `kind` in `group` ephemeral: creating it creates `target_kind` instead
    pub fn with_ephemeral_kind(
        mut self,
        group: impl Into<String>,
        kind: impl Into<String>,
        target_kind: impl Into<String>,
        target_api_version: impl Into<String>,
    ) -> Self {
        self.ephemeral.insert(group, kind, target_kind, target_api_version);
        self
    }

    /// Drop the default ephemeral kinds (`ProjectRequest`)
    pub fn without_ephemeral_kinds(mut self) -> Self {
        self.ephemeral = EphemeralRedirects::empty();
        self
    }

    /// Do not record Events for create, update and delete
    pub fn without_events(mut self) -> Self {
        self.emit_events = false;
        self
    }

    /// Add an initial object
    ///
    /// Objects are created when the client is built, with the same stamping
    /// and status synthesis as a regular create.
    ///
    /// # Example
    ///
    /// ```rust
    /// use kube_fake_dynamic_client::ClientBuilder;
    /// use k8s_openapi::api::core::v1::Pod;
    ///
    /// # fn main() -> kube_fake_dynamic_client::Result<()> {
    /// let mut pod = Pod::default();
    /// pod.metadata.name = Some("test-pod".to_string());
    ///
    /// let client = ClientBuilder::new().with_object(pod).build()?;
    /// assert!(client.resources().get("Pod", "v1")?.get("test-pod", None).is_ok());
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_object<K>(mut self, obj: K) -> Self
    where
        K: Resource + Serialize,
    {
        match serde_json::to_value(&obj) {
            Ok(value) => self.initial_objects.push(value),
            Err(e) => warn!("Skipping initial object that failed to serialize: {}", e),
        }
        self
    }

    /// Add multiple initial objects
    pub fn with_objects<K>(mut self, objects: Vec<K>) -> Self
    where
        K: Resource + Serialize,
    {
        for obj in objects {
            self = self.with_object(obj);
        }
        self
    }

    /// Add initial objects from JSON values
    pub fn with_runtime_objects(mut self, objects: Vec<Value>) -> Self {
        self.initial_objects.extend(objects);
        self
    }

    /// Set the fixture directory for loading YAML fixtures
    ///
    /// This directory will be used as the base path for `load_fixture` calls.
    pub fn with_fixture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixture_dir = Some(dir.into());
        self
    }

    /// Load objects from a YAML fixture file
    ///
    /// Supports both single-document and multi-document YAML files (separated by `---`).
    /// If a fixture directory was set with `with_fixture_dir`, the path is relative to that directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a document is not valid YAML.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use kube_fake_dynamic_client::ClientBuilder;
    ///
    /// # fn main() -> kube_fake_dynamic_client::Result<()> {
    /// let client = ClientBuilder::new()
    ///     .with_fixture_dir("fixtures")
    ///     .load_fixture("pods.yaml")?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_fixture(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let fixture_path = match &self.fixture_dir {
            Some(dir) => dir.join(path),
            None => path.as_ref().to_path_buf(),
        };

        let content = std::fs::read_to_string(&fixture_path).map_err(|e| {
            Error::Internal(format!(
                "Failed to read fixture file {:?}: {}",
                fixture_path, e
            ))
        })?;

        let mut loaded = 0;
        for document in serde_yaml::Deserializer::from_str(&content) {
            let value = Value::deserialize(document)?;
            // Empty documents between separators
            if value.is_null() {
                continue;
            }
            self.initial_objects.push(value);
            loaded += 1;
        }

        debug!("Loaded {} objects from {:?}", loaded, fixture_path);
        Ok(self)
    }

    /// Load objects from multiple YAML fixture files, in order
    pub fn load_fixtures<P>(mut self, paths: impl IntoIterator<Item = P>) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        for path in paths {
            self = self.load_fixture(path)?;
        }
        Ok(self)
    }

    fn schema_source(&mut self) -> SchemaSource {
        let mut sources = Vec::with_capacity(self.schema_sources.len() + 1);
        if self.builtin_resources {
            sources.push(SchemaSource::Builtin);
        }
        sources.append(&mut self.schema_sources);

        match sources.len() {
            0 => SchemaSource::Empty,
            1 => sources.remove(0),
            _ => SchemaSource::Layered(sources),
        }
    }

    /// Build the client and create the initial objects
    ///
    /// # Errors
    ///
    /// Returns an error if a schema source is malformed, a definition is
    /// invalid, or an initial object cannot be created.
    pub fn build(mut self) -> Result<FakeDynamicClient> {
        let registry = ResourceRegistry::new(self.schema_source(), self.fallback)?;
        registry.register_resources(self.definitions)?;
        for crd in &self.custom_resources {
            registry.register_crd(crd)?;
        }

        let config = InstanceConfig {
            ephemeral: self.ephemeral,
            emit_events: self.emit_events,
        };
        let client = FakeDynamicClient {
            storage: Arc::new(ResourceStorage::new()),
            registry: Arc::new(registry),
            config: Arc::new(config.clone()),
        };

        // Seeded objects are part of the starting state, not activity
        let seeding = FakeDynamicClient {
            config: Arc::new(InstanceConfig {
                emit_events: false,
                ..config
            }),
            ..client.clone()
        };
        for obj in &self.initial_objects {
            let gvk = extract_gvk(obj)?;
            let api_version = crate::client_utils::group_version(&gvk.group, &gvk.version);
            seeding
                .resources()
                .get(&gvk.kind, &api_version)?
                .create(obj, metadata_str(obj, "namespace"))?;
        }

        debug!(
            "Built fake dynamic client with {} definitions and {} objects",
            client.registry.definitions().len(),
            client.storage.len()
        );
        Ok(client)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
