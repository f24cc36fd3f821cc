//! Fake dynamic client for in-memory testing

use crate::builder::ClientBuilder;
use crate::instance::{InstanceConfig, ResourceInstance};
use crate::registry::{ResourceDefinition, ResourceRegistry};
use crate::storage::ResourceStorage;
use crate::Result;
use std::sync::Arc;
use tracing::trace;

/// In-memory stand-in for the Kubernetes dynamic client.
///
/// Cloning is cheap; clones share storage and registry.
///
/// ```
/// use kube_fake_dynamic_client::FakeDynamicClient;
/// use serde_json::json;
///
/// # fn main() -> kube_fake_dynamic_client::Result<()> {
/// let client = FakeDynamicClient::new()?;
/// let pods = client.resources().get("Pod", "v1")?;
///
/// let pod = pods.create(
///     &json!({"metadata": {"name": "p1"}, "spec": {"containers": [{"name": "c"}]}}),
///     Some("default"),
/// )?;
/// assert_eq!(pod.str_at("status.phase"), Some("Running"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FakeDynamicClient {
    pub(crate) storage: Arc<ResourceStorage>,
    pub(crate) registry: Arc<ResourceRegistry>,
    pub(crate) config: Arc<InstanceConfig>,
}

impl FakeDynamicClient {
    /// A client with the built-in resource catalog and default settings
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn resources(&self) -> ResourceManager {
        ResourceManager {
            client: self.clone(),
        }
    }

    pub fn storage(&self) -> &Arc<ResourceStorage> {
        &self.storage
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Drop every stored object, events included. Registrations stay.
    pub fn clear(&self) {
        self.storage.clear();
    }
}

/// Entry point for resolving resource types, `client.resources()`
#[derive(Debug, Clone)]
pub struct ResourceManager {
    client: FakeDynamicClient,
}

impl ResourceManager {
    fn instance(&self, definition: ResourceDefinition) -> ResourceInstance {
        ResourceInstance::new(
            definition,
            Arc::clone(&self.client.storage),
            Arc::clone(&self.client.registry),
            Arc::clone(&self.client.config),
        )
    }

    /// Resolve a kind in an apiVersion such as `v1` or `apps/v1`
    pub fn get(&self, kind: &str, api_version: &str) -> Result<ResourceInstance> {
        trace!("Resolving resource API: {} {}", kind, api_version);
        let definition = self.client.registry.get_definition(kind, api_version)?;
        Ok(self.instance(definition))
    }

    /// Resolve a kind by group, taking the first version known for it
    pub fn get_in_group(&self, kind: &str, group: &str) -> Result<ResourceInstance> {
        let definition = self.client.registry.get_definition_in_group(kind, group)?;
        Ok(self.instance(definition))
    }

    /// Resolve the resource type of a typed k8s-openapi or kube-derive resource
    pub fn get_for<K>(&self) -> Result<ResourceInstance>
    where
        K: kube::Resource<DynamicType = ()>,
    {
        self.get(&K::kind(&()), &K::api_version(&()))
    }

    pub fn search(
        &self,
        kind: Option<&str>,
        group: Option<&str>,
        api_version: Option<&str>,
    ) -> Vec<ResourceDefinition> {
        self.client.registry.search(kind, group, api_version)
    }

    pub fn register_resources<I>(&self, definitions: I) -> Result<()>
    where
        I: IntoIterator<Item = ResourceDefinition>,
    {
        self.client.registry.register_resources(definitions)
    }
}
