//! In-memory fake of the Kubernetes dynamic client for unit tests.
//!
//! Resolve a resource type by kind and apiVersion, then create, read,
//! patch, replace, delete, list and watch objects as plain JSON. Objects get
//! the metadata an API server would stamp (uid, resourceVersion,
//! creationTimestamp, generation) and a synthetic status, and every mutation
//! records a `v1/Event`.
//!
//! # Examples
//!
//! ## Namespaced Resources
//!
//! ```rust
//! use kube_fake_dynamic_client::FakeDynamicClient;
//! use kube::api::ListParams;
//! use serde_json::json;
//!
//! # fn main() -> kube_fake_dynamic_client::Result<()> {
//! let client = FakeDynamicClient::new()?;
//! let deployments = client.resources().get("Deployment", "apps/v1")?;
//!
//! deployments.create(
//!     &json!({
//!         "metadata": {"name": "web", "labels": {"app": "web"}},
//!         "spec": {"replicas": 3}
//!     }),
//!     Some("default"),
//! )?;
//!
//! let patched = deployments.patch("web", &json!({"spec": {"replicas": 5}}), Some("default"))?;
//! assert_eq!(patched.generation(), Some(2));
//!
//! let list = deployments.list(None, &ListParams::default().labels("app=web"))?;
//! assert_eq!(list.items().len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Cluster-Scoped Resources
//!
//! ```rust
//! use kube_fake_dynamic_client::FakeDynamicClient;
//! use serde_json::json;
//!
//! # fn main() -> kube_fake_dynamic_client::Result<()> {
//! let client = FakeDynamicClient::new()?;
//! let namespaces = client.resources().get("Namespace", "v1")?;
//!
//! let ns = namespaces.create(&json!({"metadata": {"name": "team-a"}}), Some("ignored"))?;
//! assert_eq!(ns.namespace(), None);
//! assert_eq!(ns.str_at("status.phase"), Some("Active"));
//! # Ok(())
//! # }
//! ```

mod builder;
mod client;
mod client_utils;
mod error;
pub mod events;
mod field;
pub mod field_selector;
mod instance;
pub mod label_selector;
pub mod registry;
pub mod schema;
pub mod status;
pub mod storage;
mod utils;

#[cfg(test)]
mod instance_test;
#[cfg(test)]
mod label_selector_test;

pub use builder::ClientBuilder;
pub use client::{FakeDynamicClient, ResourceManager};
pub use error::{Error, Result};
pub use field::ResourceField;
pub use instance::{
    EphemeralRedirects, EphemeralTarget, ResourceInstance, WatchEvent, WatchEventType,
    DEFAULT_NAMESPACE,
};
pub use registry::{FallbackScopes, ResourceDefinition, ResourceRegistry};
pub use schema::SchemaSource;
pub use storage::{ResourceStorage, StorageKey};
