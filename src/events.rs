//! Synthetic `v1/Event` records for lifecycle operations

use crate::storage::ResourceStorage;
use crate::utils::{metadata_str, new_uid, now_timestamp};
use serde_json::{json, Value};
use std::fmt;
use tracing::trace;

pub const EVENT_KIND: &str = "Event";
pub const EVENT_API_VERSION: &str = "v1";
pub const EVENT_SOURCE_COMPONENT: &str = "kube-fake-dynamic-client";

/// Namespace used for events about cluster-scoped objects
const CLUSTER_EVENT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventReason {
    Created,
    Updated,
    Deleted,
}

impl EventReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Deleted => "Deleted",
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EventReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether operations on `kind` produce events. Events about events are not
/// recorded.
pub fn emits_events(kind: &str) -> bool {
    kind != EVENT_KIND
}

/// Build an Event about `object`, referencing it by identity only.
pub fn build_event(reason: EventReason, object: &Value, resource_version: &str) -> Value {
    let kind = object.get("kind").and_then(Value::as_str).unwrap_or_default();
    let api_version = object
        .get("apiVersion")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let name = metadata_str(object, "name").unwrap_or_default();
    let namespace = metadata_str(object, "namespace");
    let uid = metadata_str(object, "uid").unwrap_or_default();

    let suffix: String = new_uid().replace('-', "").chars().take(16).collect();
    let now = now_timestamp();

    json!({
        "apiVersion": EVENT_API_VERSION,
        "kind": EVENT_KIND,
        "metadata": {
            "name": format!("{}.{}", name, suffix),
            "namespace": namespace.unwrap_or(CLUSTER_EVENT_NAMESPACE),
            "uid": new_uid(),
            "resourceVersion": resource_version,
            "creationTimestamp": now,
            "labels": {},
            "annotations": {},
        },
        "involvedObject": {
            "apiVersion": api_version,
            "kind": kind,
            "name": name,
            "namespace": namespace,
            "uid": uid,
        },
        "reason": reason.as_str(),
        "message": format!("{} {} {}", kind, name, reason.verb()),
        "type": "Normal",
        "source": {"component": EVENT_SOURCE_COMPONENT},
        "firstTimestamp": now,
        "lastTimestamp": now,
        "count": 1,
    })
}

/// Build an Event about `object` and write it straight to storage.
pub fn record_event(storage: &ResourceStorage, reason: EventReason, object: &Value) {
    let event = build_event(reason, object, &storage.next_resource_version());
    let (Some(name), Some(namespace)) = (
        metadata_str(&event, "name"),
        metadata_str(&event, "namespace"),
    ) else {
        return;
    };

    trace!("Recording {} event {}/{}", reason, namespace, name);
    storage.store(EVENT_KIND, EVENT_API_VERSION, name, Some(namespace), &event);
}
