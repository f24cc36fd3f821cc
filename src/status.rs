//! Synthetic status generation
//!
//! Freshly created objects get a plausible `status` so code under test sees
//! resources that look reconciled. Resolution order:
//!
//! 1. A hardcoded template for Pod, Deployment, Service and Namespace
//! 2. A walk of the kind's OpenAPI status schema, when the registry has one
//! 3. A generic `Ready=True` condition list
//!
//! Status the caller supplied is overlaid on top of the synthesized one.

use crate::registry::ResourceDefinition;
use crate::utils::{deep_merge, lookup_path, new_uid, now_timestamp};
use crate::{Error, Result};
use phf::{phf_map, phf_set};
use rand::Rng;
use serde_json::{json, Map, Value};
use tracing::{trace, warn};

const MAX_SCHEMA_DEPTH: usize = 8;

/// Ranking used to pick an enum value; unlisted values rank 0.
static ENUM_PREFERENCE: phf::Map<&'static str, i8> = phf_map! {
    "Ready" => 10,
    "True" => 10,
    "Running" => 9,
    "Active" => 9,
    "Bound" => 9,
    "Available" => 9,
    "Healthy" => 9,
    "Succeeded" => 8,
    "Complete" => 8,
    "Completed" => 8,
    "Established" => 7,
    "Approved" => 7,
    "Admitted" => 7,
    "Pending" => -1,
    "Released" => -2,
    "Unknown" => -5,
    "Terminating" => -6,
    "False" => -8,
    "Lost" => -9,
    "Failed" => -10,
    "Error" => -10,
};

/// Boolean status fields that read as healthy when true
static POSITIVE_FLAGS: phf::Set<&'static str> = phf_set! {
    "ready",
    "available",
    "started",
    "healthy",
    "succeeded",
    "active",
    "bound",
    "established",
    "accepted",
    "approved",
    "synced",
};

/// Values for plain string fields, by field name
static STRING_DEFAULTS: phf::Map<&'static str, &'static str> = phf_map! {
    "phase" => "Active",
    "state" => "Ready",
    "status" => "True",
    "type" => "Ready",
    "reason" => "ResourceReady",
    "message" => "Resource is ready",
    "hostname" => "localhost",
    "host" => "localhost",
};

/// Populate `resource["status"]` for a freshly created object.
///
/// Never fails: schema problems degrade to the generic status with a warning.
pub fn add_status(
    resource: &mut Value,
    definition: &ResourceDefinition,
    status_schema: Option<&Value>,
) {
    trace!("Synthesizing status for {} {}", definition.kind, definition.group_version());

    if definition.group.is_empty() && definition.kind == "Service" {
        assign_cluster_ip(resource);
    }

    let mut status = synthesize_status(resource, definition, status_schema);

    let Some(object) = resource.as_object_mut() else {
        return;
    };
    if let Some(supplied) = object.get("status").filter(|s| s.is_object()) {
        deep_merge(&mut status, supplied);
    }
    object.insert("status".to_string(), status);
}

/// Build the status a new object of this kind would carry.
pub fn synthesize_status(
    resource: &Value,
    definition: &ResourceDefinition,
    status_schema: Option<&Value>,
) -> Value {
    if let Some(status) = template_status(resource, definition) {
        return status;
    }

    match status_schema {
        Some(schema) => match walk_status_schema(schema, resource) {
            Ok(status) if status.as_object().is_some_and(|s| !s.is_empty()) => status,
            Ok(_) => generic_status(),
            Err(e) => {
                warn!(
                    "Falling back to generic status for {}: {}",
                    definition.kind, e
                );
                generic_status()
            }
        },
        None => generic_status(),
    }
}

fn template_status(resource: &Value, definition: &ResourceDefinition) -> Option<Value> {
    match (definition.group.as_str(), definition.kind.as_str()) {
        ("", "Pod") => Some(pod_status(resource)),
        ("", "Service") => Some(service_status(resource)),
        ("", "Namespace") => Some(json!({"phase": "Active"})),
        ("apps", "Deployment") => Some(deployment_status(resource)),
        _ => None,
    }
}

/// `conditions: [Ready=True]`, used when nothing more specific applies
pub fn generic_status() -> Value {
    json!({ "conditions": ready_conditions() })
}

fn ready_conditions() -> Value {
    json!([{
        "type": "Ready",
        "status": "True",
        "reason": "ResourceReady",
        "message": "Resource is ready",
        "lastTransitionTime": now_timestamp(),
    }])
}

fn condition(condition_type: &str, reason: &str, message: &str, now: &str) -> Value {
    json!({
        "type": condition_type,
        "status": "True",
        "reason": reason,
        "message": message,
        "lastTransitionTime": now,
        "lastUpdateTime": now,
    })
}

fn pod_status(resource: &Value) -> Value {
    let now = now_timestamp();
    let pod_ip = fake_ip(10, 244);

    let container_statuses: Vec<Value> = resource
        .pointer("/spec/containers")
        .and_then(Value::as_array)
        .map(|containers| {
            containers
                .iter()
                .filter_map(|c| {
                    let name = c.get("name").and_then(Value::as_str)?;
                    let image = c.get("image").and_then(Value::as_str).unwrap_or_default();
                    Some(json!({
                        "name": name,
                        "image": image,
                        "imageID": "",
                        "containerID": format!("containerd://{}", new_uid().replace('-', "")),
                        "ready": true,
                        "started": true,
                        "restartCount": 0,
                        "state": {"running": {"startedAt": now}},
                    }))
                })
                .collect()
        })
        .unwrap_or_default();

    let conditions: Vec<Value> = ["Initialized", "Ready", "ContainersReady", "PodScheduled"]
        .iter()
        .map(|t| {
            json!({
                "type": t,
                "status": "True",
                "lastProbeTime": null,
                "lastTransitionTime": now,
            })
        })
        .collect();

    json!({
        "phase": "Running",
        "conditions": conditions,
        "hostIP": fake_ip(192, 168),
        "podIP": pod_ip,
        "podIPs": [{"ip": pod_ip}],
        "startTime": now,
        "qosClass": "BestEffort",
        "containerStatuses": container_statuses,
    })
}

fn deployment_status(resource: &Value) -> Value {
    let replicas = spec_replicas(resource);
    let now = now_timestamp();

    json!({
        "observedGeneration": observed_generation(resource),
        "replicas": replicas,
        "readyReplicas": replicas,
        "availableReplicas": replicas,
        "updatedReplicas": replicas,
        "conditions": [
            condition(
                "Available",
                "MinimumReplicasAvailable",
                "Deployment has minimum availability.",
                &now,
            ),
            condition(
                "Progressing",
                "NewReplicaSetAvailable",
                "ReplicaSet has successfully progressed.",
                &now,
            ),
        ],
    })
}

fn service_status(resource: &Value) -> Value {
    let is_load_balancer = resource
        .pointer("/spec/type")
        .and_then(Value::as_str)
        .is_some_and(|t| t == "LoadBalancer");

    if is_load_balancer {
        let octet = rand::rng().random_range(1..=254);
        json!({"loadBalancer": {"ingress": [{"ip": format!("203.0.113.{}", octet)}]}})
    } else {
        json!({"loadBalancer": {}})
    }
}

/// Services get a cluster IP in `spec` unless one was requested.
fn assign_cluster_ip(resource: &mut Value) {
    let Some(spec) = resource
        .as_object_mut()
        .map(|o| o.entry("spec").or_insert_with(|| json!({})))
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    if spec.get("clusterIP").is_some_and(|ip| !ip.is_null()) {
        return;
    }
    let ip = fake_ip(10, 96);
    spec.insert("clusterIP".to_string(), json!(ip));
    spec.insert("clusterIPs".to_string(), json!([ip]));
}

fn fake_ip(first: u8, second: u8) -> String {
    let mut rng = rand::rng();
    format!(
        "{}.{}.{}.{}",
        first,
        second,
        rng.random_range(0..=255u8),
        rng.random_range(1..=254u8)
    )
}

fn spec_replicas(resource: &Value) -> i64 {
    resource
        .pointer("/spec/replicas")
        .and_then(Value::as_i64)
        .unwrap_or(1)
}

fn observed_generation(resource: &Value) -> i64 {
    resource
        .pointer("/metadata/generation")
        .and_then(Value::as_i64)
        .unwrap_or(1)
}

/// Generate a status object from an OpenAPI schema.
///
/// The top-level schema must describe an object.
pub fn walk_status_schema(schema: &Value, resource: &Value) -> Result<Value> {
    let schema = schema
        .as_object()
        .ok_or_else(|| Error::InvalidRequest("status schema must be an object".to_string()))?;

    match schema_type(schema) {
        Some("object") => Ok(walk_object(schema, resource, 0)),
        other => Err(Error::InvalidRequest(format!(
            "status schema has type {:?}, expected object",
            other
        ))),
    }
}

fn schema_type(schema: &Map<String, Value>) -> Option<&str> {
    if let Some(t) = schema.get("type").and_then(Value::as_str) {
        return Some(t);
    }
    if schema.contains_key("properties") {
        Some("object")
    } else if schema.contains_key("x-kubernetes-int-or-string") {
        Some("string")
    } else {
        None
    }
}

fn walk_object(schema: &Map<String, Value>, resource: &Value, depth: usize) -> Value {
    let mut out = Map::new();
    if depth >= MAX_SCHEMA_DEPTH {
        return Value::Object(out);
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Value::Object(out);
    };
    for (name, property) in properties {
        let Some(property) = property.as_object() else {
            continue;
        };
        if let Some(value) = walk_field(name, property, resource, depth + 1) {
            out.insert(name.clone(), value);
        }
    }
    Value::Object(out)
}

fn walk_field(
    name: &str,
    schema: &Map<String, Value>,
    resource: &Value,
    depth: usize,
) -> Option<Value> {
    match schema_type(schema)? {
        "string" => Some(Value::String(string_value(name, schema))),
        "integer" | "number" => Some(json!(integer_value(name, resource))),
        "boolean" => Some(Value::Bool(POSITIVE_FLAGS.contains(name))),
        "array" => Some(array_value(name, resource)),
        "object" => Some(object_value(name, schema, resource, depth)),
        _ => None,
    }
}

fn string_value(name: &str, schema: &Map<String, Value>) -> String {
    if let Some(values) = schema.get("enum").and_then(Value::as_array) {
        if let Some(preferred) = preferred_enum_value(values) {
            return preferred.to_string();
        }
    }

    let is_timestamp = schema
        .get("format")
        .and_then(Value::as_str)
        .is_some_and(|f| f == "date-time")
        || name.ends_with("Time")
        || name.ends_with("Timestamp");
    if is_timestamp {
        return now_timestamp();
    }

    if name == "ip" || name.ends_with("IP") || name.ends_with("Ip") {
        return fake_ip(10, 0);
    }

    STRING_DEFAULTS
        .get(name)
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Highest-ranked string in an enum; the first listed wins ties.
fn preferred_enum_value(values: &[Value]) -> Option<&str> {
    let mut best: Option<(&str, i8)> = None;
    for value in values.iter().filter_map(Value::as_str) {
        let rank = ENUM_PREFERENCE.get(value).copied().unwrap_or(0);
        if best.is_none_or(|(_, best_rank)| rank > best_rank) {
            best = Some((value, rank));
        }
    }
    best.map(|(value, _)| value)
}

fn integer_value(name: &str, resource: &Value) -> i64 {
    if name == "observedGeneration" {
        observed_generation(resource)
    } else if name == "replicas" || name.ends_with("Replicas") {
        spec_replicas(resource)
    } else {
        0
    }
}

fn array_value(name: &str, resource: &Value) -> Value {
    if name == "conditions" {
        return ready_conditions();
    }
    // Arrays the spec also declares (accessModes, ...) are reported back as-is
    lookup_path(resource, &format!("spec.{}", name))
        .filter(|v| v.is_array())
        .cloned()
        .unwrap_or_else(|| json!([]))
}

fn object_value(
    name: &str,
    schema: &Map<String, Value>,
    resource: &Value,
    depth: usize,
) -> Value {
    if name == "capacity" {
        return resource
            .pointer("/spec/resources/requests")
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or_else(|| json!({}));
    }
    walk_object(schema, resource, depth)
}
