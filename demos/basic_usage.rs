//! Basic CRUD against the fake dynamic client

use kube::api::ListParams;
use kube_fake_dynamic_client::{ClientBuilder, Error};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = ClientBuilder::new()
        .with_runtime_objects(vec![json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "api-server", "labels": {"app": "backend"}},
            "spec": {"containers": [{"name": "api", "image": "api:1.0"}]}
        })])
        .build()?;

    let pods = client.resources().get("Pod", "v1")?;

    let created = pods.create(
        &json!({
            "metadata": {"name": "nginx", "labels": {"app": "frontend", "env": "dev"}},
            "spec": {"containers": [{"name": "nginx", "image": "nginx:latest"}]}
        }),
        Some("default"),
    )?;
    println!(
        "Created pod {} (phase {}, rv {})",
        created.name().unwrap_or_default(),
        created.str_at("status.phase").unwrap_or_default(),
        created.resource_version().unwrap_or_default()
    );

    let all = pods.list(None, &ListParams::default())?;
    println!("\nPods: {}", all.items().len());
    for pod in all.items() {
        println!("  - {}", pod.name().unwrap_or_default());
    }

    let frontend = pods.list(None, &ListParams::default().labels("app=frontend"))?;
    println!("Frontend pods: {}", frontend.items().len());

    let patched = pods.patch(
        "nginx",
        &json!({"metadata": {"labels": {"env": "prod"}}}),
        Some("default"),
    )?;
    println!(
        "\nPatched labels: {:?} (generation {})",
        patched.labels(),
        patched.generation().unwrap_or_default()
    );

    let mut stale = patched.clone().into_value();
    stale["metadata"]["resourceVersion"] = json!(created.resource_version());
    match pods.replace("nginx", &stale, Some("default")) {
        Err(e @ Error::Conflict(_)) => println!("Stale replace rejected: {}", e),
        other => println!("Unexpected replace result: {:?}", other),
    }

    for event in pods.watch(Some("default"), &ListParams::default())? {
        println!("watch: {:?} {}", event.event_type, event.object.name().unwrap_or_default());
    }

    pods.delete("nginx", Some("default"))?;
    println!("\nDeleted nginx");

    let events = client.resources().get("Event", "v1")?;
    for event in events.list(None, &ListParams::default())?.items() {
        println!("event: {}", event.str_at("message").unwrap_or_default());
    }

    Ok(())
}
