//! Using custom resources (CRDs)
//!
//! Registers a kube-derive custom resource with the fake client, creates
//! instances through the dynamic API and reads them back as typed values.

use kube::api::{ListParams, Patch};
use kube::{CustomResource, ResourceExt};
use kube_fake_dynamic_client::ClientBuilder;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "example.com",
    version = "v1",
    kind = "MyApp",
    namespaced,
    status = "MyAppStatus"
)]
pub struct MyAppSpec {
    pub replicas: i32,
    pub image: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct MyAppStatus {
    pub ready: bool,
    pub available_replicas: i32,
    pub observed_generation: i64,
}

fn create_app(name: &str, replicas: i32, image: &str) -> MyApp {
    MyApp::new(
        name,
        MyAppSpec {
            replicas,
            image: image.to_string(),
        },
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Register the custom resource type (like installing a CRD in a real cluster)
    let client = ClientBuilder::new()
        .with_custom_resource::<MyApp>()
        .with_object(create_app("app1", 3, "nginx:latest"))
        .build()?;

    let apps = client.resources().get_for::<MyApp>()?;
    println!("Resolved {} as {}", apps.kind(), apps.plural());

    apps.create(
        &serde_json::to_value(create_app("app2", 5, "redis:latest"))?,
        Some("default"),
    )?;

    for item in apps.list(Some("default"), &ListParams::default())?.items() {
        let app: MyApp = item.try_parse()?;
        let status = app.status.clone().unwrap_or_default();
        println!(
            "  {} - replicas: {}, image: {}, ready: {}",
            app.name_any(),
            app.spec.replicas,
            app.spec.image,
            status.ready
        );
    }

    let scaled = apps.patch_with(
        "app2",
        &Patch::Merge(json!({"spec": {"replicas": 1}})),
        Some("default"),
    )?;
    let scaled: MyApp = scaled.try_parse()?;
    println!(
        "\nScaled {} to {} replicas (generation {:?})",
        scaled.name_any(),
        scaled.spec.replicas,
        scaled.metadata.generation
    );

    let deleted = apps.delete("app1", Some("default"))?;
    println!("Deleted {}", deleted.name().unwrap_or_default());

    Ok(())
}
