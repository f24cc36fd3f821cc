//! Resource registry inspector for kube-fake-dynamic-client
//!
//! Loads a schema mapping the same way the fake client does and prints the
//! resource definitions it resolves to, as JSON.
//!
//! # Usage
//!
//! Dump the bundled catalog:
//! ```bash
//! cargo run --bin registry-dump
//! ```
//!
//! Dump a mapping file layered over the catalog, filtered to one group:
//! ```bash
//! cargo run --bin registry-dump -- --schema mapping.yaml --group gadgets.example.com
//! ```
//!
//! Check what an unmapped kind would resolve to:
//! ```bash
//! cargo run --bin registry-dump -- --no-builtin --fallback-group example.com=true \
//!     --resolve Widget --api-version example.com/v1
//! ```

use clap::Parser;
use kube_fake_dynamic_client::{FallbackScopes, ResourceRegistry, SchemaSource};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "registry-dump")]
#[command(about = "Print the resource definitions a fake client resolves", long_about = None)]
struct Args {
    /// Schema-mapping files (JSON or YAML), layered in order
    #[arg(short, long)]
    schema: Vec<PathBuf>,

    /// Skip the bundled resource catalog
    #[arg(long)]
    no_builtin: bool,

    /// Fallback scope for an API group, as GROUP=true|false
    #[arg(long, value_parser = parse_scope)]
    fallback_group: Vec<(String, bool)>,

    /// Fallback scope for a kind, as KIND=true|false
    #[arg(long, value_parser = parse_scope)]
    fallback_kind: Vec<(String, bool)>,

    /// Only list definitions of this kind
    #[arg(short, long)]
    kind: Option<String>,

    /// Only list definitions in this API group ("" for core)
    #[arg(short, long)]
    group: Option<String>,

    /// Resolve a single kind (with --api-version) instead of listing
    #[arg(long, requires = "api_version")]
    resolve: Option<String>,

    #[arg(long)]
    api_version: Option<String>,

    /// Include each definition's status schema
    #[arg(long)]
    with_status_schema: bool,
}

fn parse_scope(raw: &str) -> Result<(String, bool), String> {
    let (name, namespaced) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=true|false, got {:?}", raw))?;
    let namespaced = namespaced
        .parse::<bool>()
        .map_err(|e| format!("invalid scope for {}: {}", name, e))?;
    Ok((name.to_string(), namespaced))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut sources = Vec::new();
    if !args.no_builtin {
        sources.push(SchemaSource::Builtin);
    }
    sources.extend(args.schema.iter().cloned().map(SchemaSource::File));

    let mut fallback = FallbackScopes::new();
    for (group, namespaced) in args.fallback_group {
        fallback = fallback.with_group(group, namespaced);
    }
    for (kind, namespaced) in args.fallback_kind {
        fallback = fallback.with_kind(kind, namespaced);
    }

    let registry = ResourceRegistry::new(SchemaSource::Layered(sources), fallback)?;

    let definitions = match (&args.resolve, &args.api_version) {
        (Some(kind), Some(api_version)) => vec![registry.get_definition(kind, api_version)?],
        _ => registry.search(
            args.kind.as_deref(),
            args.group.as_deref(),
            args.api_version.as_deref(),
        ),
    };

    let output: Vec<serde_json::Value> = definitions
        .iter()
        .map(|definition| {
            let mut value = serde_json::to_value(definition)?;
            value["apiVersion"] = serde_json::json!(definition.api_version());
            if args.with_status_schema {
                if let Some(schema) = registry.status_schema(definition) {
                    value["statusSchema"] = schema;
                }
            }
            Ok(value)
        })
        .collect::<Result<_, serde_json::Error>>()?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    eprintln!("{} definitions", output.len());
    Ok(())
}
