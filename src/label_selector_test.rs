//! Tests for label selector parsing and matching

use super::label_selector::{matches_label_selector, object_labels, parse_label_selector};
use serde_json::json;
use std::collections::BTreeMap;

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_empty_selector() {
    let labels = labels(&[("app", "test")]);
    assert!(matches_label_selector(&labels, "").unwrap());
    assert!(matches_label_selector(&labels, "   ").unwrap());
}

#[test]
fn test_equality_selector() {
    let labels = labels(&[("app", "myapp"), ("env", "production")]);

    assert!(matches_label_selector(&labels, "app=myapp").unwrap());
    assert!(matches_label_selector(&labels, "app==myapp").unwrap());
    assert!(matches_label_selector(&labels, " app = myapp ").unwrap());
    assert!(!matches_label_selector(&labels, "app=other").unwrap());
}

#[test]
fn test_inequality_selector() {
    let labels = labels(&[("env", "production")]);

    assert!(matches_label_selector(&labels, "env!=staging").unwrap());
    assert!(!matches_label_selector(&labels, "env!=production").unwrap());
    // A missing key satisfies inequality
    assert!(matches_label_selector(&labels, "tier!=frontend").unwrap());
}

#[test]
fn test_set_selectors() {
    let labels = labels(&[("env", "production")]);

    assert!(matches_label_selector(&labels, "env in (production,staging)").unwrap());
    assert!(!matches_label_selector(&labels, "env in (development,testing)").unwrap());
    assert!(matches_label_selector(&labels, "env notin (development,testing)").unwrap());
    assert!(!matches_label_selector(&labels, "env notin (production, staging)").unwrap());
}

#[test]
fn test_existence_selectors() {
    let labels = labels(&[("app", "myapp")]);

    assert!(matches_label_selector(&labels, "app").unwrap());
    assert!(!matches_label_selector(&labels, "env").unwrap());
    assert!(matches_label_selector(&labels, "!env").unwrap());
    assert!(!matches_label_selector(&labels, "!app").unwrap());
}

#[test]
fn test_combined_selectors_are_anded() {
    let labels = labels(&[("app", "myapp"), ("tier", "frontend")]);

    assert!(matches_label_selector(&labels, "app=myapp,tier=frontend").unwrap());
    assert!(matches_label_selector(&labels, "app,tier!=backend").unwrap());
    assert!(matches_label_selector(&labels, "app=myapp,tier notin (backend,middleware)").unwrap());
    assert!(!matches_label_selector(&labels, "app=myapp,tier=backend").unwrap());
}

#[test]
fn test_no_labels() {
    let labels = BTreeMap::new();

    assert!(matches_label_selector(&labels, "!app").unwrap());
    assert!(!matches_label_selector(&labels, "app").unwrap());
    assert!(!matches_label_selector(&labels, "app=myapp").unwrap());
}

#[test]
fn test_parse_label_selector_invalid() {
    assert!(parse_label_selector("env in prod").is_err());
    assert!(parse_label_selector("env in (prod").is_err());
    assert!(parse_label_selector("env notin prod)").is_err());
    assert!(parse_label_selector("=value").is_err());
    assert!(matches!(
        parse_label_selector("a=b=c"),
        Err(crate::Error::InvalidRequest(_))
    ));
}

#[test]
fn test_object_labels_ignores_non_strings() {
    let obj = json!({
        "metadata": {"labels": {"app": "web", "replicas": 3}}
    });
    let labels = object_labels(&obj);

    assert_eq!(labels.len(), 1);
    assert_eq!(labels.get("app").map(String::as_str), Some("web"));
    assert!(object_labels(&json!({"metadata": {}})).is_empty());
}
