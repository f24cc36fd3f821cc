//! Label selector parsing and matching for filtering stored resources
//!
//! Selector strings are parsed into `kube::core::Selector` so matching follows
//! the same rules kube-rs applies on the client side.
//!
//! Supported syntax:
//! - Equality: `key=value` or `key==value`
//! - Inequality: `key!=value`
//! - Set-based: `key in (value1,value2)` or `key notin (value1,value2)`
//! - Existence: `key` or `!key`
//! - Requirements joined by commas are ANDed: `key1=value1,key2 in (v2,v3)`

use crate::{Error, Result};
use kube::core::{Expression, Selector, SelectorExt};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Split a selector string by commas, but not inside parentheses
fn split_preserving_parentheses(selector: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0;
    let mut depth = 0i32;

    for (i, ch) in selector.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                result.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if start < selector.len() {
        result.push(&selector[start..]);
    }

    result
}

fn invalid(requirement: &str, what: &str) -> Error {
    Error::InvalidRequest(format!(
        "invalid label selector requirement {:?}: {}",
        requirement, what
    ))
}

/// Parse `(a,b,c)` into a value set
fn parse_value_set(requirement: &str, rest: &str) -> Result<BTreeSet<String>> {
    let rest = rest.trim();
    let inner = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| invalid(requirement, "expected a parenthesized value list"))?;

    Ok(inner
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect())
}

fn parse_key(requirement: &str, key: &str) -> Result<String> {
    let key = key.trim();
    if key.is_empty() {
        return Err(invalid(requirement, "empty key"));
    }
    Ok(key.to_string())
}

fn parse_requirement(requirement: &str) -> Result<Expression> {
    if let Some((key, rest)) = requirement.split_once(" notin ") {
        let values = parse_value_set(requirement, rest)?;
        return Ok(Expression::NotIn(parse_key(requirement, key)?, values));
    }
    if let Some((key, rest)) = requirement.split_once(" in ") {
        let values = parse_value_set(requirement, rest)?;
        return Ok(Expression::In(parse_key(requirement, key)?, values));
    }
    if let Some(key) = requirement.strip_prefix('!') {
        if !key.contains('=') {
            return Ok(Expression::DoesNotExist(parse_key(requirement, key)?));
        }
    }

    // "!=" before "==" before "=" so the longer operators win
    for (op, negate) in [("!=", true), ("==", false), ("=", false)] {
        if let Some((key, value)) = requirement.split_once(op) {
            let key = parse_key(requirement, key)?;
            let value = value.trim().to_string();
            if value.contains('=') {
                return Err(invalid(requirement, "unexpected '=' in value"));
            }
            return Ok(if negate {
                Expression::NotEqual(key, value)
            } else {
                Expression::Equal(key, value)
            });
        }
    }

    Ok(Expression::Exists(parse_key(requirement, requirement)?))
}

/// Parse a Kubernetes label selector string into a Selector
///
/// An empty selector matches everything.
///
/// # Examples
///
/// ```
/// use kube_fake_dynamic_client::label_selector::parse_label_selector;
///
/// assert!(parse_label_selector("app=myapp").is_ok());
/// assert!(parse_label_selector("env in (production,staging)").is_ok());
/// assert!(parse_label_selector("env in production").is_err());
/// ```
pub fn parse_label_selector(selector: &str) -> Result<Selector> {
    let expressions = split_preserving_parentheses(selector)
        .into_iter()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(parse_requirement)
        .collect::<Result<Vec<_>>>()?;

    Ok(Selector::from_iter(expressions))
}

/// Match labels against a label selector string
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use kube_fake_dynamic_client::label_selector::matches_label_selector;
///
/// let labels = BTreeMap::from([
///     ("app".to_string(), "myapp".to_string()),
///     ("env".to_string(), "production".to_string()),
/// ]);
///
/// assert!(matches_label_selector(&labels, "app=myapp").unwrap());
/// assert!(matches_label_selector(&labels, "env!=staging").unwrap());
/// assert!(!matches_label_selector(&labels, "app=other").unwrap());
/// ```
pub fn matches_label_selector(labels: &BTreeMap<String, String>, selector: &str) -> Result<bool> {
    Ok(parse_label_selector(selector)?.matches(labels))
}

/// String-valued labels of a stored object; non-string values are ignored.
pub fn object_labels(object: &Value) -> BTreeMap<String, String> {
    object
        .get("metadata")
        .and_then(|m| m.get("labels"))
        .and_then(Value::as_object)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
