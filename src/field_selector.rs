//! Field selector support for filtering stored resources
//!
//! Any dotted path into the object may be selected on (`metadata.name`,
//! `spec.nodeName`, `status.phase`, `involvedObject.kind`, ...). Scalars are
//! compared by their string rendering, so `spec.hostNetwork=true` and
//! `status.replicas=3` work as they do against a real API server.

use crate::utils::lookup_path;
use crate::{Error, Result};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOperator {
    Equals,
    NotEquals,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRequirement {
    pub path: String,
    pub operator: FieldOperator,
    pub value: String,
}

impl FieldRequirement {
    pub fn matches(&self, object: &Value) -> bool {
        let actual = lookup_path(object, &self.path).and_then(render_scalar);
        match self.operator {
            FieldOperator::Equals => actual.as_deref() == Some(self.value.as_str()),
            FieldOperator::NotEquals => actual.as_deref() != Some(self.value.as_str()),
        }
    }
}

/// Parsed field selector; requirements are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector {
    requirements: Vec<FieldRequirement>,
}

impl FieldSelector {
    pub fn parse(selector: &str) -> Result<Self> {
        let requirements = selector
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(parse_requirement)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { requirements })
    }

    pub fn requirements(&self) -> &[FieldRequirement] {
        &self.requirements
    }

    pub fn matches(&self, object: &Value) -> bool {
        self.requirements.iter().all(|r| r.matches(object))
    }
}

fn parse_requirement(requirement: &str) -> Result<FieldRequirement> {
    let (path, operator, value) = if let Some((path, value)) = requirement.split_once("!=") {
        (path, FieldOperator::NotEquals, value)
    } else if let Some((path, value)) = requirement.split_once("==") {
        (path, FieldOperator::Equals, value)
    } else if let Some((path, value)) = requirement.split_once('=') {
        (path, FieldOperator::Equals, value)
    } else {
        return Err(Error::InvalidRequest(format!(
            "invalid field selector requirement {:?}: expected an operator",
            requirement
        )));
    };

    let path = path.trim();
    if path.is_empty() {
        return Err(Error::InvalidRequest(format!(
            "invalid field selector requirement {:?}: empty field path",
            requirement
        )));
    }

    Ok(FieldRequirement {
        path: path.to_string(),
        operator,
        value: value.trim().to_string(),
    })
}

fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Match an object against a field selector string
pub fn matches_field_selector(object: &Value, selector: &str) -> Result<bool> {
    Ok(FieldSelector::parse(selector)?.matches(object))
}
