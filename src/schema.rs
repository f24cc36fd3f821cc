//! Schema-mapping data sources and the registry's schema cache
//!
//! A schema mapping is a JSON (or YAML) object keyed by the lowercased Kind
//! name; each value is a list of OpenAPI-style entries:
//!
//! ```json
//! {
//!   "pod": [{
//!     "x-kubernetes-group-version-kind": [{"group": "", "version": "v1", "kind": "Pod"}],
//!     "namespaced": true,
//!     "properties": {"status": {"type": "object", "properties": {}}}
//!   }]
//! }
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

const BUILTIN_RESOURCES: &str = include_str!("data/builtin_resources.json");

/// One `(group, version, kind)` triple from `x-kubernetes-group-version-kind`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupVersionKindRef {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

/// Typed view of one schema-mapping entry
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaEntry {
    #[serde(rename = "x-kubernetes-group-version-kind", default)]
    pub group_version_kinds: Vec<GroupVersionKindRef>,
    /// Deliberately not defaulted: entries without it are skipped.
    #[serde(default)]
    pub namespaced: Option<bool>,
    #[serde(default)]
    pub plural: Option<String>,
    #[serde(default)]
    pub singular: Option<String>,
    #[serde(rename = "shortNames", default)]
    pub short_names: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub properties: Option<serde_json::Map<String, Value>>,
}

impl SchemaEntry {
    /// The OpenAPI schema of the `status` property, if declared
    pub fn status_schema(&self) -> Option<&Value> {
        self.properties.as_ref().and_then(|p| p.get("status"))
    }
}

/// Parsed mapping: lowercased kind -> entries, in source order
#[derive(Debug, Clone, Default)]
pub struct SchemaMapping {
    entries: BTreeMap<String, Vec<SchemaEntry>>,
}

impl SchemaMapping {
    /// Parse a mapping document. Malformed entries are skipped with a warning
    /// so one bad entry does not hide the rest of the catalog.
    pub fn from_value(value: &Value) -> Result<Self> {
        let kinds = value.as_object().ok_or_else(|| {
            Error::InvalidRequest("schema mapping must be an object keyed by kind".to_string())
        })?;

        let mut entries: BTreeMap<String, Vec<SchemaEntry>> = BTreeMap::new();
        for (kind, raw_entries) in kinds {
            let Some(raw_entries) = raw_entries.as_array() else {
                warn!("Skipping schema mapping for {}: expected a list of entries", kind);
                continue;
            };
            for raw in raw_entries {
                match SchemaEntry::deserialize(raw) {
                    Ok(entry) => entries
                        .entry(kind.to_ascii_lowercase())
                        .or_default()
                        .push(entry),
                    Err(e) => warn!("Skipping malformed schema entry for {}: {}", kind, e),
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn builtin() -> Result<Self> {
        let value: Value = serde_json::from_str(BUILTIN_RESOURCES)?;
        Self::from_value(&value)
    }

    pub fn entries(&self, kind: &str) -> &[SchemaEntry] {
        self.entries
            .get(&kind.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<SchemaEntry>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append `other`'s entries after this mapping's entries
    pub fn extend(&mut self, other: SchemaMapping) {
        for (kind, entries) in other.entries {
            self.entries.entry(kind).or_default().extend(entries);
        }
    }
}

/// Where the registry's schema mapping comes from
#[derive(Debug, Clone, Default)]
pub enum SchemaSource {
    /// No mapping; every lookup relies on registration or fallback rules
    #[default]
    Empty,
    /// The catalog bundled with the crate
    Builtin,
    Inline(Value),
    /// JSON or YAML file; a missing file is treated as an empty mapping
    File(PathBuf),
    /// Several sources; later entries override earlier ones per
    /// `(kind, group_version)`
    Layered(Vec<SchemaSource>),
}

impl SchemaSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn load(&self) -> Result<SchemaMapping> {
        match self {
            Self::Empty => Ok(SchemaMapping::default()),
            Self::Builtin => SchemaMapping::builtin(),
            Self::Inline(value) => SchemaMapping::from_value(value),
            Self::File(path) => load_file(path),
            Self::Layered(sources) => {
                let mut mapping = SchemaMapping::default();
                for source in sources {
                    mapping.extend(source.load()?);
                }
                Ok(mapping)
            }
        }
    }
}

fn load_file(path: &Path) -> Result<SchemaMapping> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Schema mapping {:?} not found, using an empty mapping", path);
            return Ok(SchemaMapping::default());
        }
        Err(e) => {
            return Err(Error::Internal(format!(
                "Failed to read schema mapping {:?}: {}",
                path, e
            )))
        }
    };

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let value: Value = if is_json {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };

    let mapping = SchemaMapping::from_value(&value)?;
    debug!("Loaded {} kinds from {:?}", mapping.len(), path);
    Ok(mapping)
}

/// Load-once cache over a [`SchemaSource`], owned by one registry.
///
/// `clear` forgets the loaded mapping; the next `load` reads the source again.
#[derive(Debug)]
pub struct SchemaCache {
    source: SchemaSource,
    mapping: RwLock<Option<Arc<SchemaMapping>>>,
}

impl SchemaCache {
    pub fn new(source: SchemaSource) -> Self {
        Self {
            source,
            mapping: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &SchemaSource {
        &self.source
    }

    pub fn load(&self) -> Result<Arc<SchemaMapping>> {
        if let Some(mapping) = self
            .mapping
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(mapping));
        }

        let mapping = Arc::new(self.source.load()?);
        *self.mapping.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&mapping));
        Ok(mapping)
    }

    pub fn is_loaded(&self) -> bool {
        self.mapping
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn clear(&self) {
        *self.mapping.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
