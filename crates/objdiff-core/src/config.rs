use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use objdiff_types::{simple_type_name, ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::{DiffError, DiffResult};
use crate::render::PropertyFilter;
use crate::replay::ReplayMode;

/// Property names worth showing per object type.
///
/// Keys are either full type tags (`"db.Table"`) or simple type names
/// (`"Table"`). An empty table marks every property as interesting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterestingProperties(BTreeMap<String, BTreeSet<String>>);

impl InterestingProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `properties` to the interesting set of `type_key`.
    pub fn with_type<I, S>(mut self, type_key: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(type_key.into())
            .or_default()
            .extend(properties.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PropertyFilter for InterestingProperties {
    fn is_interesting(&self, type_tag: &str, property: &str) -> bool {
        if self.0.is_empty() {
            return true;
        }
        [type_tag, simple_type_name(type_tag)]
            .iter()
            .filter_map(|key| self.0.get(*key))
            .any(|names| names.contains(property))
    }
}

/// Settings for computing, displaying and replaying diffs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Default root object for display trees.
    pub root_id: Option<ObjectId>,
    /// How property changes are replayed.
    pub replay_mode: ReplayMode,
    /// Properties shown next to modified objects.
    pub interesting_properties: InterestingProperties,
}

impl DiffConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> DiffResult<Self> {
        toml::from_str(text).map_err(|e| DiffError::Config(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> DiffResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DiffError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}
