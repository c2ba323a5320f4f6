use serde::{Deserialize, Serialize};

pub const MANIFEST_VERSION: &str = "1.0";

/// Table of contents of a layer package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageManifest {
    pub version: String,
    pub crs: String,
    #[serde(default)]
    pub layers: Vec<LayerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerEntry {
    pub name: String,
    /// Relative to the package root.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_kind: Option<String>,
    #[serde(default)]
    pub feature_count: usize,
    /// blake3 of the layer file bytes, hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl PackageManifest {
    pub fn new(crs: impl Into<String>) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            crs: crs.into(),
            layers: Vec::new(),
        }
    }

    pub fn entry(&self, name: &str) -> Option<&LayerEntry> {
        self.layers.iter().find(|e| e.name == name)
    }

    /// Replace an entry with the same name in place, or append.
    pub fn upsert(&mut self, entry: LayerEntry) {
        match self.layers.iter_mut().find(|e| e.name == entry.name) {
            Some(slot) => *slot = entry,
            None => self.layers.push(entry),
        }
    }
}
