//! Part catalogs.
//!
//! A catalog entry is a table of purchasable parts for one module kind, or a
//! marker saying the kind brings its own footprint or has no part at all.
//! Entries ship embedded in the library and can be extended with JSON files
//! from a directory.

pub mod builtin;

pub use builtin::{builtin_catalog, load_catalog_file, load_catalog_from_directory};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::design::ModuleKind;
use crate::params::Parameter;

/// Priority given to entries loaded from a user directory. Lower runs first.
pub const USER_CATALOG_PRIORITY: i32 = 10;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Catalog entry {0} uses the catalog strategy but lists no options")]
    NoOptions(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogPart {
    pub lcsc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One orderable part with the parameter values it provides and how its
/// pins map onto the module's interfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickerOption {
    pub part: CatalogPart,
    #[serde(default)]
    pub params: BTreeMap<String, Parameter>,
    /// Pin number to interface path relative to the module.
    #[serde(default)]
    pub pinmap: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickStrategy {
    /// Choose one of the listed options.
    Catalog,
    /// The module defines its own footprint; nothing to buy.
    ManualFootprint,
    /// The module is purely logical; its children carry the parts.
    NoFootprint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub kind: ModuleKind,
    #[serde(default)]
    pub priority: i32,
    pub strategy: PickStrategy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<PickerOption>,
}

impl CatalogEntry {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.strategy == PickStrategy::Catalog && self.options.is_empty() {
            return Err(CatalogError::NoOptions(self.name.clone()));
        }
        Ok(())
    }
}

/// Entry as written in a catalog file, where the priority may be left out.
#[derive(Debug, Deserialize)]
pub(crate) struct FileEntry {
    name: String,
    kind: ModuleKind,
    #[serde(default)]
    priority: Option<i32>,
    strategy: PickStrategy,
    #[serde(default)]
    options: Vec<PickerOption>,
}

impl FileEntry {
    fn into_entry(self, default_priority: i32) -> CatalogEntry {
        CatalogEntry {
            name: self.name,
            kind: self.kind,
            priority: self.priority.unwrap_or(default_priority),
            strategy: self.strategy,
            options: self.options,
        }
    }
}

/// A catalog file holds one entry or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CatalogFile {
    One(FileEntry),
    Many(Vec<FileEntry>),
}

impl CatalogFile {
    /// Entries with `default_priority` filled in where the file gives none.
    pub(crate) fn into_entries(self, default_priority: i32) -> Vec<CatalogEntry> {
        let entries = match self {
            CatalogFile::One(entry) => vec![entry],
            CatalogFile::Many(entries) => entries,
        };
        entries.into_iter().map(|e| e.into_entry(default_priority)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_deserializes_with_defaults() {
        let json = r#"{
            "name": "my_resistors",
            "kind": "resistor",
            "strategy": "catalog",
            "options": [
                {"part": {"lcsc": "C1"}, "params": {"resistance": "10kohm"}}
            ]
        }"#;
        let entry: CatalogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.priority, 0);
        assert_eq!(entry.kind, ModuleKind::Resistor);
        assert_eq!(entry.options[0].params["resistance"], Parameter::lit("10k"));
        assert!(entry.options[0].pinmap.is_empty());
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_catalog_strategy_needs_options() {
        let entry = CatalogEntry {
            name: "empty".to_string(),
            kind: ModuleKind::Led,
            priority: 0,
            strategy: PickStrategy::Catalog,
            options: Vec::new(),
        };
        assert!(matches!(entry.validate(), Err(CatalogError::NoOptions(_))));
    }

    #[test]
    fn test_bad_parameter_literal_is_a_parse_error() {
        let json = r#"{"name": "x", "kind": "resistor", "strategy": "catalog",
            "options": [{"part": {"lcsc": "C1"}, "params": {"resistance": "ten"}}]}"#;
        assert!(serde_json::from_str::<CatalogEntry>(json).is_err());
    }
}
