//! Part pickers
//!
//! A picker offers purchasable parts for one module kind. Pickers are kept in
//! a [`PickerRegistry`], ordered by priority, and consumed by
//! [`pick_parts`], which searches the whole design for one consistent
//! assignment.

pub mod search;

pub use search::{pick_parts, PickOptions, PickRecord, PickReport, DEFAULT_MAX_STEPS};

use std::path::Path;
use thiserror::Error;

use crate::catalog::{builtin_catalog, load_catalog_from_directory, CatalogEntry, PickStrategy, PickerOption};
use crate::design::{DesignError, ModuleKind};
use crate::params::ParameterError;

#[derive(Debug, Error)]
pub enum PickError {
    #[error("No picker for {kind} module {path}")]
    NoPicker { path: String, kind: ModuleKind },

    #[error("No part satisfies {path} ({kind}): {params}")]
    NoSolution {
        path: String,
        kind: ModuleKind,
        params: String,
    },

    #[error("Gave up after {max_steps} candidate attempts (last at {path})")]
    BudgetExhausted { max_steps: usize, path: String },

    #[error(transparent)]
    Design(#[from] DesignError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

/// Source of candidate parts for one module kind
pub trait Picker: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ModuleKind;

    /// Lower values are tried first.
    fn priority(&self) -> i32 {
        0
    }

    fn strategy(&self) -> PickStrategy {
        PickStrategy::Catalog
    }

    /// Options in the order they should be tried.
    fn candidates(&self) -> &[PickerOption];
}

/// Picker backed by a catalog table.
#[derive(Debug, Clone)]
pub struct CatalogPicker {
    entry: CatalogEntry,
}

impl CatalogPicker {
    pub fn new(entry: CatalogEntry) -> Self {
        Self { entry }
    }

    pub fn entry(&self) -> &CatalogEntry {
        &self.entry
    }
}

impl Picker for CatalogPicker {
    fn name(&self) -> &str {
        &self.entry.name
    }

    fn kind(&self) -> ModuleKind {
        self.entry.kind
    }

    fn priority(&self) -> i32 {
        self.entry.priority
    }

    fn strategy(&self) -> PickStrategy {
        self.entry.strategy
    }

    fn candidates(&self) -> &[PickerOption] {
        &self.entry.options
    }
}

/// Registry of available pickers
pub struct PickerRegistry {
    pickers: Vec<Box<dyn Picker>>,
}

impl PickerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { pickers: Vec::new() }
    }

    /// Create a registry holding the embedded catalog
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_entries(builtin_catalog());
        registry
    }

    pub fn register(&mut self, picker: Box<dyn Picker>) {
        tracing::debug!(
            "Registered picker {} for {} at priority {}",
            picker.name(),
            picker.kind(),
            picker.priority()
        );
        self.pickers.push(picker);
    }

    pub fn register_entries(&mut self, entries: Vec<CatalogEntry>) {
        for entry in entries {
            self.register(Box::new(CatalogPicker::new(entry)));
        }
    }

    /// Add every catalog file found in `dir`. Returns the load errors.
    pub fn extend_from_directory(&mut self, dir: &Path) -> Vec<String> {
        let (entries, errors) = load_catalog_from_directory(dir);
        self.register_entries(entries);
        errors
    }

    /// Pickers for `kind`, lowest priority first. Ties keep registration order.
    pub fn pickers_for(&self, kind: ModuleKind) -> Vec<&dyn Picker> {
        let mut found: Vec<&dyn Picker> = self
            .pickers
            .iter()
            .filter(|p| p.kind() == kind)
            .map(|p| p.as_ref())
            .collect();
        found.sort_by_key(|p| p.priority());
        found
    }

    /// Strategy of the highest-priority picker for `kind`.
    pub fn strategy_for(&self, kind: ModuleKind) -> Option<PickStrategy> {
        self.pickers_for(kind).first().map(|p| p.strategy())
    }

    pub fn has_picker(&self, kind: ModuleKind) -> bool {
        self.pickers.iter().any(|p| p.kind() == kind)
    }

    /// All catalog options for `kind` in try order, with the picker name.
    pub fn candidates_for(&self, kind: ModuleKind) -> Vec<(&str, &PickerOption)> {
        self.pickers_for(kind)
            .into_iter()
            .filter(|p| p.strategy() == PickStrategy::Catalog)
            .flat_map(|p| p.candidates().iter().map(move |o| (p.name(), o)))
            .collect()
    }

    pub fn pickers(&self) -> impl Iterator<Item = &dyn Picker> {
        self.pickers.iter().map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.pickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pickers.is_empty()
    }
}

impl Default for PickerRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogPart;
    use crate::params::Parameter;
    use std::collections::BTreeMap;

    fn resistor_entry(name: &str, priority: i32, lcsc: &str, value: &str) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            kind: ModuleKind::Resistor,
            priority,
            strategy: PickStrategy::Catalog,
            options: vec![PickerOption {
                part: CatalogPart {
                    lcsc: lcsc.to_string(),
                    mpn: None,
                    footprint: None,
                    description: None,
                },
                params: BTreeMap::from([("resistance".to_string(), Parameter::lit(value))]),
                pinmap: BTreeMap::new(),
            }],
        }
    }

    #[test]
    fn test_candidates_follow_priority() {
        let mut registry = PickerRegistry::new();
        registry.register_entries(vec![
            resistor_entry("user", 10, "C2", "22ohm"),
            resistor_entry("app", 0, "C1", "10ohm"),
        ]);
        let candidates = registry.candidates_for(ModuleKind::Resistor);
        let names: Vec<&str> = candidates.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["app", "user"]);
        assert_eq!(registry.strategy_for(ModuleKind::Resistor), Some(PickStrategy::Catalog));
        assert_eq!(registry.strategy_for(ModuleKind::Led), None);
    }

    #[test]
    fn test_builtin_registry() {
        let registry = PickerRegistry::with_builtin();
        assert!(registry.has_picker(ModuleKind::Cbm9002a));
        assert_eq!(
            registry.strategy_for(ModuleKind::GenericBusProtection),
            Some(PickStrategy::NoFootprint)
        );
        assert_eq!(
            registry.strategy_for(ModuleKind::SfpEdgeConnector),
            Some(PickStrategy::ManualFootprint)
        );
        assert_eq!(registry.candidates_for(ModuleKind::Resistor).len(), 14);
        assert!(!registry.has_picker(ModuleKind::PoweredLed));
    }
}
