//! Built-in and external part catalogs
//!
//! The application tables are embedded JSON compiled into the library.
//! Users can add their own tables by pointing the build at a directory of
//! JSON files; those entries get a higher priority number so the embedded
//! tables are tried first.

use std::path::Path;

use super::{CatalogEntry, CatalogError, CatalogFile, USER_CATALOG_PRIORITY};

const EMBEDDED_RESISTORS: &str = include_str!("../../catalog/resistors.json");
const EMBEDDED_RESISTOR_ARRAYS: &str = include_str!("../../catalog/resistor_arrays.json");
const EMBEDDED_CAPACITORS: &str = include_str!("../../catalog/capacitors.json");
const EMBEDDED_LEDS: &str = include_str!("../../catalog/leds.json");
const EMBEDDED_HEADERS: &str = include_str!("../../catalog/headers.json");
const EMBEDDED_DIODES: &str = include_str!("../../catalog/diodes.json");
const EMBEDDED_TVS: &str = include_str!("../../catalog/tvs.json");
const EMBEDDED_CRYSTALS: &str = include_str!("../../catalog/crystals.json");
const EMBEDDED_LDOS: &str = include_str!("../../catalog/ldos.json");
const EMBEDDED_EEPROMS: &str = include_str!("../../catalog/eeproms.json");
const EMBEDDED_BUFFERS: &str = include_str!("../../catalog/buffers.json");
const EMBEDDED_MCUS: &str = include_str!("../../catalog/mcus.json");
const EMBEDDED_MECHANICAL: &str = include_str!("../../catalog/mechanical.json");

/// Every embedded catalog entry.
pub fn builtin_catalog() -> Vec<CatalogEntry> {
    let embedded = [
        ("resistors.json", EMBEDDED_RESISTORS),
        ("resistor_arrays.json", EMBEDDED_RESISTOR_ARRAYS),
        ("capacitors.json", EMBEDDED_CAPACITORS),
        ("leds.json", EMBEDDED_LEDS),
        ("headers.json", EMBEDDED_HEADERS),
        ("diodes.json", EMBEDDED_DIODES),
        ("tvs.json", EMBEDDED_TVS),
        ("crystals.json", EMBEDDED_CRYSTALS),
        ("ldos.json", EMBEDDED_LDOS),
        ("eeproms.json", EMBEDDED_EEPROMS),
        ("buffers.json", EMBEDDED_BUFFERS),
        ("mcus.json", EMBEDDED_MCUS),
        ("mechanical.json", EMBEDDED_MECHANICAL),
    ];

    let mut entries = Vec::new();
    for (name, json) in embedded {
        match serde_json::from_str::<CatalogFile>(json) {
            Ok(file) => entries.extend(file.into_entries(0)),
            Err(e) => {
                tracing::warn!("Failed to parse embedded catalog {}: {}", name, e);
            }
        }
    }
    entries
}

/// Load catalog entries from a directory of JSON files.
/// Returns both successfully loaded entries and any errors encountered.
pub fn load_catalog_from_directory(dir: &Path) -> (Vec<CatalogEntry>, Vec<String>) {
    let mut entries = Vec::new();
    let mut errors = Vec::new();

    if !dir.is_dir() {
        errors.push(format!("Catalog directory {:?} does not exist", dir));
        return (entries, errors);
    }

    let read = match std::fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) => {
            errors.push(format!("Failed to read directory {:?}: {}", dir, e));
            return (entries, errors);
        }
    };

    let mut paths: Vec<_> = read
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
        .collect();
    paths.sort();

    for path in paths {
        match load_catalog_file(&path) {
            Ok(loaded) => {
                tracing::info!("Loaded {} catalog entries from {:?}", loaded.len(), path.file_name());
                entries.extend(loaded);
            }
            Err(e) => {
                let msg = e.to_string();
                tracing::warn!("{}", msg);
                errors.push(msg);
            }
        }
    }

    (entries, errors)
}

/// Load one catalog file. Entries that leave out the priority get the user
/// priority; an explicit value, 0 included, is kept.
pub fn load_catalog_file(path: &Path) -> Result<Vec<CatalogEntry>, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let file: CatalogFile = serde_json::from_str(&content).map_err(|source| CatalogError::Json {
        path: path.display().to_string(),
        source,
    })?;

    let entries = file.into_entries(USER_CATALOG_PRIORITY);
    for entry in &entries {
        entry.validate()?;
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PickStrategy;
    use crate::design::ModuleKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_catalog_parses_completely() {
        let entries = builtin_catalog();
        // One entry per embedded table plus four in the mechanical file.
        assert_eq!(entries.len(), 16);
        for entry in &entries {
            entry.validate().unwrap();
            assert_eq!(entry.priority, 0, "{} should have app priority", entry.name);
        }
    }

    #[test]
    fn test_builtin_covers_board_kinds() {
        let entries = builtin_catalog();
        let has = |kind: ModuleKind| entries.iter().any(|e| e.kind == kind);
        for kind in [
            ModuleKind::Resistor,
            ModuleKind::ResistorArray,
            ModuleKind::Capacitor,
            ModuleKind::Led,
            ModuleKind::Diode,
            ModuleKind::Tvs,
            ModuleKind::Crystal,
            ModuleKind::Ldo,
            ModuleKind::Eeprom,
            ModuleKind::Snx4lvc541a,
            ModuleKind::Cbm9002a,
            ModuleKind::SfpEdgeConnector,
            ModuleKind::MountingSlot,
            ModuleKind::Logo,
            ModuleKind::GenericBusProtection,
        ] {
            assert!(has(kind), "no catalog entry for {}", kind);
        }
    }

    #[test]
    fn test_mcu_pinmap_is_complete() {
        let entries = builtin_catalog();
        let mcu = entries.iter().find(|e| e.kind == ModuleKind::Cbm9002a).unwrap();
        assert_eq!(mcu.options[0].pinmap.len(), 57);
        assert_eq!(mcu.options[0].pinmap["8"], "usb.usb_if.d.p");
    }

    #[test]
    fn test_load_from_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("extra.json"),
            r#"{"name": "extra_leds", "kind": "led", "strategy": "catalog",
                "options": [{"part": {"lcsc": "C72043"},
                             "params": {"color": "white", "max_brightness": "500mcd",
                                        "forward_voltage": "3V", "max_current": "20mA"},
                             "pinmap": {"1": "cathode", "2": "anode"}}]}"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();

        let (entries, errors) = load_catalog_from_directory(dir.path());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].priority, USER_CATALOG_PRIORITY);
        assert_eq!(entries[0].strategy, PickStrategy::Catalog);
        assert_eq!(errors.len(), 1, "broken.json should be reported: {:?}", errors);
    }

    #[test]
    fn test_explicit_priority_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("caps.json");
        fs::write(
            &path,
            r#"[
                {"name": "app_level", "kind": "capacitor", "priority": 0, "strategy": "catalog",
                 "options": [{"part": {"lcsc": "C1525"}, "params": {"capacitance": "100nF"}}]},
                {"name": "preferred", "kind": "capacitor", "priority": -5, "strategy": "catalog",
                 "options": [{"part": {"lcsc": "C1525"}, "params": {"capacitance": "100nF"}}]},
                {"name": "unset", "kind": "capacitor", "strategy": "catalog",
                 "options": [{"part": {"lcsc": "C1525"}, "params": {"capacitance": "100nF"}}]}
            ]"#,
        )
        .unwrap();

        let entries = load_catalog_file(&path).unwrap();
        let priorities: Vec<(&str, i32)> = entries.iter().map(|e| (e.name.as_str(), e.priority)).collect();
        assert_eq!(
            priorities,
            vec![("app_level", 0), ("preferred", -5), ("unset", USER_CATALOG_PRIORITY)]
        );
    }

    #[test]
    fn test_missing_directory_is_reported() {
        let dir = TempDir::new().unwrap();
        let (entries, errors) = load_catalog_from_directory(&dir.path().join("nope"));
        assert!(entries.is_empty());
        assert_eq!(errors.len(), 1);
    }
}
