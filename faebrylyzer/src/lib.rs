//! faebrylyzer - USB logic analyzer probe board
//!
//! The board is described in code as a hierarchy of modules and interfaces.
//! Component parameters (resistance, voltage, LED color...) start undecided
//! and are narrowed by the board definition, by derivations between them and
//! finally by picking real catalog parts that satisfy every constraint.
//!
//! # Quick Start
//!
//! ```no_run
//! use faebrylyzer::{BuildOptions, FaebrylyzerCore};
//!
//! let result = FaebrylyzerCore::build(&BuildOptions::default()).unwrap();
//! for pick in &result.picks.picks {
//!     println!("{} -> {}", pick.path, pick.lcsc);
//! }
//! ```
//!
//! # Features
//!
//! - **Parameters**: unit-aware ranges, aliasing and rollback
//! - **Design graph**: typed interfaces, hierarchical connect, net inference
//! - **Part picking**: backtracking search over JSON catalogs
//! - **Export**: S-expression netlist, parameter report, JSON build report

pub mod board;
pub mod catalog;
pub mod checks;
pub mod core;
pub mod design;
pub mod export;
pub mod library;
pub mod params;
pub mod picker;
pub mod units;

// Re-export main types
pub use board::{make_design, LogicAnalyzerBoard, ProbeModule};
pub use catalog::{CatalogEntry, CatalogError, PickStrategy};
pub use checks::{Issue, RulesEngine, Severity};
pub use core::{BuildOptions, BuildResult, BuildStats, FaebrylyzerCore, FaebrylyzerError};
pub use design::{Design, DesignError, ModuleKind, NetList};
pub use params::{Parameter, ParameterError};
pub use picker::{pick_parts, PickError, PickOptions, PickReport, PickerRegistry};
pub use units::{Quantity, Unit};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        BuildOptions, BuildResult, Design, FaebrylyzerCore, FaebrylyzerError, Issue, ModuleKind, Parameter,
        PickerRegistry, Quantity, Severity,
    };
}
