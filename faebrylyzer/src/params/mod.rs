//! Parameter constraints and their propagation.
//!
//! Every electrical parameter in a design (a resistance, a rail voltage, an
//! LED colour) lives in a [`ParamStore`] as a [`Parameter`]: `Tbd`, `Any`, a
//! constant, a range or a set. Constraints only ever narrow a parameter.
//! Parameters can be aliased so that two interfaces share one value, and
//! derivation rules compute constraints from other parameters once those are
//! concrete.

pub mod derive;
pub mod store;
pub mod value;

pub use derive::{Derivation, DerivationRule};
pub use store::{Checkpoint, ParamId, ParamStore};
pub use value::{Dielectric, LedColor, Parameter, Value};

use thiserror::Error;

use crate::units::UnitError;

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("Conflicting constraints on {label}: {left} vs {right}")]
    Conflict {
        label: String,
        left: Parameter,
        right: Parameter,
    },
    #[error("Invalid parameter literal: {0}")]
    Parse(String),
    #[error(transparent)]
    Unit(#[from] UnitError),
    #[error("Derivation {rule} on {label} expects {expected} inputs, got {got}")]
    Arity {
        rule: &'static str,
        label: String,
        expected: usize,
        got: usize,
    },
}

impl ParameterError {
    /// Attach the name of the parameter a conflict happened on.
    pub fn with_label(self, name: &str) -> Self {
        match self {
            ParameterError::Conflict { left, right, .. } => ParameterError::Conflict {
                label: name.to_string(),
                left,
                right,
            },
            other => other,
        }
    }
}
