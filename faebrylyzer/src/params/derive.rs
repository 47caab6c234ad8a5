//! Rules that compute one parameter's constraint from others.

use serde::Serialize;

use super::{ParamId, Parameter, ParameterError};
use crate::units::{Quantity, Unit};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum DerivationRule {
    /// Output must be at least the input's upper bound times `margin`.
    /// Used for component ratings that must cover the rail they sit on.
    AtLeast { margin: f64 },
    /// Series resistor for an LED.
    ///
    /// Inputs: supply voltage, forward voltage, wanted brightness, the LED's
    /// brightness at max current, max current.
    LedSeriesResistance,
}

impl DerivationRule {
    pub fn name(&self) -> &'static str {
        match self {
            DerivationRule::AtLeast { .. } => "at_least",
            DerivationRule::LedSeriesResistance => "led_series_resistance",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            DerivationRule::AtLeast { .. } => 1,
            DerivationRule::LedSeriesResistance => 5,
        }
    }

    /// `Ok(None)` while some input is not concrete yet.
    pub fn evaluate(&self, inputs: &[&Parameter]) -> Result<Option<Parameter>, ParameterError> {
        if inputs.iter().any(|p| !p.is_concrete()) {
            return Ok(None);
        }
        let intervals: Option<Vec<(Quantity, Quantity)>> = inputs.iter().map(|p| p.as_interval()).collect();
        let Some(intervals) = intervals else {
            return Ok(None);
        };

        match self {
            DerivationRule::AtLeast { margin } => {
                let (_, hi) = intervals[0];
                Ok(Some(Parameter::at_least(hi.scaled(*margin))))
            }
            DerivationRule::LedSeriesResistance => led_series_resistance(&intervals).map(Some),
        }
    }
}

fn led_series_resistance(intervals: &[(Quantity, Quantity)]) -> Result<Parameter, ParameterError> {
    let (supply, forward, brightness, max_brightness, max_current) = (
        intervals[0],
        intervals[1],
        intervals[2],
        intervals[3],
        intervals[4],
    );
    let expect = |q: &Quantity, unit: Unit| q.same_unit(&Quantity::new(0.0, unit));
    expect(&supply.0, Unit::Volt)?;
    expect(&forward.0, Unit::Volt)?;
    expect(&brightness.0, Unit::Candela)?;
    expect(&max_brightness.0, Unit::Candela)?;
    expect(&max_current.0, Unit::Ampere)?;

    let unreachable = || ParameterError::Conflict {
        label: String::new(),
        left: Parameter::range(supply.0, supply.1),
        right: Parameter::range(forward.0, forward.1),
    };

    // Worst-case headroom over the resistor.
    let headroom_lo = supply.0.value - forward.1.value;
    let headroom_hi = supply.1.value - forward.0.value;
    if headroom_lo <= 0.0 || max_brightness.0.value <= 0.0 {
        return Err(unreachable());
    }

    let current_lo = brightness.0.value / max_brightness.1.value * max_current.0.value;
    let current_hi = (brightness.1.value / max_brightness.0.value * max_current.1.value)
        .min(max_current.1.value);
    if current_lo <= 0.0 || current_hi < current_lo {
        return Err(unreachable());
    }

    Ok(Parameter::range(
        Quantity::ohms(headroom_lo / current_hi),
        Quantity::ohms(headroom_hi / current_lo),
    )
    .most_narrow())
}

/// A registered rule with its wiring.
#[derive(Debug, Clone, Serialize)]
pub struct Derivation {
    pub rule: DerivationRule,
    pub inputs: Vec<ParamId>,
    pub output: ParamId,
}
