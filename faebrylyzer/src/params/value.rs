//! Parameter values and the narrowing algebra over them.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::ParameterError;
use crate::units::Quantity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedColor {
    Red,
    Green,
    Blue,
    Yellow,
    Orange,
    White,
    WarmWhite,
}

impl LedColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedColor::Red => "red",
            LedColor::Green => "green",
            LedColor::Blue => "blue",
            LedColor::Yellow => "yellow",
            LedColor::Orange => "orange",
            LedColor::White => "white",
            LedColor::WarmWhite => "warm_white",
        }
    }
}

impl FromStr for LedColor {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").replace(' ', "_").as_str() {
            "red" => Ok(LedColor::Red),
            "green" => Ok(LedColor::Green),
            "blue" => Ok(LedColor::Blue),
            "yellow" => Ok(LedColor::Yellow),
            "orange" => Ok(LedColor::Orange),
            "white" => Ok(LedColor::White),
            "warm_white" => Ok(LedColor::WarmWhite),
            _ => Err(ParameterError::Parse(s.to_string())),
        }
    }
}

/// Ceramic capacitor temperature coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dielectric {
    C0g,
    X7r,
    X5r,
    Y5v,
    Z5u,
}

impl Dielectric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dielectric::C0g => "C0G",
            Dielectric::X7r => "X7R",
            Dielectric::X5r => "X5R",
            Dielectric::Y5v => "Y5V",
            Dielectric::Z5u => "Z5U",
        }
    }
}

impl FromStr for Dielectric {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "C0G" | "NP0" => Ok(Dielectric::C0g),
            "X7R" => Ok(Dielectric::X7r),
            "X5R" => Ok(Dielectric::X5r),
            "Y5V" => Ok(Dielectric::Y5v),
            "Z5U" => Ok(Dielectric::Z5u),
            _ => Err(ParameterError::Parse(s.to_string())),
        }
    }
}

/// A single admissible value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Quantity(Quantity),
    Color(LedColor),
    Dielectric(Dielectric),
}

impl Value {
    pub fn as_quantity(&self) -> Option<&Quantity> {
        match self {
            Value::Quantity(q) => Some(q),
            _ => None,
        }
    }
}

impl From<Quantity> for Value {
    fn from(q: Quantity) -> Self {
        Value::Quantity(q)
    }
}

impl From<LedColor> for Value {
    fn from(c: LedColor) -> Self {
        Value::Color(c)
    }
}

impl From<Dielectric> for Value {
    fn from(d: Dielectric) -> Self {
        Value::Dielectric(d)
    }
}

impl FromStr for Value {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(q) = s.parse::<Quantity>() {
            return Ok(Value::Quantity(q));
        }
        if let Ok(c) = s.parse::<LedColor>() {
            return Ok(Value::Color(c));
        }
        if let Ok(d) = s.parse::<Dielectric>() {
            return Ok(Value::Dielectric(d));
        }
        Err(ParameterError::Parse(s.to_string()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Quantity(q) => write!(f, "{}", q),
            Value::Color(c) => write!(f, "{}", c.as_str()),
            Value::Dielectric(d) => write!(f, "{}", d.as_str()),
        }
    }
}

/// The constraint currently known about a parameter.
///
/// `Tbd` means nobody has said anything yet; `Any` means the design
/// explicitly does not care. Both admit every value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Parameter {
    #[default]
    Tbd,
    Any,
    Constant(Value),
    Range { min: Quantity, max: Quantity },
    Set(Vec<Value>),
}

impl Parameter {
    pub fn constant(value: impl Into<Value>) -> Self {
        Parameter::Constant(value.into())
    }

    /// Closed interval; panics if the bounds have different units.
    pub fn range(min: Quantity, max: Quantity) -> Self {
        assert_eq!(min.unit, max.unit, "range bounds must share a unit");
        Parameter::Range { min, max }
    }

    /// `[min, +inf)`.
    pub fn at_least(min: Quantity) -> Self {
        Parameter::Range {
            min,
            max: Quantity::new(f64::INFINITY, min.unit),
        }
    }

    /// Parse a literal, panicking on malformed input. Source-code literals only.
    pub fn lit(s: &str) -> Self {
        match s.parse() {
            Ok(p) => p,
            Err(e) => panic!("invalid parameter literal {:?}: {}", s, e),
        }
    }

    pub fn is_tbd(&self) -> bool {
        matches!(self, Parameter::Tbd)
    }

    pub fn is_unconstrained(&self) -> bool {
        matches!(self, Parameter::Tbd | Parameter::Any)
    }

    /// Constant or bounded range: something a derivation can compute with.
    pub fn is_concrete(&self) -> bool {
        match self {
            Parameter::Constant(_) => true,
            Parameter::Range { min, max } => min.value.is_finite() && max.value.is_finite(),
            Parameter::Set(values) => !values.is_empty(),
            _ => false,
        }
    }

    /// Numeric hull of the admitted values, if they are all quantities.
    pub fn as_interval(&self) -> Option<(Quantity, Quantity)> {
        match self {
            Parameter::Constant(Value::Quantity(q)) => Some((*q, *q)),
            Parameter::Range { min, max } => Some((*min, *max)),
            Parameter::Set(values) => {
                let quantities: Vec<&Quantity> = values.iter().filter_map(|v| v.as_quantity()).collect();
                if quantities.len() != values.len() || quantities.is_empty() {
                    return None;
                }
                let unit = quantities[0].unit;
                if quantities.iter().any(|q| q.unit != unit) {
                    return None;
                }
                let lo = quantities.iter().map(|q| q.value).fold(f64::INFINITY, f64::min);
                let hi = quantities.iter().map(|q| q.value).fold(f64::NEG_INFINITY, f64::max);
                Some((Quantity::new(lo, unit), Quantity::new(hi, unit)))
            }
            _ => None,
        }
    }

    /// Whether a single value is admitted.
    pub fn contains(&self, value: &Value) -> bool {
        match self {
            Parameter::Tbd | Parameter::Any => true,
            Parameter::Constant(c) => c == value,
            Parameter::Range { min, max } => match value {
                Value::Quantity(q) => in_range(q, min, max),
                _ => false,
            },
            Parameter::Set(values) => values.iter().any(|v| v == value),
        }
    }

    /// Whether every value admitted by `self` is admitted by `other`.
    pub fn is_subset_of(&self, other: &Parameter) -> bool {
        if other.is_unconstrained() {
            return true;
        }
        match self {
            Parameter::Tbd | Parameter::Any => false,
            Parameter::Constant(v) => other.contains(v),
            Parameter::Set(values) => values.iter().all(|v| other.contains(v)),
            Parameter::Range { min, max } => match other {
                Parameter::Range { min: omin, max: omax } => {
                    in_range(min, omin, omax) && in_range(max, omin, omax)
                }
                _ if min.approx_eq(max) => other.contains(&Value::Quantity(*min)),
                _ => false,
            },
        }
    }

    /// Intersect two constraints.
    ///
    /// The result admits exactly the values admitted by both sides; an empty
    /// intersection is a conflict.
    pub fn merge(&self, other: &Parameter) -> Result<Parameter, ParameterError> {
        let conflict = || ParameterError::Conflict {
            label: String::new(),
            left: self.clone(),
            right: other.clone(),
        };

        match (self, other) {
            (Parameter::Tbd, p) | (p, Parameter::Tbd) => Ok(p.clone()),
            (Parameter::Any, p) | (p, Parameter::Any) => Ok(p.clone()),
            (Parameter::Constant(a), Parameter::Constant(b)) => {
                if a == b {
                    Ok(self.clone())
                } else {
                    Err(conflict())
                }
            }
            (Parameter::Range { .. }, Parameter::Constant(v))
            | (Parameter::Constant(v), Parameter::Range { .. }) => {
                let range = if matches!(self, Parameter::Range { .. }) { self } else { other };
                if range.contains(v) {
                    Ok(Parameter::Constant(v.clone()))
                } else {
                    Err(conflict())
                }
            }
            (Parameter::Range { min: amin, max: amax }, Parameter::Range { min: bmin, max: bmax }) => {
                if amin.unit != bmin.unit {
                    return Err(conflict());
                }
                let lo = if amin.value >= bmin.value { *amin } else { *bmin };
                let hi = if amax.value <= bmax.value { *amax } else { *bmax };
                match lo.approx_cmp(&hi) {
                    Some(Ordering::Equal) => Ok(Parameter::Constant(Value::Quantity(lo))),
                    Some(Ordering::Less) => Ok(Parameter::Range { min: lo, max: hi }),
                    _ => Err(conflict()),
                }
            }
            (Parameter::Set(values), p) | (p, Parameter::Set(values)) => {
                let kept: Vec<Value> = values.iter().filter(|v| p.contains(v)).cloned().collect();
                match kept.len() {
                    0 => Err(conflict()),
                    1 => Ok(Parameter::Constant(kept.into_iter().next().ok_or_else(conflict)?)),
                    _ => Ok(Parameter::Set(kept)),
                }
            }
        }
    }

    /// The narrowest single description: singleton sets and degenerate ranges
    /// collapse to constants.
    pub fn most_narrow(&self) -> Parameter {
        match self {
            Parameter::Range { min, max } if min.approx_eq(max) => Parameter::Constant(Value::Quantity(*min)),
            Parameter::Set(values) if values.len() == 1 => Parameter::Constant(values[0].clone()),
            other => other.clone(),
        }
    }
}

fn in_range(q: &Quantity, min: &Quantity, max: &Quantity) -> bool {
    if q.unit != min.unit {
        return false;
    }
    let above = matches!(q.approx_cmp(min), Some(Ordering::Equal | Ordering::Greater));
    let below = matches!(q.approx_cmp(max), Some(Ordering::Equal | Ordering::Less));
    above && below
}

impl From<Value> for Parameter {
    fn from(v: Value) -> Self {
        Parameter::Constant(v)
    }
}

impl From<Quantity> for Parameter {
    fn from(q: Quantity) -> Self {
        Parameter::Constant(Value::Quantity(q))
    }
}

impl FromStr for Parameter {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "" => return Err(ParameterError::Parse(s.to_string())),
            "tbd" => return Ok(Parameter::Tbd),
            "any" => return Ok(Parameter::Any),
            _ => {}
        }

        if let Some((lo, hi)) = s.split_once("..") {
            let lo = lo.trim();
            let hi = hi.trim();
            let (min, max) = match (lo.is_empty(), hi.is_empty()) {
                (true, true) => return Err(ParameterError::Parse(s.to_string())),
                (false, true) => {
                    let min: Quantity = lo.parse()?;
                    (min, Quantity::new(f64::INFINITY, min.unit))
                }
                (true, false) => {
                    let max: Quantity = hi.parse()?;
                    (Quantity::new(f64::NEG_INFINITY, max.unit), max)
                }
                (false, false) => (lo.parse::<Quantity>()?, hi.parse::<Quantity>()?),
            };
            min.same_unit(&max)?;
            if min.value > max.value {
                return Err(ParameterError::Parse(s.to_string()));
            }
            return Ok(Parameter::Range { min, max }.most_narrow());
        }

        if s.contains('|') {
            let values = s
                .split('|')
                .map(|part| part.parse::<Value>())
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Parameter::Set(values).most_narrow());
        }

        Ok(Parameter::Constant(s.parse()?))
    }
}

impl TryFrom<String> for Parameter {
    type Error = ParameterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Parameter> for String {
    fn from(p: Parameter) -> Self {
        p.to_string()
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Tbd => write!(f, "tbd"),
            Parameter::Any => write!(f, "any"),
            Parameter::Constant(v) => write!(f, "{}", v),
            Parameter::Range { min, max } => {
                if min.value.is_finite() {
                    write!(f, "{}", min)?;
                }
                write!(f, "..")?;
                if max.value.is_finite() {
                    write!(f, "{}", max)?;
                }
                Ok(())
            }
            Parameter::Set(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join("|"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Parameter {
        Parameter::lit(s)
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(p("tbd"), Parameter::Tbd);
        assert_eq!(p("ANY"), Parameter::Any);
        assert_eq!(p("100ohm"), Parameter::from(Quantity::ohms(100.0)));
        assert_eq!(
            p("715mV..1V"),
            Parameter::range(Quantity::volts(0.715), Quantity::volts(1.0))
        );
        assert_eq!(p("yellow"), Parameter::constant(LedColor::Yellow));
        assert_eq!(p("x7r"), Parameter::constant(Dielectric::X7r));
        assert_eq!(p("5V.."), Parameter::at_least(Quantity::volts(5.0)));
        assert!(matches!(p("4V|5V|6V"), Parameter::Set(ref v) if v.len() == 3));
        assert_eq!(p("3V..3V"), Parameter::from(Quantity::volts(3.0)));
    }

    #[test]
    fn test_parse_rejects_bad_ranges() {
        assert!("6V..4V".parse::<Parameter>().is_err());
        assert!("4V..6A".parse::<Parameter>().is_err());
        assert!("..".parse::<Parameter>().is_err());
        assert!("purple".parse::<Parameter>().is_err());
    }

    #[test]
    fn test_merge_identities() {
        let c = p("100ohm");
        assert_eq!(Parameter::Tbd.merge(&c).unwrap(), c);
        assert_eq!(c.merge(&Parameter::Any).unwrap(), c);
        assert_eq!(Parameter::Tbd.merge(&Parameter::Any).unwrap(), Parameter::Any);
        assert_eq!(Parameter::Any.merge(&Parameter::Tbd).unwrap(), Parameter::Any);
    }

    #[test]
    fn test_merge_constants() {
        assert_eq!(p("3.3V").merge(&p("3300mV")).unwrap(), p("3.3V"));
        assert!(p("3.3V").merge(&p("5V")).is_err());
        assert!(p("3.3V").merge(&p("3.3A")).is_err());
        assert!(p("red").merge(&p("green")).is_err());
    }

    #[test]
    fn test_merge_ranges() {
        assert_eq!(p("1V..5V").merge(&p("3V..10V")).unwrap(), p("3V..5V"));
        assert_eq!(p("1V..5V").merge(&p("5V..10V")).unwrap(), p("5V"));
        assert!(p("1V..2V").merge(&p("3V..4V")).is_err());
        assert_eq!(p("4V..6V").merge(&p("5V")).unwrap(), p("5V"));
        assert_eq!(p("5V").merge(&p("4V..6V")).unwrap(), p("5V"));
        assert!(p("4V..6V").merge(&p("3.3V")).is_err());
        assert_eq!(p("5V..").merge(&p("16V")).unwrap(), p("16V"));
    }

    #[test]
    fn test_merge_sets() {
        assert_eq!(p("4V|5V|6V").merge(&p("4.5V..7V")).unwrap(), p("5V|6V"));
        assert_eq!(p("4V|5V|6V").merge(&p("5V")).unwrap(), p("5V"));
        assert!(p("4V|5V").merge(&p("7V")).is_err());
        assert_eq!(p("red|green").merge(&p("green|blue")).unwrap(), p("green"));
    }

    #[test]
    fn test_merge_is_commutative_on_samples() {
        let samples = ["tbd", "any", "5V", "4V..6V", "1V..", "4V|5V|9V", "3.3V"];
        for a in samples {
            for b in samples {
                let ab = p(a).merge(&p(b)).ok();
                let ba = p(b).merge(&p(a)).ok();
                assert_eq!(ab, ba, "{} merge {}", a, b);
            }
        }
    }

    #[test]
    fn test_subset() {
        assert!(p("100ohm").is_subset_of(&Parameter::Any));
        assert!(p("100ohm").is_subset_of(&p("50ohm..200ohm")));
        assert!(!p("100ohm").is_subset_of(&p("200ohm")));
        assert!(p("4V..5V").is_subset_of(&p("3V..6V")));
        assert!(!p("4V..7V").is_subset_of(&p("3V..6V")));
        assert!(!Parameter::Any.is_subset_of(&p("3V")));
        assert!(p("16V").is_subset_of(&p("5V..")));
        assert!(p("5V|6V").is_subset_of(&p("4V..6V")));
        assert!(p("green").is_subset_of(&p("green")));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for lit in ["tbd", "any", "100Ω", "715mV..1V", "5V..", "yellow", "X5R", "4V|5V"] {
            let parsed = p(lit);
            assert_eq!(p(&parsed.to_string()), parsed, "{}", lit);
        }
    }

    #[test]
    fn test_interval() {
        assert_eq!(
            p("4V|6V|5V").as_interval(),
            Some((Quantity::volts(4.0), Quantity::volts(6.0)))
        );
        assert_eq!(p("red").as_interval(), None);
        assert!(!p("5V..").is_concrete());
        assert!(p("5V..6V").is_concrete());
    }
}
