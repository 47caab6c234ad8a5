//! Physical quantities with SI-prefix aware parsing and display.
//!
//! Catalog tables and board code write values the way a datasheet does
//! (`"100nF"`, `"3.3V"`, `"24MHz"`, `"900mcd"`), so every literal goes
//! through [`Quantity::from_str`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Relative tolerance used when comparing two quantities for equality.
pub const RELATIVE_EPSILON: f64 = 1e-9;

#[derive(Debug, Error, PartialEq)]
pub enum UnitError {
    #[error("Empty quantity")]
    Empty,
    #[error("Invalid number in quantity: {0}")]
    InvalidNumber(String),
    #[error("Unknown unit: {0}")]
    UnknownUnit(String),
    #[error("Unit mismatch: {0} vs {1}")]
    Mismatch(Unit, Unit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Ohm,
    Farad,
    Volt,
    Ampere,
    Watt,
    Hertz,
    Candela,
    Byte,
    Ppm,
    Scalar,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Ohm => "Ω",
            Unit::Farad => "F",
            Unit::Volt => "V",
            Unit::Ampere => "A",
            Unit::Watt => "W",
            Unit::Hertz => "Hz",
            Unit::Candela => "cd",
            Unit::Byte => "B",
            Unit::Ppm => "ppm",
            Unit::Scalar => "",
        }
    }

    /// Whether SI prefixes are meaningful for this unit.
    fn takes_prefix(&self) -> bool {
        !matches!(self, Unit::Ppm | Unit::Scalar)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Scalar => write!(f, "scalar"),
            other => write!(f, "{}", other.symbol()),
        }
    }
}

// Longest suffixes first so "ohm" wins over a bare prefix match.
const UNIT_SUFFIXES: &[(&str, Unit)] = &[
    ("ohms", Unit::Ohm),
    ("ohm", Unit::Ohm),
    ("ppm", Unit::Ppm),
    ("Hz", Unit::Hertz),
    ("hz", Unit::Hertz),
    ("cd", Unit::Candela),
    ("Ω", Unit::Ohm),
    ("R", Unit::Ohm),
    ("F", Unit::Farad),
    ("V", Unit::Volt),
    ("A", Unit::Ampere),
    ("W", Unit::Watt),
    ("B", Unit::Byte),
];

const PREFIXES: &[(&str, f64)] = &[
    ("p", 1e-12),
    ("n", 1e-9),
    ("u", 1e-6),
    ("µ", 1e-6),
    ("μ", 1e-6),
    ("m", 1e-3),
    ("k", 1e3),
    ("K", 1e3),
    ("M", 1e6),
    ("G", 1e9),
];

/// A value with a unit, always stored in base units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn ohms(value: f64) -> Self {
        Self::new(value, Unit::Ohm)
    }

    pub fn farads(value: f64) -> Self {
        Self::new(value, Unit::Farad)
    }

    pub fn volts(value: f64) -> Self {
        Self::new(value, Unit::Volt)
    }

    pub fn amperes(value: f64) -> Self {
        Self::new(value, Unit::Ampere)
    }

    pub fn candela(value: f64) -> Self {
        Self::new(value, Unit::Candela)
    }

    pub fn scalar(value: f64) -> Self {
        Self::new(value, Unit::Scalar)
    }

    /// Parse a literal, panicking on malformed input.
    ///
    /// Only for literals written in source code; runtime input goes
    /// through [`FromStr`].
    pub fn lit(s: &str) -> Self {
        match s.parse() {
            Ok(q) => q,
            Err(e) => panic!("invalid quantity literal {:?}: {}", s, e),
        }
    }

    pub fn same_unit(&self, other: &Quantity) -> Result<(), UnitError> {
        if self.unit == other.unit {
            Ok(())
        } else {
            Err(UnitError::Mismatch(self.unit, other.unit))
        }
    }

    /// Relative comparison; `None` for mismatched units.
    pub fn approx_cmp(&self, other: &Quantity) -> Option<Ordering> {
        if self.unit != other.unit {
            return None;
        }
        if approx_eq(self.value, other.value) {
            Some(Ordering::Equal)
        } else {
            self.value.partial_cmp(&other.value)
        }
    }

    pub fn approx_eq(&self, other: &Quantity) -> bool {
        self.approx_cmp(other) == Some(Ordering::Equal)
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.value * factor, self.unit)
    }
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if a.is_infinite() || b.is_infinite() {
        return false;
    }
    let scale = a.abs().max(b.abs()).max(f64::MIN_POSITIVE);
    (a - b).abs() <= scale * RELATIVE_EPSILON
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.approx_eq(other)
    }
}

impl FromStr for Quantity {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if trimmed.is_empty() {
            return Err(UnitError::Empty);
        }

        let split = trimmed
            .char_indices()
            .find(|(i, c)| {
                !(c.is_ascii_digit()
                    || *c == '.'
                    || ((*c == 'e' || *c == 'E') && is_exponent(&trimmed, *i))
                    || ((*c == '-' || *c == '+') && (*i == 0 || is_exponent_sign(&trimmed, *i))))
            })
            .map(|(i, _)| i)
            .unwrap_or(trimmed.len());

        let (number, suffix) = trimmed.split_at(split);
        let mut value: f64 = number
            .parse()
            .map_err(|_| UnitError::InvalidNumber(s.to_string()))?;

        if suffix.is_empty() {
            return Ok(Quantity::scalar(value));
        }

        let (prefix, unit) = split_unit(suffix).ok_or_else(|| UnitError::UnknownUnit(suffix.to_string()))?;
        if !prefix.is_empty() {
            if !unit.takes_prefix() {
                return Err(UnitError::UnknownUnit(suffix.to_string()));
            }
            let factor = PREFIXES
                .iter()
                .find(|(p, _)| *p == prefix)
                .map(|(_, f)| *f)
                .ok_or_else(|| UnitError::UnknownUnit(suffix.to_string()))?;
            value *= factor;
        }
        Ok(Quantity::new(value, unit))
    }
}

fn is_exponent(s: &str, i: usize) -> bool {
    // "1e-6F" is an exponent, "10e" alone is not.
    let rest = &s[i + 1..];
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => i > 0,
        Some('-') | Some('+') => chars.next().map(|c| c.is_ascii_digit()).unwrap_or(false) && i > 0,
        _ => false,
    }
}

fn is_exponent_sign(s: &str, i: usize) -> bool {
    s[..i].ends_with(|c: char| c == 'e' || c == 'E')
}

fn split_unit(suffix: &str) -> Option<(&str, Unit)> {
    for (sym, unit) in UNIT_SUFFIXES {
        if let Some(prefix) = suffix.strip_suffix(*sym) {
            if prefix.is_empty() || PREFIXES.iter().any(|(p, _)| *p == prefix) {
                return Some((prefix, *unit));
            }
        }
    }
    // Bare prefix on a resistor value ("4k7" style is not supported, "10k" is)
    PREFIXES
        .iter()
        .find(|(p, _)| *p == suffix && matches!(*p, "k" | "K" | "M"))
        .map(|(p, _)| (*p, Unit::Ohm))
}

impl TryFrom<String> for Quantity {
    type Error = UnitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Quantity> for String {
    fn from(q: Quantity) -> Self {
        q.to_string()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_infinite() {
            let sign = if self.value < 0.0 { "-" } else { "" };
            return write!(f, "{}inf{}", sign, self.unit.symbol());
        }
        if !self.unit.takes_prefix() || self.value == 0.0 {
            return write!(f, "{}{}", trim_float(self.value), self.unit.symbol());
        }

        let magnitude = self.value.abs();
        let (prefix, factor) = [
            ("G", 1e9),
            ("M", 1e6),
            ("k", 1e3),
            ("", 1.0),
            ("m", 1e-3),
            ("µ", 1e-6),
            ("n", 1e-9),
            ("p", 1e-12),
        ]
        .into_iter()
        .find(|(_, factor)| magnitude >= *factor * (1.0 - RELATIVE_EPSILON))
        .unwrap_or(("p", 1e-12));

        write!(
            f,
            "{}{}{}",
            trim_float(self.value / factor),
            prefix,
            self.unit.symbol()
        )
    }
}

fn trim_float(v: f64) -> String {
    let rounded = (v * 1e6).round() / 1e6;
    let s = format!("{:.6}", rounded);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog_literals() {
        assert_eq!(Quantity::lit("100ohm"), Quantity::ohms(100.0));
        assert_eq!(Quantity::lit("3.3kohm"), Quantity::ohms(3300.0));
        assert_eq!(Quantity::lit("100nF"), Quantity::farads(100e-9));
        assert_eq!(Quantity::lit("15pF"), Quantity::farads(15e-12));
        assert_eq!(Quantity::lit("3.3V"), Quantity::volts(3.3));
        assert_eq!(Quantity::lit("715mV"), Quantity::volts(0.715));
        assert_eq!(Quantity::lit("250mA"), Quantity::amperes(0.25));
        assert_eq!(Quantity::lit("24MHz"), Quantity::new(24e6, Unit::Hertz));
        assert_eq!(Quantity::lit("900mcd"), Quantity::candela(0.9));
        assert_eq!(Quantity::lit("256kB"), Quantity::new(256e3, Unit::Byte));
        assert_eq!(Quantity::lit("30ppm"), Quantity::new(30.0, Unit::Ppm));
        assert_eq!(Quantity::lit("10e-7F"), Quantity::farads(1e-6));
        assert_eq!(Quantity::lit("1.2 k ohm"), Quantity::ohms(1200.0));
        assert_eq!(Quantity::lit("10k"), Quantity::ohms(10_000.0));
        assert_eq!(Quantity::lit("4"), Quantity::scalar(4.0));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Quantity>(), Err(UnitError::Empty));
        assert!(matches!("abc".parse::<Quantity>(), Err(UnitError::InvalidNumber(_))));
        assert!(matches!("10xyz".parse::<Quantity>(), Err(UnitError::UnknownUnit(_))));
        assert!(matches!("10kppm".parse::<Quantity>(), Err(UnitError::UnknownUnit(_))));
    }

    #[test]
    fn test_display_uses_prefixes() {
        assert_eq!(Quantity::ohms(3300.0).to_string(), "3.3kΩ");
        assert_eq!(Quantity::farads(100e-9).to_string(), "100nF");
        assert_eq!(Quantity::volts(3.3).to_string(), "3.3V");
        assert_eq!(Quantity::amperes(0.02).to_string(), "20mA");
        assert_eq!(Quantity::new(30.0, Unit::Ppm).to_string(), "30ppm");
        assert_eq!(Quantity::volts(f64::INFINITY).to_string(), "infV");
    }

    #[test]
    fn test_display_parses_back() {
        for lit in ["100ohm", "2.2kohm", "10uF", "24MHz", "1120mcd", "12pF"] {
            let q = Quantity::lit(lit);
            assert_eq!(q.to_string().parse::<Quantity>().unwrap(), q, "{}", lit);
        }
    }

    #[test]
    fn test_approx_cmp() {
        let a = Quantity::volts(3.3);
        let b = Quantity::volts(3.3 + 1e-12);
        assert_eq!(a.approx_cmp(&b), Some(Ordering::Equal));
        assert_eq!(a.approx_cmp(&Quantity::volts(5.0)), Some(Ordering::Less));
        assert_eq!(a.approx_cmp(&Quantity::amperes(3.3)), None);
    }
}
