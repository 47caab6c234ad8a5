//! Resistors, capacitors, crystals and connectors.

use crate::design::{Design, DesignError, ModuleKind, NodeId, NodeTrait};
use crate::params::{ParamId, Parameter};
use crate::units::Quantity;

use super::interfaces::electrical;

fn unnamed_pair(d: &mut Design, node: NodeId) -> Result<(NodeId, NodeId), DesignError> {
    let a = electrical(d, node, "unnamed[0]")?;
    let b = electrical(d, node, "unnamed[1]")?;
    d.add_trait(node, NodeTrait::CanBridge { input: a, output: b });
    Ok((a, b))
}

#[derive(Debug, Clone, Copy)]
pub struct Resistor {
    pub node: NodeId,
    pub a: NodeId,
    pub b: NodeId,
    pub resistance: ParamId,
    pub rated_power: ParamId,
    pub rated_voltage: ParamId,
}

impl Resistor {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::Resistor)?;
        let (a, b) = unnamed_pair(d, node)?;
        Ok(Self {
            node,
            a,
            b,
            resistance: d.add_param(node, "resistance", Parameter::Tbd),
            rated_power: d.add_param(node, "rated_power", Parameter::Tbd),
            rated_voltage: d.add_param(node, "rated_voltage", Parameter::Tbd),
        })
    }

    /// Handle for a resistor that already exists in the design.
    pub fn attach(d: &Design, node: NodeId) -> Result<Self, DesignError> {
        Ok(Self {
            node,
            a: d.child(node, "unnamed[0]")?,
            b: d.child(node, "unnamed[1]")?,
            resistance: d.param(node, "resistance")?,
            rated_power: d.param(node, "rated_power")?,
            rated_voltage: d.param(node, "rated_voltage")?,
        })
    }

    pub fn set_resistance(&self, d: &mut Design, value: Quantity) -> Result<(), DesignError> {
        d.params.constrain(self.resistance, &Parameter::constant(value))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Capacitor {
    pub node: NodeId,
    pub a: NodeId,
    pub b: NodeId,
    pub capacitance: ParamId,
    pub rated_voltage: ParamId,
    pub temperature_coefficient: ParamId,
}

impl Capacitor {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::Capacitor)?;
        let (a, b) = unnamed_pair(d, node)?;
        Ok(Self {
            node,
            a,
            b,
            capacitance: d.add_param(node, "capacitance", Parameter::Tbd),
            rated_voltage: d.add_param(node, "rated_voltage", Parameter::Tbd),
            temperature_coefficient: d.add_param(node, "temperature_coefficient", Parameter::Tbd),
        })
    }

    pub fn attach(d: &Design, node: NodeId) -> Result<Self, DesignError> {
        Ok(Self {
            node,
            a: d.child(node, "unnamed[0]")?,
            b: d.child(node, "unnamed[1]")?,
            capacitance: d.param(node, "capacitance")?,
            rated_voltage: d.param(node, "rated_voltage")?,
            temperature_coefficient: d.param(node, "temperature_coefficient")?,
        })
    }

    pub fn set_capacitance(&self, d: &mut Design, value: Quantity) -> Result<(), DesignError> {
        d.params.constrain(self.capacitance, &Parameter::constant(value))?;
        Ok(())
    }
}

/// Four resistors in one package sharing their ratings.
#[derive(Debug, Clone)]
pub struct ResistorArray {
    pub node: NodeId,
    pub resistors: [Resistor; 4],
    pub resistance: ParamId,
    pub rated_power: ParamId,
    pub rated_voltage: ParamId,
}

impl ResistorArray {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::ResistorArray)?;
        d.add_trait(node, NodeTrait::DesignatorPrefix("R".to_string()));
        let resistance = d.add_param(node, "resistance", Parameter::Tbd);
        let rated_power = d.add_param(node, "rated_power", Parameter::Tbd);
        let rated_voltage = d.add_param(node, "rated_voltage", Parameter::Tbd);

        let resistors = [
            Resistor::new(d, node, "resistor[0]")?,
            Resistor::new(d, node, "resistor[1]")?,
            Resistor::new(d, node, "resistor[2]")?,
            Resistor::new(d, node, "resistor[3]")?,
        ];
        for r in &resistors {
            d.params.alias(r.resistance, resistance)?;
            d.params.alias(r.rated_power, rated_power)?;
            d.params.alias(r.rated_voltage, rated_voltage)?;
        }
        Ok(Self {
            node,
            resistors,
            resistance,
            rated_power,
            rated_voltage,
        })
    }

    pub fn set_resistance(&self, d: &mut Design, value: Quantity) -> Result<(), DesignError> {
        d.params.constrain(self.resistance, &Parameter::constant(value))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Crystal {
    pub node: NodeId,
    pub unnamed: [NodeId; 2],
    pub gnd: NodeId,
    pub frequency: ParamId,
    pub load_impedance: ParamId,
    pub equivalent_series_resistance: ParamId,
    pub shunt_capacitance: ParamId,
    pub frequency_temperature_tolerance: ParamId,
    pub frequency_tolerance: ParamId,
}

impl Crystal {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::Crystal)?;
        let unnamed = [electrical(d, node, "unnamed[0]")?, electrical(d, node, "unnamed[1]")?];
        let gnd = electrical(d, node, "gnd")?;
        Ok(Self {
            node,
            unnamed,
            gnd,
            frequency: d.add_param(node, "frequency", Parameter::Tbd),
            load_impedance: d.add_param(node, "load_impedance", Parameter::Tbd),
            equivalent_series_resistance: d.add_param(node, "equivalent_series_resistance", Parameter::Tbd),
            shunt_capacitance: d.add_param(node, "shunt_capacitance", Parameter::Tbd),
            frequency_temperature_tolerance: d.add_param(node, "frequency_temperature_tolerance", Parameter::Tbd),
            frequency_tolerance: d.add_param(node, "frequency_tolerance", Parameter::Tbd),
        })
    }
}

/// Pin header, `horizontal x vertical` pins.
#[derive(Debug, Clone)]
pub struct Header {
    pub node: NodeId,
    pub unnamed: Vec<NodeId>,
    pub horizontal_pin_count: ParamId,
    pub vertical_pin_count: ParamId,
}

impl Header {
    pub fn new(
        d: &mut Design,
        parent: NodeId,
        name: &str,
        horizontal: usize,
        vertical: usize,
    ) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::Header)?;
        let unnamed = (0..horizontal * vertical)
            .map(|i| electrical(d, node, &format!("unnamed[{}]", i)))
            .collect::<Result<Vec<_>, _>>()?;
        let horizontal_pin_count = d.add_param(
            node,
            "horizontal_pin_count",
            Parameter::constant(Quantity::scalar(horizontal as f64)),
        );
        let vertical_pin_count = d.add_param(
            node,
            "vertical_pin_count",
            Parameter::constant(Quantity::scalar(vertical as f64)),
        );
        Ok(Self {
            node,
            unnamed,
            horizontal_pin_count,
            vertical_pin_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PickStrategy;
    use crate::picker::{pick_parts, PickOptions, PickerRegistry};

    #[test]
    fn test_resistor_array_shares_resistance() {
        let mut d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        let array = ResistorArray::new(&mut d, root, "limiter").unwrap();
        array.set_resistance(&mut d, Quantity::ohms(100.0)).unwrap();
        for r in &array.resistors {
            assert_eq!(d.params.value(r.resistance), &Parameter::lit("100ohm"));
        }
    }

    #[test]
    fn test_array_picked_as_one_part() {
        let mut d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        let array = ResistorArray::new(&mut d, root, "pullup").unwrap();
        array.set_resistance(&mut d, Quantity::ohms(100e3)).unwrap();
        d.params.replace_tbd_with_any();

        let registry = PickerRegistry::with_builtin();
        let report = pick_parts(&mut d, &registry, &PickOptions::default()).unwrap();
        assert_eq!(report.picks.len(), 1, "children of the array must not be picked separately");
        let part = d.picked_part(array.node).unwrap();
        assert_eq!(part.lcsc, "C162977");
        assert_eq!(part.pinmap["5"], array.resistors[3].b);
    }

    #[test]
    fn test_header_picks_by_pin_count() {
        let mut d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        let header = Header::new(&mut d, root, "debug", 2, 6).unwrap();
        let registry = PickerRegistry::with_builtin();
        assert_eq!(registry.strategy_for(ModuleKind::Header), Some(PickStrategy::Catalog));

        pick_parts(&mut d, &registry, &PickOptions::default()).unwrap();
        let part = d.picked_part(header.node).unwrap();
        assert_eq!(part.lcsc, "C225521");
        assert_eq!(part.pinmap.len(), 12);
    }
}
