//! Typed handles over interface subtrees.
//!
//! Each handle records the node ids of an interface and its children so
//! library code can wire things without path lookups. Helper parts created
//! for an interface (decoupling capacitor, TVS, pull-up) are placed under
//! that interface.

use crate::design::{Design, DesignError, InterfaceKind, NodeId, NodeTrait};
use crate::params::{DerivationRule, ParamId, Parameter};
use crate::units::Quantity;

use super::passives::{Capacitor, Resistor};
use super::semiconductors::Tvs;

pub(crate) fn electrical(d: &mut Design, parent: NodeId, name: &str) -> Result<NodeId, DesignError> {
    d.add_interface(parent, name, InterfaceKind::Electrical)
}

/// Power rail: high and low side plus the rail voltage.
#[derive(Debug, Clone, Copy)]
pub struct ElectricPower {
    pub node: NodeId,
    pub hv: NodeId,
    pub lv: NodeId,
    pub voltage: ParamId,
}

impl ElectricPower {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_interface(parent, name, InterfaceKind::ElectricPower)?;
        let hv = electrical(d, node, "hv")?;
        let lv = electrical(d, node, "lv")?;
        let voltage = d.add_param(node, "voltage", Parameter::Tbd);
        Ok(Self { node, hv, lv, voltage })
    }

    /// Capacitor across the rail, rated for at least the rail voltage.
    /// Calling it again returns the same capacitor.
    pub fn decouple(&self, d: &mut Design) -> Result<Capacitor, DesignError> {
        if let Some(existing) = self.decoupling_capacitor(d) {
            return Capacitor::attach(d, existing);
        }
        let cap = Capacitor::new(d, self.node, "decoupling_cap")?;
        d.connect_via(self.hv, cap.node, self.lv)?;
        d.params
            .derive(cap.rated_voltage, DerivationRule::AtLeast { margin: 1.0 }, vec![self.voltage])?;
        d.add_trait(self.node, NodeTrait::Decoupled { capacitor: cap.node });
        Ok(cap)
    }

    pub fn decoupling_capacitor(&self, d: &Design) -> Option<NodeId> {
        d.traits(self.node).iter().find_map(|t| match t {
            NodeTrait::Decoupled { capacitor } => Some(*capacitor),
            _ => None,
        })
    }

    /// TVS diode across the rail with its working voltage equal to the rail
    /// voltage. Idempotent.
    pub fn protect(&self, d: &mut Design) -> Result<Tvs, DesignError> {
        if let Some(existing) = self.protection(d) {
            return Tvs::attach(d, existing);
        }
        let tvs = Tvs::new(d, self.node, "tvs")?;
        d.connect(self.hv, tvs.diode.cathode)?;
        d.connect(self.lv, tvs.diode.anode)?;
        d.params.alias(tvs.diode.reverse_working_voltage, self.voltage)?;
        d.add_trait(self.node, NodeTrait::SurgeProtected { tvs: tvs.diode.node });
        Ok(tvs)
    }

    pub fn protection(&self, d: &Design) -> Option<NodeId> {
        d.traits(self.node).iter().find_map(|t| match t {
            NodeTrait::SurgeProtected { tvs } => Some(*tvs),
            _ => None,
        })
    }

    pub fn set_voltage(&self, d: &mut Design, voltage: Quantity) -> Result<(), DesignError> {
        d.params.constrain(self.voltage, &Parameter::constant(voltage))?;
        Ok(())
    }
}

/// Logic signal with the rail it is referenced to.
#[derive(Debug, Clone, Copy)]
pub struct ElectricLogic {
    pub node: NodeId,
    pub signal: NodeId,
    pub reference: ElectricPower,
}

impl ElectricLogic {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_interface(parent, name, InterfaceKind::ElectricLogic)?;
        let signal = electrical(d, node, "signal")?;
        let reference = ElectricPower::new(d, node, "reference")?;
        Ok(Self { node, signal, reference })
    }

    /// `count` logic interfaces named `name[0]`, `name[1]`, ...
    pub fn array(d: &mut Design, parent: NodeId, name: &str, count: usize) -> Result<Vec<Self>, DesignError> {
        (0..count)
            .map(|i| Self::new(d, parent, &format!("{}[{}]", name, i)))
            .collect()
    }

    /// Tie the signal to the high or low side of its reference.
    pub fn set(&self, d: &mut Design, on: bool) -> Result<(), DesignError> {
        let rail = if on { self.reference.hv } else { self.reference.lv };
        d.connect(self.signal, rail)
    }

    /// Resistor from the signal to the reference high side. Idempotent.
    pub fn pull_up(&self, d: &mut Design) -> Result<Resistor, DesignError> {
        if let Some(existing) = self.pull_up_resistor(d) {
            return Resistor::attach(d, existing);
        }
        let resistor = Resistor::new(d, self.node, "pull_up")?;
        d.connect_via(self.signal, resistor.node, self.reference.hv)?;

        let traits = d.traits_mut(self.node);
        match traits.iter_mut().find(|t| matches!(t, NodeTrait::Pulls { .. })) {
            Some(NodeTrait::Pulls { up, .. }) => *up = Some(resistor.node),
            _ => traits.push(NodeTrait::Pulls {
                up: Some(resistor.node),
                down: None,
            }),
        }
        Ok(resistor)
    }

    pub fn pull_up_resistor(&self, d: &Design) -> Option<NodeId> {
        d.traits(self.node).iter().find_map(|t| match t {
            NodeTrait::Pulls { up, .. } => *up,
            _ => None,
        })
    }

    pub fn connect_reference(&self, d: &mut Design, power: &ElectricPower) -> Result<(), DesignError> {
        d.connect(self.reference.node, power.node)
    }
}

/// Reference every logic interface in `logics` to `power`.
pub fn connect_references(d: &mut Design, logics: &[ElectricLogic], power: &ElectricPower) -> Result<(), DesignError> {
    for logic in logics {
        logic.connect_reference(d, power)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct DifferentialPair {
    pub node: NodeId,
    pub p: NodeId,
    pub n: NodeId,
}

impl DifferentialPair {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_interface(parent, name, InterfaceKind::DifferentialPair)?;
        let p = electrical(d, node, "p")?;
        let n = electrical(d, node, "n")?;
        Ok(Self { node, p, n })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct I2c {
    pub node: NodeId,
    pub sda: ElectricLogic,
    pub scl: ElectricLogic,
}

impl I2c {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_interface(parent, name, InterfaceKind::I2c)?;
        let sda = ElectricLogic::new(d, node, "sda")?;
        let scl = ElectricLogic::new(d, node, "scl")?;
        Ok(Self { node, sda, scl })
    }

    /// Pull-ups on both lines.
    pub fn terminate(&self, d: &mut Design) -> Result<(Resistor, Resistor), DesignError> {
        Ok((self.sda.pull_up(d)?, self.scl.pull_up(d)?))
    }
}

/// USB 2.0 data pair plus bus power.
#[derive(Debug, Clone, Copy)]
pub struct Usb2If {
    pub node: NodeId,
    pub d: DifferentialPair,
    pub buspower: ElectricPower,
}

impl Usb2If {
    pub fn new(design: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = design.add_interface(parent, name, InterfaceKind::Usb2If)?;
        let d = DifferentialPair::new(design, node, "d")?;
        let buspower = ElectricPower::new(design, node, "buspower")?;
        buspower.set_voltage(design, Quantity::volts(5.0))?;
        Ok(Self { node, d, buspower })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Usb2 {
    pub node: NodeId,
    pub usb_if: Usb2If,
}

impl Usb2 {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_interface(parent, name, InterfaceKind::Usb2)?;
        let usb_if = Usb2If::new(d, node, "usb_if")?;
        Ok(Self { node, usb_if })
    }

    pub fn vbus(&self) -> ElectricPower {
        self.usb_if.buspower
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::ModuleKind;

    fn board() -> (Design, NodeId) {
        let d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        (d, root)
    }

    #[test]
    fn test_decouple_is_idempotent_and_rated() {
        let (mut d, root) = board();
        let ldo = d.add_module(root, "ldo", ModuleKind::Ldo).unwrap();
        let rail = ElectricPower::new(&mut d, ldo, "power_out").unwrap();
        rail.set_voltage(&mut d, Quantity::volts(3.3)).unwrap();

        let cap = rail.decouple(&mut d).unwrap();
        let again = rail.decouple(&mut d).unwrap();
        assert_eq!(cap.node, again.node);
        assert_eq!(d.path(cap.node), "board.ldo.power_out.decoupling_cap");

        d.params.propagate().unwrap();
        assert_eq!(
            d.params.value(cap.rated_voltage),
            &Parameter::at_least(Quantity::volts(3.3))
        );
        assert_eq!(d.connections(rail.hv), vec![cap.a]);
    }

    #[test]
    fn test_protect_aliases_working_voltage() {
        let (mut d, root) = board();
        let usb = Usb2::new(&mut d, root, "usb").unwrap();
        let tvs = usb.vbus().protect(&mut d).unwrap();
        let again = usb.vbus().protect(&mut d).unwrap();
        assert_eq!(tvs.diode.node, again.diode.node);
        assert_eq!(d.path(tvs.diode.node), "board.usb.usb_if.buspower.tvs");
        assert_eq!(
            d.params.value(tvs.diode.reverse_working_voltage),
            &Parameter::lit("5V")
        );
    }

    #[test]
    fn test_logic_set_and_pull_up() {
        let (mut d, root) = board();
        let wp = ElectricLogic::new(&mut d, root, "write_protect").unwrap();
        wp.set(&mut d, false).unwrap();
        assert_eq!(d.connections(wp.signal), vec![wp.reference.lv]);

        let r = wp.pull_up(&mut d).unwrap();
        assert_eq!(wp.pull_up_resistor(&d), Some(r.node));
        assert_eq!(wp.pull_up(&mut d).unwrap().node, r.node);
        assert_eq!(d.connections(r.b), vec![wp.reference.hv]);
    }

    #[test]
    fn test_usb_connect_reaches_leaves() {
        let (mut d, root) = board();
        let a = Usb2::new(&mut d, root, "a").unwrap();
        let b = Usb2::new(&mut d, root, "b").unwrap();
        d.connect(a.node, b.node).unwrap();

        let nets = d.nets();
        let p = nets.net_of(a.usb_if.d.p).unwrap();
        assert!(p.members.contains(&b.usb_if.d.p));
        assert!(!p.members.contains(&b.usb_if.d.n));
        assert!(d.params.same_class(a.vbus().voltage, b.vbus().voltage));
    }
}
