//! Composite circuits built from other library modules.

use crate::design::{Design, DesignError, ModuleKind, NodeId, NodeTrait};
use crate::params::{DerivationRule, ParamId, Parameter};
use crate::units::{Quantity, Unit};

use super::ics::Cbm9002a;
use super::interfaces::{electrical, ElectricPower, Usb2};
use super::passives::{Capacitor, Crystal};
use super::semiconductors::{Diode, Tvs};

/// Crystal with its two load capacitors to ground.
#[derive(Debug, Clone, Copy)]
pub struct CrystalOscillator {
    pub node: NodeId,
    pub crystal: Crystal,
    pub capacitors: [Capacitor; 2],
    pub power: ElectricPower,
    pub p: NodeId,
    pub n: NodeId,
    pub frequency: ParamId,
}

impl CrystalOscillator {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::CrystalOscillator)?;
        let crystal = Crystal::new(d, node, "crystal")?;
        let capacitors = [
            Capacitor::new(d, node, "capacitors[0]")?,
            Capacitor::new(d, node, "capacitors[1]")?,
        ];
        let power = ElectricPower::new(d, node, "power")?;
        let p = electrical(d, node, "p")?;
        let n = electrical(d, node, "n")?;
        let frequency = d.add_param(node, "frequency", Parameter::Tbd);

        d.params.alias(frequency, crystal.frequency)?;
        d.connect(crystal.gnd, power.lv)?;
        for (pin, cap) in crystal.unnamed.iter().zip(&capacitors) {
            d.connect_via(*pin, cap.node, power.lv)?;
            d.params
                .derive(cap.rated_voltage, DerivationRule::AtLeast { margin: 1.0 }, vec![power.voltage])?;
        }
        d.connect(p, crystal.unnamed[0])?;
        d.connect(n, crystal.unnamed[1])?;

        Ok(Self {
            node,
            crystal,
            capacitors,
            power,
            p,
            n,
            frequency,
        })
    }

    pub fn set_load_capacitance(&self, d: &mut Design, value: Quantity) -> Result<(), DesignError> {
        for cap in &self.capacitors {
            cap.set_capacitance(d, value)?;
        }
        Ok(())
    }
}

/// CBM9002A with the parts its datasheet asks for: reset RC with discharge
/// diode, 24MHz oscillator, I2C pull-ups and rail decoupling.
#[derive(Debug, Clone)]
pub struct Cbm9002aReferenceDesign {
    pub node: NodeId,
    pub mcu: Cbm9002a,
    pub reset_diode: Diode,
    pub reset_lowpass_cap: Capacitor,
    pub oscillator: CrystalOscillator,
}

impl Cbm9002aReferenceDesign {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::Cbm9002aReferenceDesign)?;
        let mcu = Cbm9002a::new(d, node, "mcu")?;
        let reset_diode = Diode::new(d, node, "reset_diode")?;
        let reset_lowpass_cap = Capacitor::new(d, node, "reset_lowpass_cap")?;
        let oscillator = CrystalOscillator::new(d, node, "oscillator")?;

        mcu.vcc.decouple(d)?;
        mcu.avcc.decouple(d)?;

        mcu.reset.pull_up(d)?;
        d.connect(mcu.reset.signal, reset_diode.anode)?;
        d.connect(reset_diode.cathode, mcu.vcc.hv)?;
        d.connect_via(mcu.reset.signal, reset_lowpass_cap.node, mcu.vcc.lv)?;
        reset_lowpass_cap.set_capacitance(d, Quantity::farads(1e-6))?;
        d.params.derive(
            reset_lowpass_cap.rated_voltage,
            DerivationRule::AtLeast { margin: 1.0 },
            vec![mcu.vcc.voltage],
        )?;

        d.connect(oscillator.power.node, mcu.vcc.node)?;
        d.connect(oscillator.p, mcu.xtalin)?;
        d.connect(oscillator.n, mcu.xtalout)?;
        d.params
            .constrain(oscillator.frequency, &Parameter::constant(Quantity::new(24e6, Unit::Hertz)))?;

        mcu.i2c.terminate(d)?;

        Ok(Self {
            node,
            mcu,
            reset_diode,
            reset_lowpass_cap,
            oscillator,
        })
    }
}

/// TVS diodes on both USB data lines; bus power passes straight through.
#[derive(Debug, Clone, Copy)]
pub struct GenericBusProtection {
    pub node: NodeId,
    pub bus_unprotected: Usb2,
    pub bus_protected: Usb2,
    pub tvs: [Tvs; 2],
}

impl GenericBusProtection {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::GenericBusProtection)?;
        let bus_unprotected = Usb2::new(d, node, "bus_unprotected")?;
        let bus_protected = Usb2::new(d, node, "bus_protected")?;
        let tvs = [Tvs::new(d, node, "tvs[0]")?, Tvs::new(d, node, "tvs[1]")?];

        d.connect(bus_unprotected.node, bus_protected.node)?;
        let gnd = bus_protected.vbus().lv;
        let lines = [bus_protected.usb_if.d.p, bus_protected.usb_if.d.n];
        for (line, diode) in lines.iter().zip(&tvs) {
            d.connect(*line, diode.diode.cathode)?;
            d.connect(diode.diode.anode, gnd)?;
            d.params.constrain(
                diode.diode.reverse_working_voltage,
                &Parameter::constant(Quantity::volts(3.3)),
            )?;
        }
        d.add_trait(
            node,
            NodeTrait::CanBridge {
                input: bus_unprotected.node,
                output: bus_protected.node,
            },
        );

        Ok(Self {
            node,
            bus_unprotected,
            bus_protected,
            tvs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picker::{pick_parts, PickOptions, PickerRegistry};

    #[test]
    fn test_oscillator_picks_crystal_and_caps() {
        let mut d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        let osc = CrystalOscillator::new(&mut d, root, "osc").unwrap();
        osc.power.set_voltage(&mut d, Quantity::volts(3.3)).unwrap();
        osc.set_load_capacitance(&mut d, Quantity::farads(15e-12)).unwrap();
        d.params
            .constrain(osc.frequency, &Parameter::lit("24MHz"))
            .unwrap();
        d.params.replace_tbd_with_any();

        pick_parts(&mut d, &PickerRegistry::with_builtin(), &PickOptions::default()).unwrap();
        assert_eq!(d.picked_part(osc.crystal.node).unwrap().lcsc, "C258965");
        for cap in &osc.capacitors {
            assert_eq!(d.picked_part(cap.node).unwrap().lcsc, "C1548");
        }
    }

    #[test]
    fn test_bus_protection_has_no_part_of_its_own() {
        let mut d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        let protection = GenericBusProtection::new(&mut d, root, "usb_protection").unwrap();
        d.params.replace_tbd_with_any();

        let report = pick_parts(&mut d, &PickerRegistry::with_builtin(), &PickOptions::default()).unwrap();
        assert!(d.has_no_part(protection.node));
        assert_eq!(report.no_part, vec!["board.usb_protection".to_string()]);
        for tvs in &protection.tvs {
            assert_eq!(d.picked_part(tvs.diode.node).unwrap().mpn.as_deref(), Some("SD03C"));
        }
    }

    #[test]
    fn test_bus_protection_passes_data_lines() {
        let mut d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        let protection = GenericBusProtection::new(&mut d, root, "usb_protection").unwrap();
        let nets = d.nets();
        let p = nets.net_of(protection.bus_unprotected.usb_if.d.p).unwrap();
        assert!(p.members.contains(&protection.bus_protected.usb_if.d.p));
        assert!(p.members.contains(&protection.tvs[0].diode.cathode));
    }
}
