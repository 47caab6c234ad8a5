//! Diodes and LEDs.

use crate::design::{Design, DesignError, ModuleKind, NodeId, NodeTrait};
use crate::params::{DerivationRule, LedColor, ParamId, Parameter};

use super::interfaces::{electrical, ElectricPower};
use super::passives::Resistor;

#[derive(Debug, Clone, Copy)]
pub struct Diode {
    pub node: NodeId,
    pub anode: NodeId,
    pub cathode: NodeId,
    pub forward_voltage: ParamId,
    pub max_current: ParamId,
    pub current: ParamId,
    pub reverse_working_voltage: ParamId,
    pub reverse_leakage_current: ParamId,
}

impl Diode {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        Self::with_kind(d, parent, name, ModuleKind::Diode)
    }

    fn with_kind(d: &mut Design, parent: NodeId, name: &str, kind: ModuleKind) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, kind)?;
        let anode = electrical(d, node, "anode")?;
        let cathode = electrical(d, node, "cathode")?;
        d.add_trait(node, NodeTrait::CanBridge { input: anode, output: cathode });
        Ok(Self {
            node,
            anode,
            cathode,
            forward_voltage: d.add_param(node, "forward_voltage", Parameter::Tbd),
            max_current: d.add_param(node, "max_current", Parameter::Tbd),
            current: d.add_param(node, "current", Parameter::Tbd),
            reverse_working_voltage: d.add_param(node, "reverse_working_voltage", Parameter::Tbd),
            reverse_leakage_current: d.add_param(node, "reverse_leakage_current", Parameter::Tbd),
        })
    }

    fn attach(d: &Design, node: NodeId) -> Result<Self, DesignError> {
        Ok(Self {
            node,
            anode: d.child(node, "anode")?,
            cathode: d.child(node, "cathode")?,
            forward_voltage: d.param(node, "forward_voltage")?,
            max_current: d.param(node, "max_current")?,
            current: d.param(node, "current")?,
            reverse_working_voltage: d.param(node, "reverse_working_voltage")?,
            reverse_leakage_current: d.param(node, "reverse_leakage_current")?,
        })
    }
}

/// Transient voltage suppressor.
#[derive(Debug, Clone, Copy)]
pub struct Tvs {
    pub diode: Diode,
    pub reverse_breakdown_voltage: ParamId,
    pub clamping_voltage: ParamId,
}

impl Tvs {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let diode = Diode::with_kind(d, parent, name, ModuleKind::Tvs)?;
        Ok(Self {
            diode,
            reverse_breakdown_voltage: d.add_param(diode.node, "reverse_breakdown_voltage", Parameter::Tbd),
            clamping_voltage: d.add_param(diode.node, "clamping_voltage", Parameter::Tbd),
        })
    }

    pub fn attach(d: &Design, node: NodeId) -> Result<Self, DesignError> {
        Ok(Self {
            diode: Diode::attach(d, node)?,
            reverse_breakdown_voltage: d.param(node, "reverse_breakdown_voltage")?,
            clamping_voltage: d.param(node, "clamping_voltage")?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Led {
    pub node: NodeId,
    pub anode: NodeId,
    pub cathode: NodeId,
    pub color: ParamId,
    pub brightness: ParamId,
    pub max_brightness: ParamId,
    pub forward_voltage: ParamId,
    pub max_current: ParamId,
}

impl Led {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::Led)?;
        let anode = electrical(d, node, "anode")?;
        let cathode = electrical(d, node, "cathode")?;
        d.add_trait(node, NodeTrait::CanBridge { input: anode, output: cathode });
        Ok(Self {
            node,
            anode,
            cathode,
            color: d.add_param(node, "color", Parameter::Tbd),
            brightness: d.add_param(node, "brightness", Parameter::Tbd),
            max_brightness: d.add_param(node, "max_brightness", Parameter::Tbd),
            forward_voltage: d.add_param(node, "forward_voltage", Parameter::Tbd),
            max_current: d.add_param(node, "max_current", Parameter::Tbd),
        })
    }

    pub fn set_color(&self, d: &mut Design, color: LedColor) -> Result<(), DesignError> {
        d.params.constrain(self.color, &Parameter::constant(color))?;
        Ok(())
    }

    pub fn set_brightness(&self, d: &mut Design, brightness: &Parameter) -> Result<(), DesignError> {
        d.params.constrain(self.brightness, brightness)?;
        Ok(())
    }
}

/// LED with a high-side current limiting resistor, powered from a rail.
///
/// The resistor value is derived from the rail voltage, the LED's forward
/// voltage and the wanted brightness once those are known.
#[derive(Debug, Clone, Copy)]
pub struct PoweredLed {
    pub node: NodeId,
    pub power: ElectricPower,
    pub current_limiting_resistor: Resistor,
    pub led: Led,
}

impl PoweredLed {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::PoweredLed)?;
        let power = ElectricPower::new(d, node, "power")?;
        // Declared before the LED so it is picked first.
        let current_limiting_resistor = Resistor::new(d, node, "current_limiting_resistor")?;
        let led = Led::new(d, node, "led")?;

        d.connect(power.hv, current_limiting_resistor.a)?;
        d.connect(current_limiting_resistor.b, led.anode)?;
        d.connect(led.cathode, power.lv)?;
        d.params.derive(
            current_limiting_resistor.resistance,
            DerivationRule::LedSeriesResistance,
            vec![
                power.voltage,
                led.forward_voltage,
                led.brightness,
                led.max_brightness,
                led.max_current,
            ],
        )?;
        d.add_trait(node, NodeTrait::CanBridge { input: power.hv, output: power.lv });

        Ok(Self {
            node,
            power,
            current_limiting_resistor,
            led,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picker::{pick_parts, PickOptions, PickerRegistry};
    use crate::units::Quantity;

    fn powered_led(voltage: f64, color: LedColor) -> (Design, PoweredLed) {
        let mut d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        let led = PoweredLed::new(&mut d, root, "led").unwrap();
        led.power.set_voltage(&mut d, Quantity::volts(voltage)).unwrap();
        led.led.set_color(&mut d, color).unwrap();
        led.led
            .set_brightness(&mut d, &Parameter::lit("10mcd..100mcd"))
            .unwrap();
        d.params.replace_tbd_with_any();
        (d, led)
    }

    #[test]
    fn test_green_on_3v3_picks_200_ohm() {
        let (mut d, led) = powered_led(3.3, LedColor::Green);
        let report = pick_parts(&mut d, &PickerRegistry::with_builtin(), &PickOptions::default()).unwrap();

        assert_eq!(d.picked_part(led.led.node).unwrap().lcsc, "C559120");
        assert_eq!(
            d.picked_part(led.current_limiting_resistor.node).unwrap().lcsc,
            "C25087"
        );
        assert!(report.backtracks >= 1, "100 ohm has to be rejected after the LED is known");
    }

    #[test]
    fn test_yellow_on_5v_picks_1k() {
        let (mut d, led) = powered_led(5.0, LedColor::Yellow);
        pick_parts(&mut d, &PickerRegistry::with_builtin(), &PickOptions::default()).unwrap();
        assert_eq!(d.picked_part(led.led.node).unwrap().lcsc, "C401114");
        assert_eq!(
            d.picked_part(led.current_limiting_resistor.node).unwrap().lcsc,
            "C11702"
        );
    }

    #[test]
    fn test_red_led_without_headroom_fails() {
        // Red is 2.4V forward, but 2V leaves no headroom at all.
        let (mut d, _) = powered_led(2.0, LedColor::Red);
        let err = pick_parts(&mut d, &PickerRegistry::with_builtin(), &PickOptions::default()).unwrap_err();
        assert!(matches!(err, crate::picker::PickError::NoSolution { .. }), "{}", err);
    }

    #[test]
    fn test_tvs_bridges_anode_to_cathode() {
        let mut d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        let tvs = Tvs::new(&mut d, root, "tvs").unwrap();
        assert_eq!(d.bridge(tvs.diode.node), Some((tvs.diode.anode, tvs.diode.cathode)));
        assert_eq!(d.module_kind(tvs.diode.node), Some(ModuleKind::Tvs));
        let again = Tvs::attach(&d, tvs.diode.node).unwrap();
        assert_eq!(again.clamping_voltage, tvs.clamping_voltage);
    }
}
