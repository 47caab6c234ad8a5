//! The logic analyzer probe board.
//!
//! [`LogicAnalyzerBoard::new`] instantiates every module of the board into a
//! design, wires it up and applies the board level constraints. Part picking
//! and export happen afterwards, see [`FaebrylyzerCore::build_design`](crate::core::FaebrylyzerCore::build_design).

use crate::design::{Design, DesignError, ModuleKind, NodeId, NodeTrait};
use crate::library::{
    Capacitor, Cbm9002aReferenceDesign, ElectricLogic, ElectricPower, Eeprom, GenericBusProtection, I2c, Ldo, Logo,
    MountingSlot, PoweredLed, Resistor, ResistorArray, SfpEdgeConnector, Snx4lvc541a, Usb2,
};
use crate::params::{LedColor, Parameter};
use crate::units::{Quantity, Unit};

/// Number of probe channels on the card edge.
pub const CHANNEL_COUNT: usize = 8;
/// Channels with an activity LED on the buffer output.
pub const CHANNEL_LED_COUNT: usize = 2;

/// Card edge plug carrying the probe channels and USB.
#[derive(Debug, Clone)]
pub struct ProbeModule {
    pub node: NodeId,
    pub cardedge_connector: SfpEdgeConnector,
    pub keys: MountingSlot,
    pub usb: Usb2,
    pub channels: Vec<ElectricLogic>,
}

impl ProbeModule {
    const GND_PINS: [usize; 6] = [0, 9, 10, 13, 16, 19];
    const VBUS_PINS: [usize; 2] = [14, 15];
    const USB_DP_PIN: usize = 12;
    const USB_DN_PIN: usize = 11;

    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::ProbeModule)?;
        let cardedge_connector = SfpEdgeConnector::new(d, node, "cardedge_connector")?;
        let keys = MountingSlot::new(d, node, "keys")?;
        let usb = Usb2::new(d, node, "usb")?;
        let channels = ElectricLogic::array(d, node, "channels", CHANNEL_COUNT)?;

        let pins = &cardedge_connector.unnamed;
        let vbus = usb.vbus();
        for pin in Self::GND_PINS {
            d.connect(pins[pin], vbus.lv)?;
        }
        for pin in Self::VBUS_PINS {
            d.connect(pins[pin], vbus.hv)?;
        }
        for (i, channel) in channels.iter().enumerate() {
            d.connect(pins[i + 1], channel.signal)?;
        }
        d.connect(pins[Self::USB_DP_PIN], usb.usb_if.d.p)?;
        d.connect(pins[Self::USB_DN_PIN], usb.usb_if.d.n)?;

        Ok(Self {
            node,
            cardedge_connector,
            keys,
            usb,
            channels,
        })
    }
}

/// Handles to every top level block of the board.
#[derive(Debug, Clone)]
pub struct LogicAnalyzerBoard {
    pub power_led: PoweredLed,
    pub status_led: PoweredLed,
    pub channel_leds: Vec<PoweredLed>,
    pub ldo: Ldo,
    pub probe_module: ProbeModule,
    pub mcu: Cbm9002aReferenceDesign,
    pub buffer: Snx4lvc541a,
    pub eeprom: Eeprom,
    pub input_current_limiting_resistor: Vec<ResistorArray>,
    pub mcu_current_limiting_resistor: Vec<ResistorArray>,
    pub input_pullup_resistor: Vec<ResistorArray>,
    pub usb_protection: GenericBusProtection,
    pub logo: Logo,
    pub usb: Usb2,
    pub vbus: ElectricPower,
    pub v3_3: ElectricPower,
    pub i2c: I2c,
}

fn resistor_arrays(d: &mut Design, parent: NodeId, name: &str) -> Result<Vec<ResistorArray>, DesignError> {
    (0..CHANNEL_COUNT / 4)
        .map(|i| ResistorArray::new(d, parent, &format!("{}[{}]", name, i)))
        .collect()
}

/// Resistor `i` of a bank of 4-resistor arrays, counting down within each
/// array so the array pinout runs in channel order.
fn bank_resistor(bank: &[ResistorArray], i: usize) -> Resistor {
    bank[i / 4].resistors[3 - i % 4]
}

impl LogicAnalyzerBoard {
    /// Build the board under the root of `d`.
    pub fn new(d: &mut Design) -> Result<Self, DesignError> {
        let root = d.root();

        let power_led = PoweredLed::new(d, root, "power_led")?;
        let status_led = PoweredLed::new(d, root, "status_led")?;
        let channel_leds = (0..CHANNEL_LED_COUNT)
            .map(|i| PoweredLed::new(d, root, &format!("channel_leds[{}]", i)))
            .collect::<Result<Vec<_>, _>>()?;
        let ldo = Ldo::new(d, root, "ldo")?;
        let probe_module = ProbeModule::new(d, root, "probe_module")?;
        let mcu = Cbm9002aReferenceDesign::new(d, root, "mcu")?;
        let buffer = Snx4lvc541a::new(d, root, "buffer")?;
        let eeprom = Eeprom::new(d, root, "eeprom")?;
        let input_current_limiting_resistor = resistor_arrays(d, root, "input_current_limiting_resistor")?;
        let mcu_current_limiting_resistor = resistor_arrays(d, root, "mcu_current_limiting_resistor")?;
        let input_pullup_resistor = resistor_arrays(d, root, "input_pullup_resistor")?;
        let usb_protection = GenericBusProtection::new(d, root, "usb_protection")?;
        let logo = Logo::new(d, root, "faebryk_logo")?;
        let usb = Usb2::new(d, root, "usb")?;

        let vbus = usb.vbus();
        let v3_3 = ldo.power_out;
        let gnd = vbus.lv;
        let i2c = mcu.mcu.i2c;

        d.name_net(vbus.hv, "vbus")?;
        d.name_net(v3_3.hv, "3v3")?;
        d.name_net(gnd, "gnd")?;
        d.name_net(usb.usb_if.d.p, "usb_P")?;
        d.name_net(usb.usb_if.d.n, "usb_N")?;
        d.name_net(i2c.sda.signal, "sda")?;
        d.name_net(i2c.scl.signal, "scl")?;
        for (i, channel) in probe_module.channels.iter().enumerate() {
            d.name_net(channel.signal, &format!("ch_{}", i))?;
            d.name_net(buffer.y[i].signal, &format!("buffer_out_{}", i))?;
            d.name_net(buffer.a[i].signal, &format!("buffer_in_{}", i))?;
            d.name_net(mcu.mcu.pb[i].signal, &format!("mcu_logic_{}", i))?;
        }

        // Power
        d.connect(ldo.power_in.node, vbus.node)?;
        d.connect(mcu.mcu.avcc.node, v3_3.node)?;
        d.connect(mcu.mcu.vcc.node, v3_3.node)?;
        d.connect(buffer.vcc.node, v3_3.node)?;
        d.connect(eeprom.power.node, v3_3.node)?;
        d.connect(probe_module.usb.node, usb.node)?;
        vbus.protect(d)?;
        v3_3.protect(d)?;

        d.connect_via(usb.node, usb_protection.node, mcu.mcu.usb.node)?;

        // LEDs
        d.connect_via(mcu.mcu.pa[1].signal, status_led.node, gnd)?;
        d.params.alias(status_led.power.voltage, v3_3.voltage)?;
        for (i, led) in channel_leds.iter().enumerate() {
            d.connect_via(buffer.y[i].signal, led.node, gnd)?;
            d.params.alias(led.power.voltage, v3_3.voltage)?;
        }
        d.connect(power_led.power.node, vbus.node)?;

        // EEPROM
        d.connect(i2c.node, eeprom.i2c.node)?;
        eeprom.write_protect.set(d, false)?;
        eeprom.set_address(d, 0)?;

        // Probe channels: limiter into the buffer input with a pull-up, then
        // a second limiter from the buffer output to the MCU port.
        for (i, channel) in probe_module.channels.iter().enumerate() {
            let limiter = bank_resistor(&input_current_limiting_resistor, i);
            let pullup = bank_resistor(&input_pullup_resistor, i);
            let mcu_limiter = bank_resistor(&mcu_current_limiting_resistor, i);
            d.connect_via(channel.signal, limiter.node, buffer.a[i].signal)?;
            d.connect_via(buffer.a[i].signal, pullup.node, v3_3.hv)?;
            d.connect_via(buffer.y[i].signal, mcu_limiter.node, mcu.mcu.pb[i].signal)?;
        }
        for oe in &buffer.oe {
            d.connect(oe.signal, gnd)?;
        }

        // MCU
        d.connect(mcu.mcu.usb.node, probe_module.usb.node)?;
        mcu.mcu.wakeup.set(d, true)?;

        let board = Self {
            power_led,
            status_led,
            channel_leds,
            ldo,
            probe_module,
            mcu,
            buffer,
            eeprom,
            input_current_limiting_resistor,
            mcu_current_limiting_resistor,
            input_pullup_resistor,
            usb_protection,
            logo,
            usb,
            vbus,
            v3_3,
            i2c,
        };
        board.apply_parameters(d)?;
        Ok(board)
    }

    fn apply_parameters(&self, d: &mut Design) -> Result<(), DesignError> {
        for array in &self.input_current_limiting_resistor {
            array.set_resistance(d, Quantity::ohms(100.0))?;
        }
        for array in &self.mcu_current_limiting_resistor {
            array.set_resistance(d, Quantity::ohms(100.0))?;
        }
        for array in &self.input_pullup_resistor {
            array.set_resistance(d, Quantity::ohms(100e3))?;
        }

        let indicator = Parameter::range(Quantity::candela(10e-3), Quantity::candela(100e-3));
        self.power_led.led.set_color(d, LedColor::Yellow)?;
        self.status_led.led.set_color(d, LedColor::Green)?;
        for led in &self.channel_leds {
            led.led.set_color(d, LedColor::Green)?;
        }
        for led in [&self.power_led, &self.status_led].into_iter().chain(&self.channel_leds) {
            led.led.set_brightness(d, &indicator)?;
        }

        self.ldo
            .set_output(d, Quantity::volts(3.3), Quantity::amperes(0.25))?;
        self.eeprom
            .set_memory_size(d, Quantity::new(256e3, Unit::Byte))?;
        self.mcu
            .oscillator
            .set_load_capacitance(d, Quantity::farads(15e-12))?;

        let root = d.root();
        set_capacitance_for_decoupling_capacitors(d, root, Quantity::farads(100e-9))?;
        set_resistance_for_pull_resistors(d, root, Quantity::ohms(3.3e3))?;
        Ok(())
    }
}

/// Give every decoupling capacitor under `node` whose capacitance is still
/// undecided the value `capacitance`. Returns how many were set.
pub fn set_capacitance_for_decoupling_capacitors(
    d: &mut Design,
    node: NodeId,
    capacitance: Quantity,
) -> Result<usize, DesignError> {
    let capacitors: Vec<NodeId> = d
        .walk(node)
        .into_iter()
        .flat_map(|n| d.traits(n).to_vec())
        .filter_map(|t| match t {
            NodeTrait::Decoupled { capacitor } => Some(capacitor),
            _ => None,
        })
        .collect();

    let mut count = 0;
    for capacitor in capacitors {
        let cap = Capacitor::attach(d, capacitor)?;
        if d.params.value(cap.capacitance).is_tbd() {
            cap.set_capacitance(d, capacitance)?;
            count += 1;
        }
    }
    tracing::debug!("Set {} decoupling capacitors to {}", count, capacitance);
    Ok(count)
}

/// Give every pull resistor under `node` whose resistance is still undecided
/// the value `resistance`. Returns how many were set.
pub fn set_resistance_for_pull_resistors(
    d: &mut Design,
    node: NodeId,
    resistance: Quantity,
) -> Result<usize, DesignError> {
    let resistors: Vec<NodeId> = d
        .walk(node)
        .into_iter()
        .flat_map(|n| d.traits(n).to_vec())
        .flat_map(|t| match t {
            NodeTrait::Pulls { up, down } => vec![up, down],
            _ => Vec::new(),
        })
        .flatten()
        .collect();

    let mut count = 0;
    for resistor in resistors {
        let r = Resistor::attach(d, resistor)?;
        if d.params.value(r.resistance).is_tbd() {
            r.set_resistance(d, resistance)?;
            count += 1;
        }
    }
    tracing::debug!("Set {} pull resistors to {}", count, resistance);
    Ok(count)
}

/// Fresh design holding the complete board.
pub fn make_design(max_depth: usize) -> Result<(Design, LogicAnalyzerBoard), DesignError> {
    let mut design = Design::with_max_depth("app", ModuleKind::Board, max_depth);
    let board = LogicAnalyzerBoard::new(&mut design)?;
    Ok((design, board))
}
