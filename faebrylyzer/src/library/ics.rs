//! Integrated circuits used on the board.

use crate::design::{Design, DesignError, ModuleKind, NodeId};
use crate::params::{ParamId, Parameter};
use crate::units::Quantity;

use super::interfaces::{connect_references, electrical, ElectricLogic, ElectricPower, I2c, Usb2};

/// Low-dropout linear regulator.
#[derive(Debug, Clone, Copy)]
pub struct Ldo {
    pub node: NodeId,
    pub power_in: ElectricPower,
    pub power_out: ElectricPower,
    pub output_voltage: ParamId,
    pub output_current: ParamId,
}

impl Ldo {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::Ldo)?;
        let power_in = ElectricPower::new(d, node, "power_in")?;
        let power_out = ElectricPower::new(d, node, "power_out")?;
        let output_voltage = d.add_param(node, "output_voltage", Parameter::Tbd);
        let output_current = d.add_param(node, "output_current", Parameter::Tbd);

        d.connect(power_in.lv, power_out.lv)?;
        d.params.alias(output_voltage, power_out.voltage)?;
        power_in.decouple(d)?;
        power_out.decouple(d)?;

        Ok(Self {
            node,
            power_in,
            power_out,
            output_voltage,
            output_current,
        })
    }

    pub fn set_output(&self, d: &mut Design, voltage: Quantity, current: Quantity) -> Result<(), DesignError> {
        d.params.constrain(self.output_voltage, &Parameter::constant(voltage))?;
        d.params.constrain(self.output_current, &Parameter::constant(current))?;
        Ok(())
    }
}

/// I2C EEPROM with three address straps and a write-protect input.
#[derive(Debug, Clone)]
pub struct Eeprom {
    pub node: NodeId,
    pub power: ElectricPower,
    pub i2c: I2c,
    pub write_protect: ElectricLogic,
    pub address: Vec<ElectricLogic>,
    pub memory_size: ParamId,
}

impl Eeprom {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::Eeprom)?;
        let power = ElectricPower::new(d, node, "power")?;
        let i2c = I2c::new(d, node, "i2c")?;
        let write_protect = ElectricLogic::new(d, node, "write_protect")?;
        let address = ElectricLogic::array(d, node, "address", 3)?;
        let memory_size = d.add_param(node, "memory_size", Parameter::Tbd);

        let mut logics = vec![i2c.sda, i2c.scl, write_protect];
        logics.extend(address.iter().copied());
        connect_references(d, &logics, &power)?;
        power.decouple(d)?;

        Ok(Self {
            node,
            power,
            i2c,
            write_protect,
            address,
            memory_size,
        })
    }

    /// Strap the address pins to the low three bits of `address`.
    pub fn set_address(&self, d: &mut Design, address: u8) -> Result<(), DesignError> {
        for (bit, pin) in self.address.iter().enumerate() {
            pin.set(d, (address >> bit) & 1 == 1)?;
        }
        Ok(())
    }

    pub fn set_memory_size(&self, d: &mut Design, size: Quantity) -> Result<(), DesignError> {
        d.params.constrain(self.memory_size, &Parameter::constant(size))?;
        Ok(())
    }
}

/// Octal buffer with 3-state outputs (SN74LVC541A).
#[derive(Debug, Clone)]
pub struct Snx4lvc541a {
    pub node: NodeId,
    pub a: Vec<ElectricLogic>,
    pub y: Vec<ElectricLogic>,
    pub oe: Vec<ElectricLogic>,
    pub vcc: ElectricPower,
}

impl Snx4lvc541a {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::Snx4lvc541a)?;
        let a = ElectricLogic::array(d, node, "a", 8)?;
        let y = ElectricLogic::array(d, node, "y", 8)?;
        let oe = ElectricLogic::array(d, node, "oe", 2)?;
        let vcc = ElectricPower::new(d, node, "vcc")?;

        for group in [&a, &y, &oe] {
            connect_references(d, group, &vcc)?;
        }
        vcc.decouple(d)?;

        Ok(Self { node, a, y, oe, vcc })
    }
}

/// CBM9002A USB microcontroller (FX2 compatible), 56-pin QFN.
#[derive(Debug, Clone)]
pub struct Cbm9002a {
    pub node: NodeId,
    pub pa: Vec<ElectricLogic>,
    pub pb: Vec<ElectricLogic>,
    pub pd: Vec<ElectricLogic>,
    pub usb: Usb2,
    pub i2c: I2c,
    pub avcc: ElectricPower,
    pub vcc: ElectricPower,
    pub rdy: Vec<ElectricLogic>,
    pub ctl: Vec<ElectricLogic>,
    pub reset: ElectricLogic,
    pub wakeup: ElectricLogic,
    pub ifclk: ElectricLogic,
    pub clkout: ElectricLogic,
    pub xtalin: NodeId,
    pub xtalout: NodeId,
}

impl Cbm9002a {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::Cbm9002a)?;
        let pa = ElectricLogic::array(d, node, "pa", 8)?;
        let pb = ElectricLogic::array(d, node, "pb", 8)?;
        let pd = ElectricLogic::array(d, node, "pd", 8)?;
        let usb = Usb2::new(d, node, "usb")?;
        let i2c = I2c::new(d, node, "i2c")?;
        let avcc = ElectricPower::new(d, node, "avcc")?;
        let vcc = ElectricPower::new(d, node, "vcc")?;
        let rdy = ElectricLogic::array(d, node, "rdy", 2)?;
        let ctl = ElectricLogic::array(d, node, "ctl", 3)?;
        let reset = ElectricLogic::new(d, node, "reset")?;
        let wakeup = ElectricLogic::new(d, node, "wakeup")?;
        let ifclk = ElectricLogic::new(d, node, "ifclk")?;
        let clkout = ElectricLogic::new(d, node, "clkout")?;
        let xtalin = electrical(d, node, "xtalin")?;
        let xtalout = electrical(d, node, "xtalout")?;

        let mut logics: Vec<ElectricLogic> = Vec::new();
        for group in [&pa, &pb, &pd, &rdy, &ctl] {
            logics.extend(group.iter().copied());
        }
        logics.extend([i2c.sda, i2c.scl, reset, wakeup, ifclk, clkout]);
        connect_references(d, &logics, &vcc)?;
        d.connect(avcc.lv, vcc.lv)?;

        Ok(Self {
            node,
            pa,
            pb,
            pd,
            usb,
            i2c,
            avcc,
            vcc,
            rdy,
            ctl,
            reset,
            wakeup,
            ifclk,
            clkout,
            xtalin,
            xtalout,
        })
    }
}
