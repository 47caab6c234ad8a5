//! Library of reusable modules and interfaces.
//!
//! Every constructor adds its subtree to a [`Design`](crate::design::Design)
//! under a parent node and returns a handle holding the node and parameter
//! ids of what it created.

pub mod circuits;
pub mod ics;
pub mod interfaces;
pub mod mechanical;
pub mod passives;
pub mod semiconductors;

pub use circuits::{Cbm9002aReferenceDesign, CrystalOscillator, GenericBusProtection};
pub use ics::{Cbm9002a, Eeprom, Ldo, Snx4lvc541a};
pub use interfaces::{DifferentialPair, ElectricLogic, ElectricPower, I2c, Usb2, Usb2If};
pub use mechanical::{Logo, MountingSlot, SfpEdgeConnector};
pub use passives::{Capacitor, Crystal, Header, Resistor, ResistorArray};
pub use semiconductors::{Diode, Led, PoweredLed, Tvs};
