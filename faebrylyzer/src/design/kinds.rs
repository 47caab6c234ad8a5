//! Node kinds and traits of the design graph.

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type NodeId = NodeIndex;

/// Module types known to the library. Pickers are registered per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Board,
    ProbeModule,
    Resistor,
    ResistorArray,
    Capacitor,
    Led,
    PoweredLed,
    Diode,
    Tvs,
    Crystal,
    CrystalOscillator,
    Header,
    Ldo,
    Eeprom,
    Snx4lvc541a,
    Cbm9002a,
    Cbm9002aReferenceDesign,
    GenericBusProtection,
    SfpEdgeConnector,
    MountingSlot,
    Logo,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 21] = [
        ModuleKind::Board,
        ModuleKind::ProbeModule,
        ModuleKind::Resistor,
        ModuleKind::ResistorArray,
        ModuleKind::Capacitor,
        ModuleKind::Led,
        ModuleKind::PoweredLed,
        ModuleKind::Diode,
        ModuleKind::Tvs,
        ModuleKind::Crystal,
        ModuleKind::CrystalOscillator,
        ModuleKind::Header,
        ModuleKind::Ldo,
        ModuleKind::Eeprom,
        ModuleKind::Snx4lvc541a,
        ModuleKind::Cbm9002a,
        ModuleKind::Cbm9002aReferenceDesign,
        ModuleKind::GenericBusProtection,
        ModuleKind::SfpEdgeConnector,
        ModuleKind::MountingSlot,
        ModuleKind::Logo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Board => "board",
            ModuleKind::ProbeModule => "probe_module",
            ModuleKind::Resistor => "resistor",
            ModuleKind::ResistorArray => "resistor_array",
            ModuleKind::Capacitor => "capacitor",
            ModuleKind::Led => "led",
            ModuleKind::PoweredLed => "powered_led",
            ModuleKind::Diode => "diode",
            ModuleKind::Tvs => "tvs",
            ModuleKind::Crystal => "crystal",
            ModuleKind::CrystalOscillator => "crystal_oscillator",
            ModuleKind::Header => "header",
            ModuleKind::Ldo => "ldo",
            ModuleKind::Eeprom => "eeprom",
            ModuleKind::Snx4lvc541a => "snx4lvc541a",
            ModuleKind::Cbm9002a => "cbm9002a",
            ModuleKind::Cbm9002aReferenceDesign => "cbm9002a_reference_design",
            ModuleKind::GenericBusProtection => "generic_bus_protection",
            ModuleKind::SfpEdgeConnector => "sfp_edge_connector",
            ModuleKind::MountingSlot => "mounting_slot",
            ModuleKind::Logo => "logo",
        }
    }

    /// Default reference designator prefix. A `DesignatorPrefix` trait on
    /// the node takes precedence.
    pub fn designator_prefix(&self) -> Option<&'static str> {
        match self {
            ModuleKind::Resistor => Some("R"),
            ModuleKind::Capacitor => Some("C"),
            ModuleKind::Led => Some("LED"),
            ModuleKind::Diode | ModuleKind::Tvs => Some("D"),
            ModuleKind::Crystal => Some("XT"),
            ModuleKind::Header => Some("J"),
            ModuleKind::Ldo
            | ModuleKind::Eeprom
            | ModuleKind::Snx4lvc541a
            | ModuleKind::Cbm9002a => Some("U"),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    Electrical,
    ElectricPower,
    ElectricLogic,
    DifferentialPair,
    I2c,
    Usb2If,
    Usb2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "kind")]
pub enum NodeKind {
    Module(ModuleKind),
    Interface(InterfaceKind),
}

impl NodeKind {
    pub fn is_module(&self) -> bool {
        matches!(self, NodeKind::Module(_))
    }

    pub fn module_kind(&self) -> Option<ModuleKind> {
        match self {
            NodeKind::Module(k) => Some(*k),
            _ => None,
        }
    }

    pub fn interface_kind(&self) -> Option<InterfaceKind> {
        match self {
            NodeKind::Interface(k) => Some(*k),
            _ => None,
        }
    }
}

/// A concrete catalog part bound to a module, with pins resolved to
/// electrical interfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickedPart {
    pub lcsc: String,
    pub mpn: Option<String>,
    pub footprint: Option<String>,
    pub description: Option<String>,
    pub pinmap: BTreeMap<String, NodeId>,
}

/// Capabilities and facts attached to nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeTrait {
    DesignatorPrefix(String),
    /// Footprint defined by the module itself; pins map to child paths.
    Footprint {
        name: String,
        pinmap: BTreeMap<String, String>,
    },
    /// Two-terminal module usable with `connect_via`.
    CanBridge { input: NodeId, output: NodeId },
    Decoupled { capacitor: NodeId },
    Pulls { up: Option<NodeId>, down: Option<NodeId> },
    SurgeProtected { tvs: NodeId },
    NetName(String),
    PickedPart(PickedPart),
    /// The module has no physical part of its own.
    NoPart,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_unique() {
        let mut names: Vec<&str> = ModuleKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ModuleKind::ALL.len());
    }

    #[test]
    fn test_kind_serde_matches_as_str() {
        for kind in ModuleKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
