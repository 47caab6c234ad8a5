//! Modules that carry their own footprint.

use std::collections::BTreeMap;

use crate::design::{Design, DesignError, ModuleKind, NodeId, NodeTrait};

use super::interfaces::electrical;

fn manual_footprint(d: &mut Design, node: NodeId, prefix: &str, footprint: &str, pinmap: BTreeMap<String, String>) {
    d.add_trait(node, NodeTrait::DesignatorPrefix(prefix.to_string()));
    d.add_trait(
        node,
        NodeTrait::Footprint {
            name: footprint.to_string(),
            pinmap,
        },
    );
}

/// 20-pin SFP style card edge.
#[derive(Debug, Clone)]
pub struct SfpEdgeConnector {
    pub node: NodeId,
    pub unnamed: Vec<NodeId>,
}

impl SfpEdgeConnector {
    pub const PIN_COUNT: usize = 20;

    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::SfpEdgeConnector)?;
        let mut unnamed = Vec::with_capacity(Self::PIN_COUNT);
        let mut pinmap = BTreeMap::new();
        for i in 0..Self::PIN_COUNT {
            let pin = format!("unnamed[{}]", i);
            unnamed.push(electrical(d, node, &pin)?);
            pinmap.insert((i + 1).to_string(), pin);
        }
        manual_footprint(d, node, "J", "custom:SFP_Edge", pinmap);
        Ok(Self { node, unnamed })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MountingSlot {
    pub node: NodeId,
    pub unnamed: NodeId,
}

impl MountingSlot {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::MountingSlot)?;
        let unnamed = electrical(d, node, "unnamed")?;
        let pinmap = BTreeMap::from([("1".to_string(), "unnamed".to_string())]);
        manual_footprint(d, node, "H", "custom:MountingSlot", pinmap);
        Ok(Self { node, unnamed })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Logo {
    pub node: NodeId,
}

impl Logo {
    pub fn new(d: &mut Design, parent: NodeId, name: &str) -> Result<Self, DesignError> {
        let node = d.add_module(parent, name, ModuleKind::Logo)?;
        manual_footprint(d, node, "LOGO", "custom:faebryk_logo", BTreeMap::new());
        Ok(Self { node })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_connector_footprint() {
        let mut d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        let edge = SfpEdgeConnector::new(&mut d, root, "cardedge_connector").unwrap();
        let (name, pinmap) = d.footprint(edge.node).unwrap();
        assert_eq!(name, "custom:SFP_Edge");
        assert_eq!(pinmap.len(), 20);
        assert_eq!(d.resolve(edge.node, &pinmap["20"]).unwrap(), edge.unnamed[19]);
        assert_eq!(d.designator_prefix(edge.node).as_deref(), Some("J"));
    }

    #[test]
    fn test_logo_has_no_pins() {
        let mut d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        let logo = Logo::new(&mut d, root, "logo").unwrap();
        let (name, pinmap) = d.footprint(logo.node).unwrap();
        assert_eq!(name, "custom:faebryk_logo");
        assert!(pinmap.is_empty());
    }
}
