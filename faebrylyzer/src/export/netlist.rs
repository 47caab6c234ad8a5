//! KiCad-flavoured netlist of the picked design.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::sexp::SExp;
use crate::design::{Design, NetList, NodeId};

#[derive(Debug, Clone, Serialize)]
pub struct Component {
    pub reference: String,
    pub value: String,
    pub footprint: Option<String>,
    pub lcsc: Option<String>,
    /// Module path in the design.
    pub path: String,
    #[serde(skip)]
    pub pins: BTreeMap<String, NodeId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetlistNet {
    pub code: usize,
    pub name: String,
    /// `(reference, pin)` pairs.
    pub nodes: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Netlist {
    pub components: Vec<Component>,
    pub nets: Vec<NetlistNet>,
}

impl Netlist {
    /// Collect placed parts and the nets between their pins.
    ///
    /// References are numbered per designator prefix in hierarchy order.
    pub fn build(design: &Design, nets: &NetList) -> Self {
        let mut counters: HashMap<String, usize> = HashMap::new();
        let mut components = Vec::new();

        for module in design.walk_modules() {
            if design.is_covered(module) || design.has_no_part(module) {
                continue;
            }
            let Some(prefix) = design.designator_prefix(module) else {
                continue;
            };

            let (value, footprint, lcsc, pins) = if let Some(part) = design.picked_part(module) {
                let value = part
                    .mpn
                    .clone()
                    .or_else(|| part.description.clone())
                    .unwrap_or_else(|| part.lcsc.clone());
                (value, part.footprint.clone(), Some(part.lcsc.clone()), part.pinmap.clone())
            } else if let Some((name, pinmap)) = design.footprint(module) {
                let pins = pinmap
                    .iter()
                    .filter_map(|(pin, path)| design.resolve(module, path).ok().map(|n| (pin.clone(), n)))
                    .collect();
                let value = design
                    .module_kind(module)
                    .map(|k| k.as_str().to_string())
                    .unwrap_or_default();
                (value, Some(name.to_string()), None, pins)
            } else {
                continue;
            };

            let counter = counters.entry(prefix.clone()).or_default();
            *counter += 1;
            components.push(Component {
                reference: format!("{}{}", prefix, counter),
                value,
                footprint,
                lcsc,
                path: design.path(module),
                pins,
            });
        }

        let mut by_net: BTreeMap<usize, Vec<(String, String)>> = BTreeMap::new();
        for component in &components {
            for (pin, node) in &component.pins {
                if let Some(index) = nets.index_of(*node) {
                    by_net
                        .entry(index)
                        .or_default()
                        .push((component.reference.clone(), pin.clone()));
                }
            }
        }
        let netlist_nets = by_net
            .into_iter()
            .enumerate()
            .map(|(i, (index, nodes))| NetlistNet {
                code: i + 1,
                name: nets.nets[index].name.clone(),
                nodes,
            })
            .collect();

        Self {
            components,
            nets: netlist_nets,
        }
    }

    pub fn component(&self, reference: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.reference == reference)
    }

    pub fn component_at(&self, path: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.path == path)
    }

    pub fn net(&self, name: &str) -> Option<&NetlistNet> {
        self.nets.iter().find(|n| n.name == name)
    }

    pub fn to_sexp(&self, source: &str, date: DateTime<Utc>) -> SExp {
        let design = SExp::list(
            "design",
            [
                SExp::field("source", source),
                SExp::field("date", date.to_rfc3339()),
                SExp::field("tool", format!("faebrylyzer {}", env!("CARGO_PKG_VERSION"))),
            ],
        );

        let components = SExp::list(
            "components",
            self.components.iter().map(|c| {
                let mut fields = vec![SExp::field("ref", &c.reference), SExp::field("value", &c.value)];
                if let Some(footprint) = &c.footprint {
                    fields.push(SExp::field("footprint", footprint));
                }
                if let Some(lcsc) = &c.lcsc {
                    fields.push(SExp::list(
                        "property",
                        [SExp::field("name", "LCSC"), SExp::field("value", lcsc)],
                    ));
                }
                fields.push(SExp::field("sheetpath", &c.path));
                SExp::list("comp", fields)
            }),
        );

        let nets = SExp::list(
            "nets",
            self.nets.iter().map(|n| {
                let mut fields = vec![
                    SExp::field("code", n.code.to_string()),
                    SExp::field("name", &n.name),
                ];
                fields.extend(n.nodes.iter().map(|(reference, pin)| {
                    SExp::list("node", [SExp::field("ref", reference), SExp::field("pin", pin)])
                }));
                SExp::list("net", fields)
            }),
        );

        SExp::list("export", [SExp::field("version", "E"), design, components, nets])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{ModuleKind, NodeTrait, PickedPart};
    use crate::export::sexp;
    use crate::library::{Capacitor, Resistor};

    fn pick(d: &mut Design, node: NodeId, lcsc: &str, a: NodeId, b: NodeId) {
        d.add_trait(
            node,
            NodeTrait::PickedPart(PickedPart {
                lcsc: lcsc.to_string(),
                mpn: None,
                footprint: Some("0402".to_string()),
                description: None,
                pinmap: BTreeMap::from([("1".to_string(), a), ("2".to_string(), b)]),
            }),
        );
    }

    fn divider() -> Design {
        let mut d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        let r1 = Resistor::new(&mut d, root, "top").unwrap();
        let r2 = Resistor::new(&mut d, root, "bottom").unwrap();
        let c = Capacitor::new(&mut d, root, "filter").unwrap();
        d.connect(r1.b, r2.a).unwrap();
        d.connect(r2.a, c.a).unwrap();
        d.connect(r2.b, c.b).unwrap();
        d.name_net(r1.b, "mid").unwrap();
        pick(&mut d, r1.node, "C25744", r1.a, r1.b);
        pick(&mut d, r2.node, "C25744", r2.a, r2.b);
        pick(&mut d, c.node, "C1525", c.a, c.b);
        d
    }

    #[test]
    fn test_references_numbered_per_prefix() {
        let d = divider();
        let netlist = Netlist::build(&d, &d.nets());
        let refs: Vec<&str> = netlist.components.iter().map(|c| c.reference.as_str()).collect();
        assert_eq!(refs, vec!["R1", "R2", "C1"]);
        assert_eq!(netlist.component("R2").unwrap().path, "board.bottom");
    }

    #[test]
    fn test_nets_list_component_pins() {
        let d = divider();
        let netlist = Netlist::build(&d, &d.nets());
        let mid = netlist.net("mid").unwrap();
        assert_eq!(
            mid.nodes,
            vec![
                ("R1".to_string(), "2".to_string()),
                ("R2".to_string(), "1".to_string()),
                ("C1".to_string(), "1".to_string()),
            ]
        );
        // top.a is connected to nothing and has no net.
        assert_eq!(netlist.nets.len(), 2);
    }

    #[test]
    fn test_sexp_structure() {
        let d = divider();
        let netlist = Netlist::build(&d, &d.nets());
        let text = netlist.to_sexp("board", Utc::now()).to_pretty();
        let parsed = sexp::parse(&text).unwrap();

        assert_eq!(parsed.head(), Some("export"));
        assert_eq!(parsed.value_of("version"), Some("E"));
        let comps = parsed.get("components").unwrap().get_all("comp");
        assert_eq!(comps.len(), 3);
        assert_eq!(comps[2].value_of("ref"), Some("C1"));
        assert_eq!(comps[2].value_of("value"), Some("C1525"));
        let nets = parsed.get("nets").unwrap().get_all("net");
        assert_eq!(nets.len(), 2);
        let mid = nets.iter().find(|n| n.value_of("name") == Some("mid")).unwrap();
        assert_eq!(mid.get_all("node").len(), 3);
    }
}
