//! Hierarchical design graph.
//!
//! A design is a tree of modules and interfaces stored in a petgraph
//! `DiGraph`. `Child` edges form the hierarchy; `Connect` edges join
//! interfaces of the same kind. Parameters live in the design's
//! [`ParamStore`] and are referenced by id from the nodes that own them.
//!
//! Connecting two compound interfaces connects their children pairwise, and
//! connecting two power rails aliases their voltages.

pub mod kinds;
pub mod nets;

pub use kinds::{InterfaceKind, ModuleKind, NodeId, NodeKind, NodeTrait, PickedPart};
pub use nets::{Net, NetList};

use petgraph::graph::{DiGraph, EdgeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::params::{ParamId, ParamStore, Parameter, ParameterError};

/// Depth limit used when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum DesignError {
    #[error("Hierarchy deeper than {max_depth} levels at {path}")]
    DepthExceeded { path: String, max_depth: usize },

    #[error("{parent} already has a child named {name}")]
    DuplicateName { parent: String, name: String },

    #[error("{parent} has no child named {name}")]
    UnknownChild { parent: String, name: String },

    #[error("{node} has no parameter {name}")]
    UnknownParam { node: String, name: String },

    #[error("Cannot connect {left} to {right}: {detail}")]
    KindMismatch {
        left: String,
        right: String,
        detail: String,
    },

    #[error("{0} is not an interface")]
    NotAnInterface(String),

    #[error("{0} cannot be used as a bridge")]
    NotBridgeable(String),

    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

#[derive(Debug, Clone, Serialize)]
pub struct DesignNode {
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub params: BTreeMap<String, ParamId>,
    pub traits: Vec<NodeTrait>,
    depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DesignEdge {
    Child,
    Connect,
}

#[derive(Debug, Clone)]
pub struct Design {
    graph: DiGraph<DesignNode, DesignEdge>,
    root: NodeId,
    max_depth: usize,
    pub params: ParamStore,
}

impl Design {
    pub fn new(name: impl Into<String>, kind: ModuleKind) -> Self {
        Self::with_max_depth(name, kind, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(name: impl Into<String>, kind: ModuleKind, max_depth: usize) -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(DesignNode {
            name: name.into(),
            kind: NodeKind::Module(kind),
            parent: None,
            children: Vec::new(),
            params: BTreeMap::new(),
            traits: Vec::new(),
            depth: 0,
        });
        Self {
            graph,
            root,
            max_depth,
            params: ParamStore::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn node(&self, id: NodeId) -> &DesignNode {
        &self.graph[id]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.graph[id].name
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.graph[id].kind
    }

    pub fn module_kind(&self, id: NodeId) -> Option<ModuleKind> {
        self.graph[id].kind.module_kind()
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.graph[id].depth
    }

    pub fn add_module(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        kind: ModuleKind,
    ) -> Result<NodeId, DesignError> {
        self.add_child(parent, name.into(), NodeKind::Module(kind))
    }

    pub fn add_interface(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        kind: InterfaceKind,
    ) -> Result<NodeId, DesignError> {
        self.add_child(parent, name.into(), NodeKind::Interface(kind))
    }

    fn add_child(&mut self, parent: NodeId, name: String, kind: NodeKind) -> Result<NodeId, DesignError> {
        let depth = self.graph[parent].depth + 1;
        if depth > self.max_depth {
            return Err(DesignError::DepthExceeded {
                path: format!("{}.{}", self.path(parent), name),
                max_depth: self.max_depth,
            });
        }
        if self.find_child(parent, &name).is_some() {
            return Err(DesignError::DuplicateName {
                parent: self.path(parent),
                name,
            });
        }

        let id = self.graph.add_node(DesignNode {
            name,
            kind,
            parent: Some(parent),
            children: Vec::new(),
            params: BTreeMap::new(),
            traits: Vec::new(),
            depth,
        });
        self.graph.add_edge(parent, id, DesignEdge::Child);
        self.graph[parent].children.push(id);
        Ok(id)
    }

    /// Create a parameter owned by `node`. The store label is the full path.
    pub fn add_param(&mut self, node: NodeId, name: &str, initial: Parameter) -> ParamId {
        let label = format!("{}.{}", self.path(node), name);
        let id = self.params.new_param(label, initial);
        self.graph[node].params.insert(name.to_string(), id);
        id
    }

    pub fn param(&self, node: NodeId, name: &str) -> Result<ParamId, DesignError> {
        self.graph[node]
            .params
            .get(name)
            .copied()
            .ok_or_else(|| DesignError::UnknownParam {
                node: self.path(node),
                name: name.to_string(),
            })
    }

    pub fn param_value(&self, node: NodeId, name: &str) -> Result<&Parameter, DesignError> {
        Ok(self.params.value(self.param(node, name)?))
    }

    /// Narrow a named parameter of `node`.
    pub fn constrain(&mut self, node: NodeId, name: &str, constraint: &Parameter) -> Result<(), DesignError> {
        let id = self.param(node, name)?;
        self.params.constrain(id, constraint)?;
        Ok(())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.graph[node].parent
    }

    /// Children in insertion order.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.graph[node].children
    }

    fn find_child(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.graph[node]
            .children
            .iter()
            .copied()
            .find(|c| self.graph[*c].name == name)
    }

    pub fn child(&self, node: NodeId, name: &str) -> Result<NodeId, DesignError> {
        self.find_child(node, name).ok_or_else(|| DesignError::UnknownChild {
            parent: self.path(node),
            name: name.to_string(),
        })
    }

    /// Resolve a dotted relative path such as `resistor[0].unnamed[1]`.
    pub fn resolve(&self, node: NodeId, path: &str) -> Result<NodeId, DesignError> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(node, |current, segment| self.child(current, segment))
    }

    /// Dotted path from the root, e.g. `board.ldo.power_out.hv`.
    pub fn path(&self, node: NodeId) -> String {
        let mut segments = vec![self.graph[node].name.as_str()];
        let mut current = node;
        while let Some(parent) = self.graph[current].parent {
            segments.push(self.graph[parent].name.as_str());
            current = parent;
        }
        segments.reverse();
        segments.join(".")
    }

    /// Pre-order walk of the subtree below and including `node`.
    pub fn walk(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.graph[current].children.iter().rev().copied());
        }
        out
    }

    /// Every module in the design, pre-order.
    pub fn walk_modules(&self) -> Vec<NodeId> {
        self.walk(self.root)
            .into_iter()
            .filter(|n| self.graph[*n].kind.is_module())
            .collect()
    }

    pub fn traits(&self, node: NodeId) -> &[NodeTrait] {
        &self.graph[node].traits
    }

    pub fn add_trait(&mut self, node: NodeId, t: NodeTrait) {
        self.graph[node].traits.push(t);
    }

    pub fn traits_mut(&mut self, node: NodeId) -> &mut Vec<NodeTrait> {
        &mut self.graph[node].traits
    }

    pub fn picked_part(&self, node: NodeId) -> Option<&PickedPart> {
        self.graph[node].traits.iter().find_map(|t| match t {
            NodeTrait::PickedPart(p) => Some(p),
            _ => None,
        })
    }

    pub fn has_no_part(&self, node: NodeId) -> bool {
        self.graph[node].traits.iter().any(|t| matches!(t, NodeTrait::NoPart))
    }

    /// Whether an enclosing module's part or footprint already includes
    /// `node`. Modules hanging off an interface are never covered.
    pub fn is_covered(&self, node: NodeId) -> bool {
        let mut current = node;
        while let Some(parent) = self.graph[current].parent {
            if !self.graph[parent].kind.is_module() {
                return false;
            }
            if self.picked_part(parent).is_some() || self.footprint(parent).is_some() {
                return true;
            }
            current = parent;
        }
        false
    }

    pub fn footprint(&self, node: NodeId) -> Option<(&str, &BTreeMap<String, String>)> {
        self.graph[node].traits.iter().find_map(|t| match t {
            NodeTrait::Footprint { name, pinmap } => Some((name.as_str(), pinmap)),
            _ => None,
        })
    }

    /// Trait override first, then the module kind's default.
    pub fn designator_prefix(&self, node: NodeId) -> Option<String> {
        self.graph[node]
            .traits
            .iter()
            .find_map(|t| match t {
                NodeTrait::DesignatorPrefix(prefix) => Some(prefix.clone()),
                _ => None,
            })
            .or_else(|| {
                self.module_kind(node)
                    .and_then(|k| k.designator_prefix())
                    .map(str::to_string)
            })
    }

    pub fn bridge(&self, node: NodeId) -> Option<(NodeId, NodeId)> {
        self.graph[node].traits.iter().find_map(|t| match t {
            NodeTrait::CanBridge { input, output } => Some((*input, *output)),
            _ => None,
        })
    }

    pub fn net_names(&self, node: NodeId) -> impl Iterator<Item = &str> {
        self.graph[node].traits.iter().filter_map(|t| match t {
            NodeTrait::NetName(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Join two interfaces of the same kind, and recursively their children.
    ///
    /// Either everything gets connected or, on error, the design is left as
    /// it was: no connect edge stays behind and no parameter is aliased.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> Result<(), DesignError> {
        let edges = self.graph.edge_count();
        let checkpoint = self.params.checkpoint();
        let result = self.connect_recursive(a, b);
        if result.is_err() {
            // Edges added since `edges` are the last ones, so popping from
            // the back leaves every other edge index untouched.
            while self.graph.edge_count() > edges {
                self.graph.remove_edge(EdgeIndex::new(self.graph.edge_count() - 1));
            }
            self.params.rollback(checkpoint);
        }
        result
    }

    fn connect_recursive(&mut self, a: NodeId, b: NodeId) -> Result<(), DesignError> {
        if a == b {
            return Ok(());
        }
        let (ka, kb) = match (self.kind(a), self.kind(b)) {
            (NodeKind::Interface(ka), NodeKind::Interface(kb)) => (ka, kb),
            (NodeKind::Module(_), _) => return Err(DesignError::NotAnInterface(self.path(a))),
            (_, NodeKind::Module(_)) => return Err(DesignError::NotAnInterface(self.path(b))),
        };
        if ka != kb {
            return Err(DesignError::KindMismatch {
                left: self.path(a),
                right: self.path(b),
                detail: format!("{:?} vs {:?}", ka, kb),
            });
        }
        if self.is_directly_connected(a, b) {
            return Ok(());
        }
        self.graph.add_edge(a, b, DesignEdge::Connect);

        // Shared parameters (rail voltage) become one.
        let shared: Vec<(ParamId, ParamId)> = self.graph[a]
            .params
            .iter()
            .filter_map(|(name, pa)| self.graph[b].params.get(name).map(|pb| (*pa, *pb)))
            .collect();
        for (pa, pb) in shared {
            self.params.alias(pa, pb)?;
        }

        let pairs: Vec<(NodeId, String)> = self.graph[a]
            .children
            .iter()
            .filter(|c| !self.graph[**c].kind.is_module())
            .map(|c| (*c, self.graph[*c].name.clone()))
            .collect();
        for (child_a, name) in pairs {
            let child_b = self.find_child(b, &name).ok_or_else(|| DesignError::KindMismatch {
                left: self.path(a),
                right: self.path(b),
                detail: format!("missing {}", name),
            })?;
            self.connect_recursive(child_a, child_b)?;
        }
        Ok(())
    }

    /// Route `a` into the bridge module's input and its output into `b`.
    pub fn connect_via(&mut self, a: NodeId, bridge: NodeId, b: NodeId) -> Result<(), DesignError> {
        let (input, output) = self
            .bridge(bridge)
            .ok_or_else(|| DesignError::NotBridgeable(self.path(bridge)))?;
        self.connect(a, input)?;
        self.connect(output, b)
    }

    /// Override the name of the net `electrical` ends up in.
    pub fn name_net(&mut self, electrical: NodeId, name: impl Into<String>) -> Result<(), DesignError> {
        match self.kind(electrical) {
            NodeKind::Interface(InterfaceKind::Electrical) => {
                self.add_trait(electrical, NodeTrait::NetName(name.into()));
                Ok(())
            }
            _ => Err(DesignError::NotAnInterface(self.path(electrical))),
        }
    }

    fn is_directly_connected(&self, a: NodeId, b: NodeId) -> bool {
        self.graph
            .edges_connecting(a, b)
            .chain(self.graph.edges_connecting(b, a))
            .any(|e| *e.weight() == DesignEdge::Connect)
    }

    /// Interfaces directly connected to `node`.
    pub fn connections(&self, node: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .graph
            .edges_directed(node, petgraph::Direction::Outgoing)
            .chain(self.graph.edges_directed(node, petgraph::Direction::Incoming))
            .filter(|e| *e.weight() == DesignEdge::Connect)
            .map(|e| if e.source() == node { e.target() } else { e.source() })
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// All `Connect` edges as pairs.
    pub fn connect_edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.graph
            .edge_references()
            .filter(|e| *e.weight() == DesignEdge::Connect)
            .map(|e| (e.source(), e.target()))
    }

    /// Electrical interfaces in pre-order.
    pub fn electricals(&self) -> Vec<NodeId> {
        self.walk(self.root)
            .into_iter()
            .filter(|n| self.kind(*n) == NodeKind::Interface(InterfaceKind::Electrical))
            .collect()
    }

    pub fn nets(&self) -> NetList {
        NetList::build(self)
    }
}
