//! Net inference from the connection graph.

use petgraph::unionfind::UnionFind;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::{Design, NodeId};

/// A set of electricals that end up galvanically connected.
#[derive(Debug, Clone, Serialize)]
pub struct Net {
    pub name: String,
    /// Every explicit name given to members, sorted. More than one means
    /// the design asked for conflicting names.
    pub requested_names: Vec<String>,
    pub members: Vec<NodeId>,
}

impl Net {
    pub fn has_name_conflict(&self) -> bool {
        self.requested_names.len() > 1
    }

    pub fn is_named(&self) -> bool {
        !self.requested_names.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NetList {
    pub nets: Vec<Net>,
    #[serde(skip)]
    index: HashMap<NodeId, usize>,
}

impl NetList {
    /// Group electricals by connectivity.
    ///
    /// Nets with a single unnamed member are left out. A net with several
    /// requested names takes the lexicographically smallest; unnamed nets
    /// are named after their shallowest member.
    pub fn build(design: &Design) -> Self {
        let electricals = design.electricals();
        let slot: HashMap<NodeId, usize> = electricals.iter().enumerate().map(|(i, n)| (*n, i)).collect();

        let mut uf = UnionFind::<usize>::new(electricals.len());
        for (a, b) in design.connect_edges() {
            if let (Some(ia), Some(ib)) = (slot.get(&a), slot.get(&b)) {
                uf.union(*ia, *ib);
            }
        }

        let mut groups: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
        for (i, node) in electricals.iter().enumerate() {
            groups.entry(uf.find(i)).or_default().push(*node);
        }

        let mut nets = Vec::new();
        for members in groups.into_values() {
            let mut requested: Vec<String> = members
                .iter()
                .flat_map(|m| design.net_names(*m).map(str::to_string).collect::<Vec<_>>())
                .collect();
            requested.sort();
            requested.dedup();

            if members.len() < 2 && requested.is_empty() {
                continue;
            }

            let name = match requested.first() {
                Some(name) => name.clone(),
                None => auto_name(design, &members),
            };
            if requested.len() > 1 {
                tracing::warn!("Net {} has conflicting names: {}", name, requested.join(", "));
            }
            nets.push(Net {
                name,
                requested_names: requested,
                members,
            });
        }
        nets.sort_by(|a, b| a.name.cmp(&b.name));

        let mut index = HashMap::new();
        for (i, net) in nets.iter().enumerate() {
            for member in &net.members {
                index.insert(*member, i);
            }
        }
        tracing::debug!("Inferred {} nets from {} electricals", nets.len(), electricals.len());
        Self { nets, index }
    }

    pub fn net_of(&self, electrical: NodeId) -> Option<&Net> {
        self.index_of(electrical).map(|i| &self.nets[i])
    }

    /// Position in [`NetList::nets`] of the net holding `electrical`.
    pub fn index_of(&self, electrical: NodeId) -> Option<usize> {
        self.index.get(&electrical).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&Net> {
        self.nets.iter().find(|n| n.name == name)
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    /// Names carried by more than one net.
    pub fn duplicate_names(&self) -> Vec<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for net in &self.nets {
            *counts.entry(net.name.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(name, _)| name)
            .collect()
    }
}

fn auto_name(design: &Design, members: &[NodeId]) -> String {
    let best = members
        .iter()
        .map(|m| (design.depth(*m), design.path(*m)))
        .min()
        .map(|(_, path)| path)
        .unwrap_or_default();
    // Drop the root segment; it is the same for every net.
    let trimmed = best.split_once('.').map(|(_, rest)| rest).unwrap_or(&best);
    format!("N-{}", trimmed.replace('.', "-"))
}
