//! Arena of parameters with aliasing, derivations and an undo trail.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::derive::{Derivation, DerivationRule};
use super::{Parameter, ParameterError};

/// Upper bound on propagation passes; each pass narrows at least one
/// parameter, so hitting this means a rule keeps shrinking a range forever.
const MAX_PROPAGATION_PASSES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamId(usize);

impl ParamId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Position in the undo trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

#[derive(Debug, Clone)]
struct Slot {
    label: String,
    parent: usize,
    rank: u32,
    /// Only meaningful on class roots.
    value: Parameter,
}

#[derive(Debug, Clone)]
enum TrailEntry {
    Value { slot: usize, previous: Parameter },
    Link { child: usize, root: usize, previous_rank: u32 },
}

/// Union-find over parameters.
///
/// No path compression, so every link is a single trail entry and
/// [`ParamStore::rollback`] can undo it exactly. Union by rank keeps finds
/// logarithmic.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    slots: Vec<Slot>,
    trail: Vec<TrailEntry>,
    derivations: Vec<Derivation>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_param(&mut self, label: impl Into<String>, initial: Parameter) -> ParamId {
        let idx = self.slots.len();
        self.slots.push(Slot {
            label: label.into(),
            parent: idx,
            rank: 0,
            value: initial,
        });
        ParamId(idx)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn label(&self, id: ParamId) -> &str {
        &self.slots[id.0].label
    }

    fn find(&self, mut idx: usize) -> usize {
        while self.slots[idx].parent != idx {
            idx = self.slots[idx].parent;
        }
        idx
    }

    /// Current constraint of the parameter's equivalence class.
    pub fn value(&self, id: ParamId) -> &Parameter {
        &self.slots[self.find(id.0)].value
    }

    pub fn same_class(&self, a: ParamId, b: ParamId) -> bool {
        self.find(a.0) == self.find(b.0)
    }

    /// Narrow a parameter. Returns whether its value changed.
    pub fn constrain(&mut self, id: ParamId, constraint: &Parameter) -> Result<bool, ParameterError> {
        let root = self.find(id.0);
        let current = &self.slots[root].value;
        let merged = current
            .merge(constraint)
            .map_err(|e| e.with_label(&self.slots[id.0].label))?;
        if &merged == current {
            return Ok(false);
        }
        self.set_value(root, merged);
        Ok(true)
    }

    /// Make two parameters one: both will report the intersection of their
    /// constraints from now on.
    pub fn alias(&mut self, a: ParamId, b: ParamId) -> Result<(), ParameterError> {
        let ra = self.find(a.0);
        let rb = self.find(b.0);
        if ra == rb {
            return Ok(());
        }

        let merged = self.slots[ra]
            .value
            .merge(&self.slots[rb].value)
            .map_err(|e| {
                e.with_label(&format!("{} = {}", self.slots[a.0].label, self.slots[b.0].label))
            })?;

        let (root, child) = if self.slots[ra].rank >= self.slots[rb].rank {
            (ra, rb)
        } else {
            (rb, ra)
        };
        let previous_rank = self.slots[root].rank;
        self.trail.push(TrailEntry::Link {
            child,
            root,
            previous_rank,
        });
        self.slots[child].parent = root;
        if self.slots[root].rank == self.slots[child].rank {
            self.slots[root].rank += 1;
        }
        if merged != self.slots[root].value {
            self.set_value(root, merged);
        }
        Ok(())
    }

    fn set_value(&mut self, root: usize, value: Parameter) {
        let previous = std::mem::replace(&mut self.slots[root].value, value);
        self.trail.push(TrailEntry::Value {
            slot: root,
            previous,
        });
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.trail.len())
    }

    /// Undo every constraint and alias recorded since `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        while self.trail.len() > checkpoint.0 {
            match self.trail.pop() {
                Some(TrailEntry::Value { slot, previous }) => {
                    self.slots[slot].value = previous;
                }
                Some(TrailEntry::Link {
                    child,
                    root,
                    previous_rank,
                }) => {
                    self.slots[child].parent = child;
                    self.slots[root].rank = previous_rank;
                }
                None => break,
            }
        }
    }

    /// Register a rule computing a constraint on `output` from `inputs`.
    pub fn derive(
        &mut self,
        output: ParamId,
        rule: DerivationRule,
        inputs: Vec<ParamId>,
    ) -> Result<(), ParameterError> {
        if inputs.len() != rule.arity() {
            return Err(ParameterError::Arity {
                rule: rule.name(),
                label: self.label(output).to_string(),
                expected: rule.arity(),
                got: inputs.len(),
            });
        }
        self.derivations.push(Derivation { rule, inputs, output });
        Ok(())
    }

    pub fn derivations(&self) -> &[Derivation] {
        &self.derivations
    }

    /// Evaluate derivations until nothing narrows any more.
    ///
    /// Returns the number of constraints that changed.
    pub fn propagate(&mut self) -> Result<usize, ParameterError> {
        let mut total = 0;
        for _ in 0..MAX_PROPAGATION_PASSES {
            let mut changed = 0;
            for i in 0..self.derivations.len() {
                let derivation = &self.derivations[i];
                let inputs: Vec<&Parameter> = derivation.inputs.iter().map(|id| self.value(*id)).collect();
                let Some(constraint) = derivation
                    .rule
                    .evaluate(&inputs)
                    .map_err(|e| e.with_label(self.label(derivation.output)))?
                else {
                    continue;
                };
                let output = derivation.output;
                if self.constrain(output, &constraint)? {
                    changed += 1;
                }
            }
            if changed == 0 {
                return Ok(total);
            }
            total += changed;
        }
        tracing::warn!(
            "Parameter propagation did not settle after {} passes",
            MAX_PROPAGATION_PASSES
        );
        Ok(total)
    }

    /// Turn every class still `Tbd` into `Any`. Returns how many classes changed.
    pub fn replace_tbd_with_any(&mut self) -> usize {
        let mut replaced = 0;
        for idx in 0..self.slots.len() {
            if self.slots[idx].parent == idx && self.slots[idx].value.is_tbd() {
                tracing::debug!("{} tbd -> any", self.slots[idx].label);
                self.set_value(idx, Parameter::Any);
                replaced += 1;
            }
        }
        replaced
    }

    /// Every parameter id in creation order.
    pub fn ids(&self) -> impl Iterator<Item = ParamId> {
        (0..self.slots.len()).map(ParamId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Quantity;

    fn p(s: &str) -> Parameter {
        Parameter::lit(s)
    }

    #[test]
    fn test_constrain_narrows() {
        let mut store = ParamStore::new();
        let v = store.new_param("vcc.voltage", Parameter::Tbd);
        assert!(store.constrain(v, &p("3V..5V")).unwrap());
        assert!(store.constrain(v, &p("3.3V")).unwrap());
        assert!(!store.constrain(v, &p("3V..5V")).unwrap());
        assert_eq!(store.value(v), &p("3.3V"));
    }

    #[test]
    fn test_conflict_names_the_parameter() {
        let mut store = ParamStore::new();
        let r = store.new_param("r1.resistance", p("100ohm"));
        let err = store.constrain(r, &p("200ohm")).unwrap_err();
        assert!(err.to_string().contains("r1.resistance"), "{}", err);
        assert_eq!(store.value(r), &p("100ohm"));
    }

    #[test]
    fn test_alias_shares_constraints() {
        let mut store = ParamStore::new();
        let a = store.new_param("a", Parameter::Tbd);
        let b = store.new_param("b", p("4V..6V"));
        let c = store.new_param("c", Parameter::Tbd);
        store.alias(a, b).unwrap();
        store.alias(c, a).unwrap();
        assert_eq!(store.value(c), &p("4V..6V"));

        store.constrain(c, &p("5V")).unwrap();
        assert_eq!(store.value(a), &p("5V"));
        assert_eq!(store.value(b), &p("5V"));
        assert!(store.same_class(a, c));
    }

    #[test]
    fn test_alias_conflict_leaves_classes_apart() {
        let mut store = ParamStore::new();
        let a = store.new_param("vbus.voltage", p("5V"));
        let b = store.new_param("3v3.voltage", p("3.3V"));
        assert!(store.alias(a, b).is_err());
        assert!(!store.same_class(a, b));
        assert_eq!(store.value(a), &p("5V"));
    }

    #[test]
    fn test_rollback_restores_values_and_aliases() {
        let mut store = ParamStore::new();
        let a = store.new_param("a", Parameter::Tbd);
        let b = store.new_param("b", Parameter::Tbd);
        store.constrain(a, &p("1V..10V")).unwrap();

        let cp = store.checkpoint();
        store.alias(a, b).unwrap();
        store.constrain(b, &p("3.3V")).unwrap();
        assert_eq!(store.value(a), &p("3.3V"));

        store.rollback(cp);
        assert!(!store.same_class(a, b));
        assert_eq!(store.value(a), &p("1V..10V"));
        assert_eq!(store.value(b), &Parameter::Tbd);
    }

    #[test]
    fn test_nested_checkpoints() {
        let mut store = ParamStore::new();
        let a = store.new_param("a", Parameter::Any);
        let outer = store.checkpoint();
        store.constrain(a, &p("1V..5V")).unwrap();
        let inner = store.checkpoint();
        store.constrain(a, &p("2V")).unwrap();
        store.rollback(inner);
        assert_eq!(store.value(a), &p("1V..5V"));
        store.rollback(outer);
        assert_eq!(store.value(a), &Parameter::Any);
    }

    #[test]
    fn test_replace_tbd_with_any() {
        let mut store = ParamStore::new();
        let a = store.new_param("a", Parameter::Tbd);
        let b = store.new_param("b", Parameter::Tbd);
        let c = store.new_param("c", p("1V"));
        store.alias(a, b).unwrap();
        assert_eq!(store.replace_tbd_with_any(), 1);
        assert_eq!(store.value(a), &Parameter::Any);
        assert_eq!(store.value(b), &Parameter::Any);
        assert_eq!(store.value(c), &p("1V"));
    }

    #[test]
    fn test_propagate_at_least() {
        let mut store = ParamStore::new();
        let rail = store.new_param("rail.voltage", Parameter::Any);
        let rated = store.new_param("cap.rated_voltage", Parameter::Any);
        store
            .derive(rated, DerivationRule::AtLeast { margin: 1.0 }, vec![rail])
            .unwrap();

        // Nothing to compute from yet
        assert_eq!(store.propagate().unwrap(), 0);
        assert_eq!(store.value(rated), &Parameter::Any);

        store.constrain(rail, &p("5V")).unwrap();
        assert_eq!(store.propagate().unwrap(), 1);
        assert_eq!(store.value(rated), &Parameter::at_least(Quantity::volts(5.0)));
        assert!(store.constrain(rated, &p("4V")).is_err());
    }

    #[test]
    fn test_derive_checks_arity() {
        let mut store = ParamStore::new();
        let out = store.new_param("r.resistance", Parameter::Any);
        let err = store
            .derive(out, DerivationRule::LedSeriesResistance, vec![out])
            .unwrap_err();
        assert!(matches!(err, ParameterError::Arity { expected: 5, got: 1, .. }));
    }
}
