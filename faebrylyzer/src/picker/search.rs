//! Backtracking part selection over the whole design.

use serde::Serialize;
use std::collections::BTreeMap;

use super::{PickError, PickerRegistry};
use crate::catalog::{PickStrategy, PickerOption};
use crate::design::{Design, InterfaceKind, ModuleKind, NodeId, NodeKind, NodeTrait, PickedPart};
use crate::params::{Checkpoint, ParamId, Parameter};

/// Default number of candidate attempts before the search gives up.
pub const DEFAULT_MAX_STEPS: usize = 100_000;

#[derive(Debug, Clone)]
pub struct PickOptions {
    pub max_steps: usize,
}

impl Default for PickOptions {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PickRecord {
    pub path: String,
    pub kind: ModuleKind,
    pub picker: String,
    pub lcsc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpn: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PickReport {
    pub picks: Vec<PickRecord>,
    pub manual_footprints: Vec<String>,
    pub no_part: Vec<String>,
    pub steps: usize,
    pub backtracks: usize,
}

struct Candidate<'a> {
    picker: &'a str,
    option: &'a PickerOption,
    params: Vec<(ParamId, &'a Parameter)>,
    pins: BTreeMap<String, NodeId>,
}

struct Target<'a> {
    module: NodeId,
    kind: ModuleKind,
    candidates: Vec<Candidate<'a>>,
}

#[derive(Default)]
struct Collected {
    targets: Vec<(NodeId, ModuleKind)>,
    manual: Vec<NodeId>,
    no_part: Vec<NodeId>,
}

/// Assign a catalog part to every module that needs one.
///
/// Targets are visited in hierarchy order and each takes the first candidate
/// compatible with the constraints so far. When a target runs out of
/// candidates the previous target moves on to its next candidate. All
/// parameter changes made by a rejected candidate are rolled back.
pub fn pick_parts(
    design: &mut Design,
    registry: &PickerRegistry,
    options: &PickOptions,
) -> Result<PickReport, PickError> {
    let mut collected = Collected::default();
    let root = design.root();
    collect(design, registry, root, false, &mut collected)?;
    tracing::info!(
        "Picking parts for {} modules ({} manual footprints, {} without part)",
        collected.targets.len(),
        collected.manual.len(),
        collected.no_part.len()
    );

    design.params.propagate()?;

    let mut targets = Vec::with_capacity(collected.targets.len());
    for (module, kind) in &collected.targets {
        targets.push(Target {
            module: *module,
            kind: *kind,
            candidates: prepare_candidates(design, registry, *module, *kind)?,
        });
    }

    let mut report = PickReport::default();
    let choices = search(design, &targets, options, &mut report)?;

    for (target, choice) in targets.iter().zip(choices) {
        let candidate = &target.candidates[choice];
        let part = &candidate.option.part;
        tracing::debug!("{} -> {}", design.path(target.module), part.lcsc);
        report.picks.push(PickRecord {
            path: design.path(target.module),
            kind: target.kind,
            picker: candidate.picker.to_string(),
            lcsc: part.lcsc.clone(),
            mpn: part.mpn.clone(),
        });
        design.add_trait(
            target.module,
            NodeTrait::PickedPart(PickedPart {
                lcsc: part.lcsc.clone(),
                mpn: part.mpn.clone(),
                footprint: part.footprint.clone(),
                description: part.description.clone(),
                pinmap: candidate.pins.clone(),
            }),
        );
    }
    for module in collected.manual {
        if design.footprint(module).is_none() {
            tracing::warn!("{} is marked manual footprint but defines none", design.path(module));
        }
        report.manual_footprints.push(design.path(module));
    }
    for module in collected.no_part {
        if !design.has_no_part(module) {
            design.add_trait(module, NodeTrait::NoPart);
        }
        report.no_part.push(design.path(module));
    }

    tracing::info!(
        "Picked {} parts in {} steps with {} backtracks",
        report.picks.len(),
        report.steps,
        report.backtracks
    );
    Ok(report)
}

/// Walk the hierarchy looking for modules that need a part.
///
/// The subtree of a module that gets a part is covered by that part, except
/// for helper modules hanging off its interfaces, which are parts of their own.
fn collect(
    design: &Design,
    registry: &PickerRegistry,
    node: NodeId,
    covered: bool,
    out: &mut Collected,
) -> Result<(), PickError> {
    let Some(kind) = design.module_kind(node) else {
        for child in design.children(node) {
            let attached = design.kind(*child).is_module();
            collect(design, registry, *child, covered && !attached, out)?;
        }
        return Ok(());
    };

    let mut covers = covered;
    if !covered {
        if design.picked_part(node).is_some() {
            tracing::debug!("{} already has a part", design.path(node));
            covers = true;
        } else {
            match registry.strategy_for(kind) {
                Some(PickStrategy::Catalog) => {
                    out.targets.push((node, kind));
                    covers = true;
                }
                Some(PickStrategy::ManualFootprint) => {
                    out.manual.push(node);
                    covers = true;
                }
                Some(PickStrategy::NoFootprint) => out.no_part.push(node),
                None => {
                    let has_modules = design.children(node).iter().any(|c| design.kind(*c).is_module());
                    if !has_modules && design.footprint(node).is_none() {
                        return Err(PickError::NoPicker {
                            path: design.path(node),
                            kind,
                        });
                    }
                }
            }
        }
    }

    for child in design.children(node) {
        collect(design, registry, *child, covers, out)?;
    }
    Ok(())
}

/// Resolve parameter names and pinmaps of every option once, up front.
fn prepare_candidates<'a>(
    design: &Design,
    registry: &'a PickerRegistry,
    module: NodeId,
    kind: ModuleKind,
) -> Result<Vec<Candidate<'a>>, PickError> {
    let mut candidates = Vec::new();
    'options: for (picker, option) in registry.candidates_for(kind) {
        let mut params = Vec::with_capacity(option.params.len());
        for (name, value) in &option.params {
            params.push((design.param(module, name)?, value));
        }

        let mut pins = BTreeMap::new();
        for (pin, path) in &option.pinmap {
            match design.resolve(module, path) {
                Ok(node) if design.kind(node) == NodeKind::Interface(InterfaceKind::Electrical) => {
                    pins.insert(pin.clone(), node);
                }
                _ => {
                    tracing::warn!(
                        "Skipping {} for {}: pin {} maps to unknown electrical {}",
                        option.part.lcsc,
                        design.path(module),
                        pin,
                        path
                    );
                    continue 'options;
                }
            }
        }
        candidates.push(Candidate {
            picker,
            option,
            params,
            pins,
        });
    }
    Ok(candidates)
}

/// Apply a candidate's parameters. `Ok(false)` means it does not fit.
fn try_candidate(design: &mut Design, candidate: &Candidate<'_>) -> Result<bool, PickError> {
    for (id, value) in &candidate.params {
        if !value.is_subset_of(design.params.value(*id)) {
            tracing::trace!(
                "{} rejected: {} = {} not within {}",
                candidate.option.part.lcsc,
                design.params.label(*id),
                value,
                design.params.value(*id)
            );
            return Ok(false);
        }
    }
    for (id, value) in &candidate.params {
        if let Err(e) = design.params.constrain(*id, value) {
            tracing::trace!("{} rejected: {}", candidate.option.part.lcsc, e);
            return Ok(false);
        }
    }
    match design.params.propagate() {
        Ok(_) => Ok(true),
        Err(e) => {
            tracing::trace!("{} rejected after propagation: {}", candidate.option.part.lcsc, e);
            Ok(false)
        }
    }
}

fn describe_params(design: &Design, module: NodeId) -> String {
    design
        .node(module)
        .params
        .iter()
        .map(|(name, id)| format!("{}={}", name, design.params.value(*id)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn search(
    design: &mut Design,
    targets: &[Target<'_>],
    options: &PickOptions,
    report: &mut PickReport,
) -> Result<Vec<usize>, PickError> {
    let mut choices: Vec<(usize, Checkpoint)> = Vec::with_capacity(targets.len());
    let mut next = 0usize;
    // Deepest target that ran out of candidates, with its parameters then.
    let mut deepest: Option<(usize, String)> = None;

    while choices.len() < targets.len() {
        let index = choices.len();
        let target = &targets[index];

        let mut chosen = None;
        for (i, candidate) in target.candidates.iter().enumerate().skip(next) {
            report.steps += 1;
            if report.steps > options.max_steps {
                return Err(PickError::BudgetExhausted {
                    max_steps: options.max_steps,
                    path: design.path(target.module),
                });
            }
            let checkpoint = design.params.checkpoint();
            if try_candidate(design, candidate)? {
                chosen = Some((i, checkpoint));
                break;
            }
            design.params.rollback(checkpoint);
        }

        match chosen {
            Some(choice) => {
                choices.push(choice);
                next = 0;
            }
            None => {
                if deepest.as_ref().map(|(d, _)| index >= *d).unwrap_or(true) {
                    deepest = Some((index, describe_params(design, target.module)));
                }
                let Some((previous, checkpoint)) = choices.pop() else {
                    let (at, params) = deepest.unwrap_or((index, String::new()));
                    return Err(PickError::NoSolution {
                        path: design.path(targets[at].module),
                        kind: targets[at].kind,
                        params,
                    });
                };
                design.params.rollback(checkpoint);
                next = previous + 1;
                report.backtracks += 1;
                tracing::debug!(
                    "Backtracking from {} to {}",
                    design.path(target.module),
                    design.path(targets[choices.len()].module)
                );
            }
        }
    }

    Ok(choices.into_iter().map(|(i, _)| i).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, CatalogPart};

    fn option(lcsc: &str, params: &[(&str, &str)]) -> PickerOption {
        PickerOption {
            part: CatalogPart {
                lcsc: lcsc.to_string(),
                mpn: None,
                footprint: None,
                description: None,
            },
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), Parameter::lit(v)))
                .collect(),
            pinmap: BTreeMap::new(),
        }
    }

    fn registry(kind: ModuleKind, options: Vec<PickerOption>) -> PickerRegistry {
        let mut registry = PickerRegistry::new();
        registry.register_entries(vec![CatalogEntry {
            name: format!("test_{}", kind),
            kind,
            priority: 0,
            strategy: PickStrategy::Catalog,
            options,
        }]);
        registry
    }

    fn resistor(d: &mut Design, name: &str) -> (NodeId, ParamId) {
        let root = d.root();
        let r = d.add_module(root, name, ModuleKind::Resistor).unwrap();
        let p = d.add_param(r, "resistance", Parameter::Any);
        (r, p)
    }

    #[test]
    fn test_picks_first_compatible_option() {
        let mut d = Design::new("board", ModuleKind::Board);
        let (r, p) = resistor(&mut d, "r");
        d.params.constrain(p, &Parameter::lit("150ohm..5kohm")).unwrap();
        let reg = registry(
            ModuleKind::Resistor,
            vec![
                option("C1", &[("resistance", "100ohm")]),
                option("C2", &[("resistance", "1kohm")]),
                option("C3", &[("resistance", "2kohm")]),
            ],
        );

        let report = pick_parts(&mut d, &reg, &PickOptions::default()).unwrap();
        assert_eq!(report.picks.len(), 1);
        assert_eq!(report.picks[0].lcsc, "C2");
        assert_eq!(d.picked_part(r).unwrap().lcsc, "C2");
        assert_eq!(d.params.value(p), &Parameter::lit("1kohm"));
    }

    #[test]
    fn test_backtracks_when_later_target_conflicts() {
        use crate::params::DerivationRule;

        let mut d = Design::new("board", ModuleKind::Board);
        let (_, out) = resistor(&mut d, "first");
        let root = d.root();
        let second = d.add_module(root, "second", ModuleKind::Capacitor).unwrap();
        let cap = d.add_param(second, "capacitance", Parameter::Any);
        // first.resistance >= second.capacitance, only known once second is picked.
        d.params
            .derive(out, DerivationRule::AtLeast { margin: 1.0 }, vec![cap])
            .unwrap();

        let mut reg = registry(
            ModuleKind::Resistor,
            vec![
                option("R1", &[("resistance", "100ohm")]),
                option("R2", &[("resistance", "10kohm")]),
            ],
        );
        reg.register_entries(vec![CatalogEntry {
            name: "caps".to_string(),
            kind: ModuleKind::Capacitor,
            priority: 0,
            strategy: PickStrategy::Catalog,
            options: vec![option("C1", &[("capacitance", "1kohm")])],
        }]);

        let report = pick_parts(&mut d, &reg, &PickOptions::default()).unwrap();
        let lcsc: Vec<&str> = report.picks.iter().map(|p| p.lcsc.as_str()).collect();
        assert_eq!(lcsc, vec!["R2", "C1"]);
        assert_eq!(report.backtracks, 1);
    }

    #[test]
    fn test_no_solution_names_module() {
        let mut d = Design::new("board", ModuleKind::Board);
        let (_, p) = resistor(&mut d, "r");
        d.params.constrain(p, &Parameter::lit("47ohm")).unwrap();
        let reg = registry(ModuleKind::Resistor, vec![option("C1", &[("resistance", "100ohm")])]);

        match pick_parts(&mut d, &reg, &PickOptions::default()) {
            Err(PickError::NoSolution { path, params, .. }) => {
                assert_eq!(path, "board.r");
                assert!(params.contains("resistance=47Ω"), "params were {}", params);
            }
            other => panic!("expected NoSolution, got {:?}", other.map(|r| r.picks.len())),
        }
        // Nothing leaked from the failed attempts.
        assert_eq!(d.params.value(p), &Parameter::lit("47ohm"));
    }

    #[test]
    fn test_budget_exhausted() {
        let mut d = Design::new("board", ModuleKind::Board);
        for i in 0..3 {
            resistor(&mut d, &format!("r{}", i));
        }
        let reg = registry(ModuleKind::Resistor, vec![option("C1", &[("resistance", "100ohm")])]);
        let err = pick_parts(&mut d, &reg, &PickOptions { max_steps: 2 }).unwrap_err();
        assert!(matches!(err, PickError::BudgetExhausted { max_steps: 2, .. }));
    }

    #[test]
    fn test_missing_picker_for_leaf() {
        let mut d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        d.add_module(root, "d", ModuleKind::Diode).unwrap();
        let reg = registry(ModuleKind::Resistor, vec![option("C1", &[])]);
        let err = pick_parts(&mut d, &reg, &PickOptions::default()).unwrap_err();
        assert!(matches!(err, PickError::NoPicker { kind: ModuleKind::Diode, .. }));
    }

    #[test]
    fn test_pinmap_resolves_to_electricals() {
        let mut d = Design::new("board", ModuleKind::Board);
        let (r, _) = resistor(&mut d, "r");
        let a = d.add_interface(r, "unnamed[0]", InterfaceKind::Electrical).unwrap();
        let b = d.add_interface(r, "unnamed[1]", InterfaceKind::Electrical).unwrap();
        let mut good = option("GOOD", &[]);
        good.pinmap = BTreeMap::from([("1".to_string(), "unnamed[0]".to_string()), ("2".to_string(), "unnamed[1]".to_string())]);
        let mut bad = option("BAD", &[]);
        bad.pinmap = BTreeMap::from([("1".to_string(), "anode".to_string())]);
        let reg = registry(ModuleKind::Resistor, vec![bad, good]);

        pick_parts(&mut d, &reg, &PickOptions::default()).unwrap();
        let part = d.picked_part(r).unwrap();
        assert_eq!(part.lcsc, "GOOD");
        assert_eq!(part.pinmap["1"], a);
        assert_eq!(part.pinmap["2"], b);
    }

    #[test]
    fn test_helpers_on_interfaces_are_picked_separately() {
        let mut d = Design::new("board", ModuleKind::Board);
        let root = d.root();
        let ldo = d.add_module(root, "ldo", ModuleKind::Ldo).unwrap();
        let rail = d.add_interface(ldo, "power_out", InterfaceKind::ElectricPower).unwrap();
        let cap = d.add_module(rail, "decoupling_cap", ModuleKind::Capacitor).unwrap();
        d.add_param(cap, "capacitance", Parameter::Any);
        // Internal submodule of the LDO, covered by the LDO's own part.
        d.add_module(ldo, "internal", ModuleKind::Capacitor).unwrap();

        let mut reg = registry(ModuleKind::Ldo, vec![option("U1", &[])]);
        reg.register_entries(vec![CatalogEntry {
            name: "caps".to_string(),
            kind: ModuleKind::Capacitor,
            priority: 0,
            strategy: PickStrategy::Catalog,
            options: vec![option("C1", &[("capacitance", "100nF")])],
        }]);

        let report = pick_parts(&mut d, &reg, &PickOptions::default()).unwrap();
        let paths: Vec<&str> = report.picks.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["board.ldo", "board.ldo.power_out.decoupling_cap"]);
    }
}
