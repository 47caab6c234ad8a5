//! Design rule checks run after part picking.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::design::{Design, NetList, NodeId, NodeTrait};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Suggestion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    /// Path of the module concerned.
    pub component: Option<String>,
    pub net: Option<String>,
    pub suggestion: Option<String>,
}

/// What the rules look at.
pub struct RuleContext<'a> {
    pub design: &'a Design,
    pub nets: &'a NetList,
    pub strict: bool,
}

pub trait Rule: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn severity(&self) -> Severity;
    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Issue>;

    fn issue(&self, message: String) -> Issue {
        Issue {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: self.id().to_string(),
            severity: self.severity(),
            message,
            component: None,
            net: None,
            suggestion: None,
        }
    }
}

pub struct RulesEngine {
    rules: Vec<Arc<dyn Rule>>,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Arc::new(UnpickedPartRule));
        engine.add_rule(Arc::new(NetNameConflictRule));
        engine.add_rule(Arc::new(DecouplingRule));
        engine.add_rule(Arc::new(FloatingPinRule));
        engine.add_rule(Arc::new(UnresolvedParameterRule));
        engine
    }

    pub fn add_rule(&mut self, rule: Arc<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn analyze(&self, ctx: &RuleContext<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        for rule in &self.rules {
            let found = rule.check(ctx);
            if !found.is_empty() {
                tracing::debug!("{}: {} issues", rule.id(), found.len());
            }
            issues.extend(found);
        }
        issues
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

/// Modules that end up as a physical part on the board.
fn physical_modules(design: &Design) -> impl Iterator<Item = NodeId> + '_ {
    design.walk_modules().into_iter().filter(move |m| {
        design.designator_prefix(*m).is_some() && !design.has_no_part(*m) && !design.is_covered(*m)
    })
}

pub struct UnpickedPartRule;

impl Rule for UnpickedPartRule {
    fn id(&self) -> &str {
        "unpicked_part"
    }

    fn name(&self) -> &str {
        "Unpicked part"
    }

    fn description(&self) -> &str {
        "Every physical module needs a catalog part or a footprint"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Issue> {
        let design = ctx.design;
        physical_modules(design)
            .filter(|m| design.picked_part(*m).is_none() && design.footprint(*m).is_none())
            .map(|m| {
                let path = design.path(m);
                let mut issue = self.issue(format!("{} has no part and no footprint", path));
                issue.component = Some(path);
                issue.suggestion = Some("Add a catalog entry for this module kind".to_string());
                issue
            })
            .collect()
    }
}

pub struct NetNameConflictRule;

impl Rule for NetNameConflictRule {
    fn id(&self) -> &str {
        "net_name_conflict"
    }

    fn name(&self) -> &str {
        "Net name conflict"
    }

    fn description(&self) -> &str {
        "A net was given several names, or two nets share a name"
    }

    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        for net in ctx.nets.nets.iter().filter(|n| n.has_name_conflict()) {
            let mut issue = self.issue(format!(
                "Net {} was named {}",
                net.name,
                net.requested_names.join(", ")
            ));
            issue.net = Some(net.name.clone());
            issue.suggestion = Some("Keep one name per connected set of pins".to_string());
            issues.push(issue);
        }
        for name in ctx.nets.duplicate_names() {
            let mut issue = self.issue(format!("Several unconnected nets are named {}", name));
            issue.net = Some(name.to_string());
            issues.push(issue);
        }
        issues
    }
}

pub struct DecouplingRule;

impl Rule for DecouplingRule {
    fn id(&self) -> &str {
        "decoupling"
    }

    fn name(&self) -> &str {
        "Decoupling capacitor value"
    }

    fn description(&self) -> &str {
        "Decoupling capacitors should have a decided capacitance"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Issue> {
        let design = ctx.design;
        let mut issues = Vec::new();
        for node in design.walk(design.root()) {
            for t in design.traits(node) {
                let NodeTrait::Decoupled { capacitor } = t else {
                    continue;
                };
                let concrete = design
                    .param_value(*capacitor, "capacitance")
                    .map(|p| p.is_concrete())
                    .unwrap_or(false);
                if !concrete {
                    let path = design.path(*capacitor);
                    let mut issue = self.issue(format!(
                        "Decoupling capacitor {} of {} has no capacitance",
                        path,
                        design.path(node)
                    ));
                    issue.component = Some(path);
                    issue.suggestion = Some("Use set_capacitance_for_decoupling_capacitors".to_string());
                    issues.push(issue);
                }
            }
        }
        issues
    }
}

pub struct FloatingPinRule;

impl Rule for FloatingPinRule {
    fn id(&self) -> &str {
        "floating_pin"
    }

    fn name(&self) -> &str {
        "Floating pin"
    }

    fn description(&self) -> &str {
        "A pin of a placed part is not connected to anything"
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Issue> {
        let design = ctx.design;
        let mut issues = Vec::new();
        for module in design.walk_modules() {
            let pins: Vec<(String, NodeId)> = match (design.picked_part(module), design.footprint(module)) {
                (Some(part), _) => part.pinmap.iter().map(|(p, n)| (p.clone(), *n)).collect(),
                (None, Some((_, pinmap))) => pinmap
                    .iter()
                    .filter_map(|(p, path)| design.resolve(module, path).ok().map(|n| (p.clone(), n)))
                    .collect(),
                (None, None) => continue,
            };
            for (pin, node) in pins {
                let connected = ctx.nets.net_of(node).map(|n| n.members.len() > 1).unwrap_or(false);
                if !connected {
                    let path = design.path(module);
                    let mut issue = self.issue(format!(
                        "Pin {} of {} ({}) is not connected",
                        pin,
                        path,
                        design.path(node)
                    ));
                    issue.component = Some(path);
                    issues.push(issue);
                }
            }
        }
        issues
    }
}

pub struct UnresolvedParameterRule;

impl Rule for UnresolvedParameterRule {
    fn id(&self) -> &str {
        "unresolved_parameter"
    }

    fn name(&self) -> &str {
        "Unresolved parameter"
    }

    fn description(&self) -> &str {
        "A picked module still has an unconstrained parameter (strict mode only)"
    }

    fn severity(&self) -> Severity {
        Severity::Suggestion
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<Issue> {
        if !ctx.strict {
            return Vec::new();
        }
        let design = ctx.design;
        let mut issues = Vec::new();
        for module in design.walk_modules() {
            if design.picked_part(module).is_none() {
                continue;
            }
            for (name, id) in &design.node(module).params {
                if design.params.value(*id).is_unconstrained() {
                    let path = design.path(module);
                    let mut issue = self.issue(format!("{}.{} was never constrained", path, name));
                    issue.component = Some(path);
                    issues.push(issue);
                }
            }
        }
        issues
    }
}
