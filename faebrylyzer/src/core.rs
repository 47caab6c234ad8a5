//! Build pipeline shared by the CLI, the examples and the tests.
//! Construct the board, pick parts, run checks, write artifacts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::board::{make_design, LogicAnalyzerBoard};
use crate::catalog::CatalogError;
use crate::checks::{Issue, RuleContext, RulesEngine, Severity};
use crate::design::{Design, DesignError, DEFAULT_MAX_DEPTH};
use crate::export::{self, parameters_markdown, write_artifact, Netlist};
use crate::params::ParameterError;
use crate::picker::{pick_parts, PickError, PickOptions, PickReport, PickerRegistry, DEFAULT_MAX_STEPS};
use crate::units::UnitError;

#[derive(Debug, thiserror::Error)]
pub enum FaebrylyzerError {
    #[error("Unit error: {0}")]
    Unit(#[from] UnitError),
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),
    #[error("Design error: {0}")]
    Design(#[from] DesignError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Catalog directory {0} does not exist")]
    CatalogDirectory(PathBuf),
    #[error("Picking failed: {0}")]
    Pick(#[from] PickError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Options for a build run (CLI, examples, tests).
#[derive(Clone, Debug)]
pub struct BuildOptions {
    pub build_dir: PathBuf,
    /// Extra catalog JSON files, tried after the built-in tables.
    pub catalog_dir: Option<PathBuf>,
    pub export_parameters: bool,
    pub write_report: bool,
    pub strict: bool,
    pub max_depth: usize,
    pub max_steps: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
            catalog_dir: None,
            export_parameters: false,
            write_report: false,
            strict: false,
            max_depth: DEFAULT_MAX_DEPTH,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildStats {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub modules: usize,
    pub parts: usize,
    pub nets: usize,
    pub steps: usize,
    pub backtracks: usize,
}

/// Everything a build produced. Serialized as the JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub board: String,
    pub generated_at: DateTime<Utc>,
    pub picks: PickReport,
    pub netlist: Netlist,
    pub issues: Vec<Issue>,
    pub stats: BuildStats,
    pub catalog_warnings: Vec<String>,
    pub artifacts: Vec<PathBuf>,
}

impl BuildResult {
    pub fn has_critical(&self) -> bool {
        self.stats.critical > 0
    }

    pub fn has_high_or_critical(&self) -> bool {
        self.stats.critical > 0 || self.stats.high > 0
    }

    pub fn total_issues(&self) -> usize {
        self.issues.len()
    }
}

fn count_issues(issues: &[Issue], stats: &mut BuildStats) {
    for i in issues {
        match i.severity {
            Severity::Error => stats.critical += 1,
            Severity::Warning => stats.high += 1,
            Severity::Suggestion => stats.medium += 1,
            Severity::Info => stats.low += 1,
        }
    }
}

/// Registry with the built-in catalog plus whatever `catalog_dir` holds.
pub fn load_registry(catalog_dir: Option<&Path>) -> Result<(PickerRegistry, Vec<String>), FaebrylyzerError> {
    let mut registry = PickerRegistry::with_builtin();
    let mut warnings = Vec::new();
    if let Some(dir) = catalog_dir {
        if !dir.is_dir() {
            return Err(FaebrylyzerError::CatalogDirectory(dir.to_path_buf()));
        }
        warnings = registry.extend_from_directory(dir);
        for warning in &warnings {
            tracing::warn!("{}", warning);
        }
    }
    Ok((registry, warnings))
}

/// Build API used by the CLI and the examples.
pub struct FaebrylyzerCore;

impl FaebrylyzerCore {
    /// Construct the probe board and run the whole pipeline on it.
    pub fn build(options: &BuildOptions) -> Result<BuildResult, FaebrylyzerError> {
        tracing::info!("Make app");
        let (mut design, _board) = Self::make_app(options.max_depth)?;
        Self::build_design(&mut design, options)
    }

    /// Construct the board, logging a depth overflow as fatal.
    pub fn make_app(max_depth: usize) -> Result<(Design, LogicAnalyzerBoard), FaebrylyzerError> {
        match make_design(max_depth) {
            Ok(made) => Ok(made),
            Err(e @ DesignError::DepthExceeded { .. }) => {
                tracing::error!("Design hierarchy too deep, aborting: {}", e);
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run picking, checks and export on an already constructed design.
    pub fn build_design(design: &mut Design, options: &BuildOptions) -> Result<BuildResult, FaebrylyzerError> {
        tracing::info!("Filling unspecified parameters");
        let filled = design.params.replace_tbd_with_any();
        tracing::debug!("{} parameters left unconstrained", filled);

        tracing::info!("Picking parts");
        let (registry, catalog_warnings) = load_registry(options.catalog_dir.as_deref())?;
        let picks = pick_parts(
            design,
            &registry,
            &PickOptions {
                max_steps: options.max_steps,
            },
        )?;

        tracing::info!("Running checks");
        let nets = design.nets();
        let issues = RulesEngine::with_default_rules().analyze(&RuleContext {
            design,
            nets: &nets,
            strict: options.strict,
        });

        tracing::info!("Make netlist");
        let board = design.name(design.root()).to_string();
        let generated_at = Utc::now();
        let netlist = Netlist::build(design, &nets);
        let mut artifacts = Vec::new();

        let netlist_path = options.build_dir.join(export::NETLIST_PATH);
        write_artifact(&netlist_path, &netlist.to_sexp(&board, generated_at).to_pretty())?;
        artifacts.push(netlist_path);

        if options.export_parameters {
            let path = options.build_dir.join(export::PARAMETERS_PATH);
            write_artifact(&path, &parameters_markdown(design))?;
            artifacts.push(path);
        }

        let mut stats = BuildStats {
            critical: 0,
            high: 0,
            medium: 0,
            low: 0,
            modules: design.walk_modules().len(),
            parts: picks.picks.len(),
            nets: nets.len(),
            steps: picks.steps,
            backtracks: picks.backtracks,
        };
        count_issues(&issues, &mut stats);

        let report_path = options.build_dir.join(export::REPORT_PATH);
        if options.write_report {
            artifacts.push(report_path.clone());
        }
        let result = BuildResult {
            board,
            generated_at,
            picks,
            netlist,
            issues,
            stats,
            catalog_warnings,
            artifacts,
        };
        if options.write_report {
            write_artifact(&report_path, &serde_json::to_string_pretty(&result)?)?;
        }

        tracing::info!(
            "Build finished: {} parts, {} nets, {} issues",
            result.stats.parts,
            result.stats.nets,
            result.total_issues()
        );
        Ok(result)
    }
}
