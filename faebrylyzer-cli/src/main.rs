//! faebrylyzer CLI - build the logic analyzer board from the command line.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use faebrylyzer::checks::Rule;
use faebrylyzer::{
    BuildOptions, BuildResult, FaebrylyzerCore, Issue, PickStrategy, PickerRegistry, RulesEngine, Severity,
};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "faebrylyzer")]
#[command(about = "USB logic analyzer board: constraint solving and part picking", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the board: pick parts, run checks, write the netlist
    Build {
        /// Output directory for artifacts
        #[arg(long, value_name = "DIR", default_value = "build")]
        build_dir: PathBuf,

        /// Directory of extra catalog JSON files
        #[arg(long, value_name = "DIR")]
        catalog_dir: Option<PathBuf>,

        /// Write parameters/parameters.md
        #[arg(long)]
        export_parameters: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if issues found at this severity or higher
        #[arg(long, value_enum)]
        fail_on: Option<FailOnSeverity>,

        /// Also report parameters left unconstrained on picked parts
        #[arg(long)]
        strict: bool,

        /// Maximum hierarchy depth
        #[arg(long, default_value_t = faebrylyzer::design::DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Maximum number of candidate attempts while picking
        #[arg(long, default_value_t = faebrylyzer::picker::DEFAULT_MAX_STEPS)]
        max_steps: usize,
    },

    /// List catalog entries
    Catalog {
        /// Directory of extra catalog JSON files
        #[arg(long, value_name = "DIR")]
        catalog_dir: Option<PathBuf>,

        /// Show every part of each entry
        #[arg(short, long)]
        verbose: bool,
    },

    /// List available design rules
    Rules {
        /// Show detailed rule descriptions
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON build report
    Json,
}

#[derive(Clone, ValueEnum)]
enum FailOnSeverity {
    Critical,
    High,
    Medium,
    Low,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Build {
            build_dir,
            catalog_dir,
            export_parameters,
            format,
            fail_on,
            strict,
            max_depth,
            max_steps,
        } => {
            let options = BuildOptions {
                build_dir,
                catalog_dir,
                export_parameters,
                write_report: matches!(format, OutputFormat::Json),
                strict,
                max_depth,
                max_steps,
            };
            handle_build(&options, format, fail_on)
        }
        Commands::Catalog { catalog_dir, verbose } => handle_catalog(catalog_dir, verbose),
        Commands::Rules { verbose } => {
            handle_rules(verbose);
            0
        }
    };

    process::exit(exit_code);
}

fn handle_build(options: &BuildOptions, format: OutputFormat, fail_on: Option<FailOnSeverity>) -> i32 {
    tracing::debug!("Build options: {:?}", options);
    match FaebrylyzerCore::build(options) {
        Ok(result) => {
            match format {
                OutputFormat::Human => output_human(&result),
                OutputFormat::Json => {
                    if let Err(e) = output_json(&result) {
                        eprintln!("Error: {:#}", e);
                        return 1;
                    }
                }
            }
            match fail_on {
                Some(severity) if should_fail(&result, &severity) => 1,
                _ => 0,
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn should_fail(result: &BuildResult, severity: &FailOnSeverity) -> bool {
    match severity {
        FailOnSeverity::Critical => result.has_critical(),
        FailOnSeverity::High => result.has_high_or_critical(),
        FailOnSeverity::Medium => result.has_high_or_critical() || result.stats.medium > 0,
        FailOnSeverity::Low => result.total_issues() > 0,
    }
}

fn print_issues(title: &str, issues: &[&Issue]) {
    if issues.is_empty() {
        return;
    }
    println!("\n  {}:", title);
    for issue in issues {
        println!("    - {}", issue.message);
        if let Some(ref comp) = issue.component {
            println!("      Component: {}", comp);
        }
    }
}

fn output_human(result: &BuildResult) {
    println!("\nBoard: {}", result.board);
    println!("{}", "─".repeat(60));
    println!(
        "  {} parts picked in {} steps ({} backtracks), {} nets",
        result.stats.parts, result.stats.steps, result.stats.backtracks, result.stats.nets
    );
    for path in &result.artifacts {
        println!("  Wrote {}", path.display());
    }

    let by_severity = |severity: Severity| -> Vec<&Issue> {
        result.issues.iter().filter(|i| i.severity == severity).collect()
    };
    print_issues("CRITICAL", &by_severity(Severity::Error));
    print_issues("HIGH", &by_severity(Severity::Warning));
    print_issues("MEDIUM", &by_severity(Severity::Suggestion));
    print_issues("LOW", &by_severity(Severity::Info));

    println!("\n  Summary:");
    println!("    Critical: {}", result.stats.critical);
    println!("    High:     {}", result.stats.high);
    println!("    Medium:   {}", result.stats.medium);
    println!("    Low:      {}", result.stats.low);
}

fn output_json(result: &BuildResult) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(result).context("serializing build report")?;
    println!("{}", text);
    Ok(())
}

fn handle_catalog(catalog_dir: Option<PathBuf>, verbose: bool) -> i32 {
    let registry = match faebrylyzer::core::load_registry(catalog_dir.as_deref()) {
        Ok((registry, _)) => registry,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    print_catalog(&registry, verbose);
    0
}

fn print_catalog(registry: &PickerRegistry, verbose: bool) {
    println!("Catalog entries:\n");
    for picker in registry.pickers() {
        let strategy = match picker.strategy() {
            PickStrategy::Catalog => format!("{} parts", picker.candidates().len()),
            PickStrategy::ManualFootprint => "manual footprint".to_string(),
            PickStrategy::NoFootprint => "no footprint".to_string(),
        };
        println!("  {} ({}, priority {}): {}", picker.name(), picker.kind(), picker.priority(), strategy);
        if verbose {
            for option in picker.candidates() {
                let params: Vec<String> = option.params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                println!(
                    "    {} {} {}",
                    option.part.lcsc,
                    option.part.mpn.as_deref().unwrap_or("-"),
                    params.join(" ")
                );
            }
        }
    }
}

fn handle_rules(verbose: bool) {
    println!("Available design rules:\n");

    let engine = RulesEngine::with_default_rules();
    for rule in engine.rules() {
        print_rule(rule, verbose);
    }
}

fn print_rule(rule: &dyn Rule, verbose: bool) {
    println!("  {}", rule.id());
    println!("    {} ({:?})", rule.name(), rule.severity());
    if verbose {
        println!("    {}", rule.description());
    }
    println!();
}
