//! Build the logic analyzer board and print the picked parts.

use faebrylyzer::prelude::*;
use std::path::PathBuf;

fn main() -> Result<(), FaebrylyzerError> {
    let build_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("build"));

    let options = BuildOptions {
        build_dir,
        export_parameters: true,
        ..Default::default()
    };

    let result = FaebrylyzerCore::build(&options)?;

    println!("Board {} ({} modules)", result.board, result.stats.modules);
    println!();
    for pick in &result.picks.picks {
        println!("  {:<50} {:<10} {}", pick.path, pick.lcsc, pick.mpn.as_deref().unwrap_or(""));
    }
    println!();

    if result.stats.critical > 0 {
        println!("CRITICAL issues:");
        for issue in result.issues.iter().filter(|i| matches!(i.severity, Severity::Error)) {
            println!("  - {}", issue.message);
        }
    }

    for path in &result.artifacts {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
