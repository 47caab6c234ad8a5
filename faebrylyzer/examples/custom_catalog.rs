//! Build the board with an extra catalog directory and a tweaked design.
//!
//! Usage: cargo run --example custom_catalog [path/to/catalog_dir]

use faebrylyzer::design::DEFAULT_MAX_DEPTH;
use faebrylyzer::library::Capacitor;
use faebrylyzer::prelude::*;
use std::path::PathBuf;

fn main() -> Result<(), FaebrylyzerError> {
    let catalog_dir = std::env::args().nth(1).map(PathBuf::from);
    if let Some(dir) = &catalog_dir {
        if !dir.is_dir() {
            eprintln!("Catalog directory not found: {}", dir.display());
            eprintln!("Usage: cargo run --example custom_catalog [path/to/catalog_dir]");
            std::process::exit(1);
        }
    }

    let (mut design, board) = FaebrylyzerCore::make_app(DEFAULT_MAX_DEPTH)?;

    // Extra bulk capacitor on the bus supply.
    let root = design.root();
    let bulk = Capacitor::new(&mut design, root, "vbus_bulk_cap")?;
    design.connect(board.vbus.hv, bulk.a)?;
    design.connect(board.vbus.lv, bulk.b)?;
    bulk.set_capacitance(&mut design, Quantity::farads(1e-6))?;

    let options = BuildOptions {
        build_dir: PathBuf::from("build").join("custom"),
        catalog_dir,
        ..Default::default()
    };
    let result = FaebrylyzerCore::build_design(&mut design, &options)?;

    for warning in &result.catalog_warnings {
        println!("warning: {}", warning);
    }
    for pick in result.picks.picks.iter().filter(|p| p.path.starts_with("app.vbus_bulk_cap")) {
        println!("{} -> {} ({})", pick.path, pick.lcsc, pick.picker);
    }
    println!("Total issues: {}", result.total_issues());
    Ok(())
}
