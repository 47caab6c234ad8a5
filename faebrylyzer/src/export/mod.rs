//! Build artifacts written under the build directory.

pub mod netlist;
pub mod parameters;
pub mod sexp;

pub use netlist::{Component, Netlist, NetlistNet};
pub use parameters::parameters_markdown;
pub use sexp::{SExp, SExpError};

use std::fs;
use std::io;
use std::path::Path;

/// Netlist location relative to the build directory.
pub const NETLIST_PATH: &str = "faebryk/faebryk.net";
pub const PARAMETERS_PATH: &str = "parameters/parameters.md";
pub const REPORT_PATH: &str = "report.json";

/// Write `contents` to `path`, creating parent directories.
pub fn write_artifact(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    tracing::info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_artifact_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(NETLIST_PATH);
        write_artifact(&path, "(export)").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "(export)");
    }
}
