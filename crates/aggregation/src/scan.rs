//! Enumeration of simulation directories.

use std::path::{Path, PathBuf};

use ecosse_common::SimulationDir;
use tracing::debug;

use crate::error::Result;

/// A simulation directory and its decoded name.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedDir {
    pub path: PathBuf,
    pub dir: SimulationDir,
}

/// List the immediate subdirectories of `sims_dir` following the
/// `lat…_lon…_mu…_s…` naming convention, sorted by name.
///
/// Sorting by name keeps the slots of one cell adjacent and ascending.
pub fn scan_simulation_dirs(sims_dir: &Path) -> Result<Vec<ScannedDir>> {
    let mut dirs = Vec::new();
    let mut ignored = 0usize;

    for entry in walkdir::WalkDir::new(sims_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        match SimulationDir::parse(&name) {
            Ok(dir) => dirs.push(ScannedDir {
                path: entry.path().to_path_buf(),
                dir,
            }),
            Err(_) => ignored += 1,
        }
    }

    debug!(
        sims_dir = %sims_dir.display(),
        found = dirs.len(),
        ignored = ignored,
        "Scanned simulation directories"
    );
    Ok(dirs)
}
