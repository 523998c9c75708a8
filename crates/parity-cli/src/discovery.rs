//! Locating test projects under a suite root.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Directory, relative to the suite root, holding one project per subdirectory.
pub const PROJECTS_DIR: &str = "tests/NET";

/// Solution files to build: for each directory directly under
/// `<root>/tests/NET`, the first `*.sln` by name. Sorted by path.
pub fn discover_solutions(root: &Path) -> Result<Vec<PathBuf>> {
    let projects = root.join(PROJECTS_DIR);
    let entries = std::fs::read_dir(&projects)
        .with_context(|| format!("Failed to read project directory {}", projects.display()))?;

    let mut solutions = Vec::new();
    for entry in entries {
        let dir = entry?.path();
        if !dir.is_dir() {
            continue;
        }
        if let Some(sln) = first_solution_in(&dir)? {
            solutions.push(sln);
        } else {
            debug!(dir = %dir.display(), "no solution file, skipping");
        }
    }
    solutions.sort();
    Ok(solutions)
}

fn first_solution_in(dir: &Path) -> Result<Option<PathBuf>> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "sln"))
        .collect();
    found.sort();
    Ok(found.into_iter().next())
}

/// Keep solutions whose file stem matches any filter, ignoring case.
/// An empty filter list keeps everything.
pub fn filter_solutions(solutions: Vec<PathBuf>, filters: &[String]) -> Vec<PathBuf> {
    if filters.is_empty() {
        return solutions;
    }
    let wanted: Vec<String> = filters.iter().map(|f| f.to_lowercase()).collect();
    solutions
        .into_iter()
        .filter(|sln| {
            let stem = sln
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            wanted.contains(&stem)
        })
        .collect()
}
