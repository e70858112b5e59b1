//! Filepath: src/infra/utils.rs
//! Utility helpers organized by small, focused structs.
//! All functions are associated fns to keep call sites
//! ergonomic, testable, and discoverable.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// User-path helpers
pub struct PathUtils;

impl PathUtils {
    /// Expand `~` and `$VAR` in a user-supplied path, canonicalizing when
    /// the result already exists on disk.
    pub fn expand(path: &Path) -> Result<PathBuf> {
        let raw = path.to_string_lossy();
        let expanded = shellexpand::full(&raw)
            .with_context(|| format!("Failed to expand path: {raw}"))?;
        let expanded = PathBuf::from(expanded.as_ref());

        if expanded.exists() {
            dunce::canonicalize(&expanded)
                .with_context(|| format!("Failed to canonicalize {}", expanded.display()))
        } else {
            Ok(expanded)
        }
    }
}

/// Display formatting helpers
pub struct FmtUtils;

impl FmtUtils {
    /// Render a byte count as a short human-readable size
    pub fn human_size(bytes: u64) -> String {
        const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

        let mut value = bytes as f64;
        let mut unit = 0;

        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }

        if unit == 0 {
            format!("{bytes} {}", UNITS[0])
        } else {
            format!("{value:.1} {}", UNITS[unit])
        }
    }
}
