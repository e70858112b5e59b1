//! Toolchain registry backed by an on-disk metadata file
//!
//! An explicit cache object owned by the orchestration layer: registered
//! engine/bundle/editor artifacts are remembered in `metadata.json` under
//! the cache directory so repeated runs need no tool flags. Never ambient
//! global state; callers construct and pass it where needed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, ToolKind, ToolsArgs, ToolsSubcommand};
use crate::infra::utils::PathUtils;

/// One registered toolchain artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEntry {
    pub path: PathBuf,
    /// Optional release tag recorded at registration time
    pub tag: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// Registry of toolchain artifacts, persisted as JSON.
#[derive(Debug)]
pub struct ToolCache {
    cache_dir: PathBuf,
    entries: BTreeMap<String, ToolEntry>,
}

impl ToolCache {
    /// Default cache location under the user's home directory.
    pub fn default_dir() -> PathBuf {
        PathBuf::from(shellexpand::tilde("~/.patchup").as_ref())
    }

    /// Open the registry rooted at `cache_dir`, loading existing metadata.
    /// Unreadable metadata is treated as empty rather than fatal.
    pub fn open(cache_dir: PathBuf) -> Self {
        let entries = std::fs::read_to_string(cache_dir.join("metadata.json"))
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();

        Self { cache_dir, entries }
    }

    fn metadata_path(&self) -> PathBuf {
        self.cache_dir.join("metadata.json")
    }

    fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir)
            .with_context(|| format!("Failed to create {}", self.cache_dir.display()))?;
        let text = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(self.metadata_path(), text)
            .context("Failed to write cache metadata")?;
        Ok(())
    }

    /// Register an artifact under `kind`, replacing any previous entry.
    pub fn register(&mut self, kind: ToolKind, path: &Path, tag: Option<String>) -> Result<()> {
        let path = PathUtils::expand(path)?;
        if !path.is_file() {
            anyhow::bail!("No such file: {}", path.display());
        }

        self.entries.insert(
            kind.as_str().to_string(),
            ToolEntry { path, tag, registered_at: Utc::now() },
        );
        self.save()
    }

    /// Path of a registered artifact, if it still exists on disk.
    pub fn resolve(&self, kind: ToolKind) -> Option<PathBuf> {
        self.entries
            .get(kind.as_str())
            .map(|entry| entry.path.clone())
            .filter(|path| path.exists())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &ToolEntry)> {
        self.entries.iter()
    }

    /// Drop all registrations and the metadata file.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        let path = self.metadata_path();
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

/// Resolve a toolchain artifact: explicit flag, then configuration, then the
/// registry.
pub fn resolve_tool(
    kind: ToolKind,
    explicit: Option<PathBuf>,
    configured: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = explicit.or(configured) {
        return PathUtils::expand(&path);
    }

    ToolCache::open(ToolCache::default_dir())
        .resolve(kind)
        .with_context(|| {
            format!(
                "No {} configured; pass {} or run `pup tools register {} <path>`",
                kind.as_str(),
                kind.flag(),
                kind.as_str()
            )
        })
}

/// `pup tools` entry point.
pub fn tools_run(args: ToolsArgs, ctx: &AppContext) -> Result<()> {
    let mut cache = ToolCache::open(ToolCache::default_dir());

    match args.command {
        ToolsSubcommand::Register(register) => {
            if ctx.dry_run {
                if !ctx.quiet {
                    println!(
                        "DRY RUN: would register {} -> {}",
                        register.kind.as_str(),
                        register.path.display()
                    );
                }
                return Ok(());
            }
            cache.register(register.kind, &register.path, register.tag)?;
            if !ctx.quiet {
                println!(
                    "{} Registered {}: {}",
                    "✓".green(),
                    register.kind.as_str(),
                    register.path.display()
                );
            }
        }
        ToolsSubcommand::Show(show) => {
            if show.json {
                let map: BTreeMap<&String, &ToolEntry> = cache.entries().collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else if cache.entries().count() == 0 {
                println!("No tools registered.");
            } else {
                for (kind, entry) in cache.entries() {
                    let missing = if entry.path.exists() { "" } else { " (missing)" };
                    let tag = entry.tag.as_deref().unwrap_or("-");
                    println!(
                        "{kind:>7}  {}  [{}]{}",
                        entry.path.display(),
                        tag,
                        missing.red()
                    );
                }
            }
        }
        ToolsSubcommand::Clear => {
            if ctx.dry_run {
                if !ctx.quiet {
                    println!("DRY RUN: would clear the tool registry");
                }
                return Ok(());
            }
            cache.clear()?;
            if !ctx.quiet {
                println!("{} Tool registry cleared", "✓".green());
            }
        }
    }

    Ok(())
}
