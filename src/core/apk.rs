//! Package location, identification, and split-package merging
//!
//! Finds candidate application packages on disk, extracts a package
//! identifier (`aapt` first, manifest-bytes heuristic as fallback), and
//! merges multi-split archives into one installable package through the
//! external editor tool.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use owo_colors::OwoColorize;
use regex::Regex;
use tracing::{debug, warn};

use crate::cli::{AppContext, DetectArgs, MergeArgs, ToolKind};
use crate::core::engine::JavaRuntime;
use crate::infra::cache::resolve_tool;
use crate::infra::config::load_config;
use crate::infra::utils::PathUtils;

/// Recognized package file extensions, lower-case.
pub const PACKAGE_EXTENSIONS: [&str; 3] = ["apk", "apkm", "xapk"];

/// True for multi-split archive formats that need merging before patching.
pub fn is_split_archive(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref(),
        Some("apkm") | Some("xapk")
    )
}

fn has_package_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|ext| PACKAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Walk `root` for package files, excluded directories pruned early,
/// newest first.
pub fn find_package_files(root: &Path, exclude_dirs: &[String]) -> Result<Vec<PathBuf>> {
    let mut builder = GlobSetBuilder::new();
    for dir in exclude_dirs {
        builder.add(Glob::new(&format!("**/{}", dir.trim_end_matches('/')))?);
    }
    let excludes: GlobSet = builder.build()?;

    let mut walk_builder = WalkBuilder::new(root);
    // Fully-qualified `hidden` call: `OwoColorize::hidden` (from the
    // `owo_colors` import above) otherwise wins method resolution at an
    // earlier autoref step than `WalkBuilder::hidden`.
    WalkBuilder::hidden(&mut walk_builder, false)
        .git_ignore(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && excludes.is_match(entry.path()))
        });
    let walker = walk_builder.build();

    let mut found: Vec<PathBuf> = walker
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| has_package_extension(path))
        .collect();

    found.sort_by_key(|path| {
        std::cmp::Reverse(
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH),
        )
    });

    debug!(count = found.len(), "package scan complete");
    Ok(found)
}

/// Extract a package identifier via `aapt dump badging`.
fn aapt_package_name(apk: &Path) -> Option<String> {
    let output = Command::new("aapt")
        .args(["dump", "badging"])
        .arg(apk)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let re = Regex::new(r"package: name='([^']+)'").expect("static badging pattern");
    re.captures(&stdout).map(|c| c[1].to_string())
}

/// Heuristic identifier extraction from raw manifest bytes.
///
/// Tries a literal `package="…"` attribute first, then the first dotted
/// identifier with at least three segments.
pub fn package_from_manifest_text(text: &str) -> Option<String> {
    let attr = Regex::new(r#"package="([^"]+)""#).expect("static manifest pattern");
    if let Some(caps) = attr.captures(text) {
        return Some(caps[1].to_string());
    }

    let dotted = Regex::new(r"(?i)[a-z][a-z0-9_]*(?:\.[a-z][a-z0-9_]*){2,}")
        .expect("static identifier pattern");
    dotted.find(text).map(|m| m.as_str().to_string())
}

/// Fallback: read the archived manifest through `unzip -p` and scan it.
fn manifest_package_name(apk: &Path) -> Option<String> {
    let output = Command::new("unzip")
        .args(["-p"])
        .arg(apk)
        .arg("AndroidManifest.xml")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let text = String::from_utf8_lossy(&output.stdout).to_string();
    package_from_manifest_text(&text)
}

/// Probe a split archive's `base*.apk` member for the package identifier.
fn split_package_name(archive: &Path) -> Option<String> {
    let scratch = tempfile::tempdir().ok()?;

    let status = Command::new("unzip")
        .args(["-q", "-o"])
        .arg(archive)
        .arg("base*.apk")
        .arg("-d")
        .arg(scratch.path())
        .status()
        .ok()?;
    if !status.success() {
        return None;
    }

    let base = std::fs::read_dir(scratch.path())
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("base") && n.ends_with(".apk"))
        })?;

    package_identity(&base)
}

fn package_identity(apk: &Path) -> Option<String> {
    aapt_package_name(apk).or_else(|| {
        warn!(path = %apk.display(), "aapt unavailable or failed, scanning manifest bytes");
        manifest_package_name(apk)
    })
}

/// Detect the package identifier of an installable or split package file.
pub fn detect_package_name(path: &Path) -> Option<String> {
    if is_split_archive(path) {
        split_package_name(path)
    } else {
        package_identity(path)
    }
}

/// Merge a multi-split archive into one installable package via the
/// external editor tool. The scratch directory is removed on every exit
/// path by its guard.
pub fn merge_split_package(
    editor_jar: &Path,
    archive: &Path,
    output: &Path,
) -> Result<PathBuf> {
    let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;

    let status = Command::new("unzip")
        .args(["-q", "-o"])
        .arg(archive)
        .arg("-d")
        .arg(scratch.path())
        .status()
        .context("'unzip' executable not found in PATH")?;
    if !status.success() {
        anyhow::bail!("Failed to unpack {}", archive.display());
    }

    let merge = Command::new("java")
        .args(["-jar"])
        .arg(editor_jar)
        .arg("m")
        .arg("-i")
        .arg(scratch.path())
        .arg("-o")
        .arg(output)
        .output()
        .context("Failed to spawn editor tool for merge")?;

    if !merge.status.success() {
        let stderr = String::from_utf8_lossy(&merge.stderr);
        anyhow::bail!("Merge failed: {}", stderr.trim());
    }
    if !output.exists() {
        anyhow::bail!("Merge reported success but produced no output");
    }

    Ok(output.to_path_buf())
}

/// `pup detect` entry point.
pub fn detect_run(args: DetectArgs, ctx: &AppContext) -> Result<()> {
    let path = PathUtils::expand(&args.package_file)?;

    let Some(package) = detect_package_name(&path) else {
        anyhow::bail!(
            "Could not detect a package identifier for {} (is 'aapt' installed?)",
            path.display()
        );
    };

    if args.json {
        println!(
            "{}",
            serde_json::json!({ "file": path.display().to_string(), "package": package })
        );
    } else if ctx.quiet {
        println!("{package}");
    } else {
        println!("{} Package: {}", "✓".green(), package.bold());
    }

    Ok(())
}

/// `pup merge` entry point.
pub fn merge_run(args: MergeArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config().unwrap_or_default();
    let archive = PathUtils::expand(&args.archive)?;

    if !is_split_archive(&archive) {
        anyhow::bail!("{} is not a split archive (.apkm/.xapk)", archive.display());
    }

    let editor_jar = resolve_tool(ToolKind::Editor, args.editor_jar, config.tools.editor.clone())?;

    let output = match args.output {
        Some(out) => out,
        None => archive.with_extension("apk"),
    };

    if ctx.dry_run {
        if !ctx.quiet {
            println!("{}", "DRY RUN: would merge:".yellow());
            println!("  Archive: {}", archive.display());
            println!("  Editor:  {}", editor_jar.display());
            println!("  Output:  {}", output.display());
        }
        return Ok(());
    }

    JavaRuntime::detect(config.java.min_version, config.java.max_version)?;

    if !ctx.quiet {
        println!("{} Merging {} ...", "ℹ".cyan(), archive.display());
    }
    let merged = merge_split_package(&editor_jar, &archive, &output)?;
    if !ctx.quiet {
        println!("{} Merged into {}", "✓".green(), merged.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn split_archive_detection_by_extension() {
        assert!(is_split_archive(Path::new("app.apkm")));
        assert!(is_split_archive(Path::new("app.XAPK")));
        assert!(!is_split_archive(Path::new("app.apk")));
        assert!(!is_split_archive(Path::new("app.zip")));
    }

    #[test]
    fn manifest_heuristic_prefers_package_attribute() {
        let text = r#"<manifest package="com.example.app" other="org.junk.filler.x">"#;
        assert_eq!(
            package_from_manifest_text(text).as_deref(),
            Some("com.example.app")
        );
    }

    #[test]
    fn manifest_heuristic_falls_back_to_dotted_identifier() {
        let text = "binary noise com.example.music.player more noise";
        assert_eq!(
            package_from_manifest_text(text).as_deref(),
            Some("com.example.music.player")
        );
    }

    #[test]
    fn manifest_heuristic_ignores_short_identifiers() {
        assert_eq!(package_from_manifest_text("just example.com here"), None);
    }

    #[test]
    fn scan_finds_packages_and_prunes_excluded_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("app.apk"), b"x").unwrap();
        fs::write(tmp.path().join("bundle.apkm"), b"x").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(tmp.path().join("output")).unwrap();
        fs::write(tmp.path().join("output").join("old.apk"), b"x").unwrap();

        let found =
            find_package_files(tmp.path(), &["output".to_string()]).unwrap();
        let names: Vec<String> = found
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .map(str::to_string)
            .collect();

        assert_eq!(found.len(), 2);
        assert!(names.contains(&"app.apk".to_string()));
        assert!(names.contains(&"bundle.apkm".to_string()));
    }
}
