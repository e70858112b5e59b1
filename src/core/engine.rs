//! External patch engine integration
//!
//! Locates and version-gates the Java runtime, composes the full command
//! lines for the engine's `list-patches` and `patch` subcommands, and runs
//! them. The listing run captures stdout for the catalog parser; the patch
//! run streams to the console because the engine reports its own progress.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use regex::Regex;
use tracing::debug;

use crate::cli::AppContext;

/// Listing flags that make the engine emit packages, versions, and options.
const LISTING_FLAGS: [&str; 3] = ["--with-packages", "--with-versions", "--with-options"];

/// Engine failure taxonomy for exit-status mapping.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("could not parse java version from output:\n{0}")]
    VersionUnparsed(String),

    #[error("unsupported java version {found}: need a version >= {min} and < {max}")]
    VersionUnsupported { found: u32, min: u32, max: u32 },

    #[error("list-patches failed:\n{0}")]
    ListFailed(String),

    #[error("patch command failed with exit code {0}")]
    PatchFailed(i32),
}

/// A detected, version-gated Java runtime.
#[derive(Debug, Clone)]
pub struct JavaRuntime {
    pub major: u32,
}

impl JavaRuntime {
    /// Run `java -version` and enforce the supported major range.
    pub fn detect(min: u32, max: u32) -> Result<Self> {
        let output = Command::new("java")
            .arg("-version")
            .output()
            .context("Java executable not found in PATH")?;

        if !output.status.success() {
            anyhow::bail!("java -version exited unsuccessfully");
        }

        // The JVM prints its banner to stderr; some distributions use stdout.
        let text = if output.stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).to_string()
        } else {
            String::from_utf8_lossy(&output.stderr).to_string()
        };

        let major =
            parse_java_major(&text).ok_or_else(|| EngineError::VersionUnparsed(text.clone()))?;
        debug!(major, "detected java runtime");

        if major < min || major >= max {
            return Err(EngineError::VersionUnsupported { found: major, min, max }.into());
        }

        Ok(Self { major })
    }
}

/// Extract the major version from a `java -version` banner.
///
/// Handles the legacy `1.x.y` scheme (major is `x`) and the modern `xx.y.z`
/// scheme (major is `xx`).
pub fn parse_java_major(output: &str) -> Option<u32> {
    let version_re = Regex::new(r#"version "([^"]+)""#).expect("static version pattern");
    let version = version_re.captures(output)?.get(1)?.as_str();

    let mut parts = version.split('.');
    let head = parts.next()?;

    if head == "1" {
        return parts.next()?.parse().ok();
    }

    let digits: String = head.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Handle to the external patch engine executable.
pub struct PatchEngine {
    engine_jar: PathBuf,
    jvm_opts: Vec<String>,
}

impl PatchEngine {
    pub fn new(engine_jar: PathBuf, jvm_opts: Vec<String>) -> Self {
        Self { engine_jar, jvm_opts }
    }

    /// `java <jvm-opts> -jar <engine>` prefix shared by all subcommands.
    fn base_argv(&self) -> Vec<String> {
        let mut argv = vec!["java".to_string()];
        argv.extend(self.jvm_opts.iter().cloned());
        argv.push("-jar".to_string());
        argv.push(self.engine_jar.to_string_lossy().to_string());
        argv
    }

    /// Full argv for the listing subcommand.
    pub fn listing_argv(&self, bundle: &Path) -> Vec<String> {
        let mut argv = self.base_argv();
        argv.push("list-patches".to_string());
        argv.extend(LISTING_FLAGS.iter().map(|f| f.to_string()));
        argv.push(bundle.to_string_lossy().to_string());
        argv
    }

    /// Full argv for the patch subcommand given already-built patch args.
    pub fn patch_argv(&self, bundle: &Path, patch_args: &[String]) -> Vec<String> {
        let mut argv = self.base_argv();
        argv.push("patch".to_string());
        argv.push("-p".to_string());
        argv.push(bundle.to_string_lossy().to_string());
        argv.extend(patch_args.iter().cloned());
        argv
    }

    /// Run the listing subcommand and return its raw stdout for the parser.
    pub fn list_patches(&self, bundle: &Path, ctx: &AppContext) -> Result<String> {
        let argv = self.listing_argv(bundle);
        debug!(?argv, "running engine listing");

        let spinner = if ctx.quiet {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .unwrap(),
            );
            pb.set_message("Loading patches...");
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        };

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .context("Failed to spawn patch engine for list-patches")?;

        spinner.finish_and_clear();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(EngineError::ListFailed(stderr).into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run the patch subcommand, streaming engine output to the console.
    pub fn patch(&self, bundle: &Path, patch_args: &[String], ctx: &AppContext) -> Result<()> {
        let argv = self.patch_argv(bundle, patch_args);
        debug!(?argv, "running engine patch");

        if !ctx.quiet {
            println!("{} Patching... (this can take a while)", "ℹ".cyan());
        }

        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .context("Failed to spawn patch engine for patch")?;

        if !status.success() {
            return Err(EngineError::PatchFailed(status.code().unwrap_or(-1)).into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modern_version_scheme() {
        let banner = "openjdk version \"17.0.5\" 2022-10-18\nOpenJDK Runtime Environment";
        assert_eq!(parse_java_major(banner), Some(17));
    }

    #[test]
    fn parses_legacy_version_scheme() {
        let banner = "java version \"1.8.0_341\"\nJava(TM) SE Runtime Environment";
        assert_eq!(parse_java_major(banner), Some(8));
    }

    #[test]
    fn parses_major_with_trailing_suffix() {
        let banner = "openjdk version \"21-ea\" 2023-09-19";
        assert_eq!(parse_java_major(banner), Some(21));
    }

    #[test]
    fn rejects_unparseable_banner() {
        assert_eq!(parse_java_major("no version here"), None);
    }

    #[test]
    fn listing_argv_carries_all_flags() {
        let engine = PatchEngine::new(
            PathBuf::from("engine.jar"),
            vec!["-Xmx4G".to_string()],
        );
        let argv = engine.listing_argv(Path::new("patches.rvp"));
        assert_eq!(
            argv,
            vec![
                "java",
                "-Xmx4G",
                "-jar",
                "engine.jar",
                "list-patches",
                "--with-packages",
                "--with-versions",
                "--with-options",
                "patches.rvp"
            ]
        );
    }

    #[test]
    fn patch_argv_keeps_bundle_before_patch_args() {
        let engine = PatchEngine::new(PathBuf::from("engine.jar"), Vec::new());
        let argv = engine.patch_argv(
            Path::new("patches.rvp"),
            &["--exclusive".to_string(), "--ei".to_string(), "3".to_string()],
        );
        assert_eq!(
            argv,
            vec![
                "java",
                "-jar",
                "engine.jar",
                "patch",
                "-p",
                "patches.rvp",
                "--exclusive",
                "--ei",
                "3"
            ]
        );
    }
}
