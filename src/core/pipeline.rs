//! End-to-end patching pipeline
//!
//! Orchestrates the full flow: resolve toolchain artifacts, gate on the
//! Java runtime, obtain and parse the engine's patch listing, filter by
//! target package, let the operator select and configure patches, build the
//! engine argument list, and run (or preview) the patch command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::debug;

use crate::cli::{AppContext, ListPatchesArgs, PatchArgs, ToolKind};
use crate::core::apk::{
    detect_package_name, find_package_files, is_split_archive, merge_split_package,
};
use crate::core::catalog::{PatchRecord, filter_catalog, parse_listing};
use crate::core::engine::{JavaRuntime, PatchEngine};
use crate::core::invoke::{SigningArgs, build_patch_args, render_command_line};
use crate::core::select::{OperatorPrompt, Selection, resolve_selections};
use crate::infra::cache::resolve_tool;
use crate::infra::config::{Config, load_config};
use crate::infra::prompt::{AutoPrompt, ConsolePrompt};
use crate::infra::utils::{FmtUtils, PathUtils};

/// One row of the human-readable catalog table.
#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "Index")]
    index: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Packages")]
    packages: String,
    #[tabled(rename = "Options")]
    options: usize,
}

impl CatalogRow {
    fn from_record(record: &PatchRecord) -> Self {
        let packages = if record.is_universal() {
            "(universal)".to_string()
        } else {
            let mut names: Vec<&str> =
                record.packages.iter().take(3).map(String::as_str).collect();
            if record.packages.len() > 3 {
                names.push("…");
            }
            names.join(", ")
        };

        Self {
            index: record.index.map_or_else(|| "—".to_string(), |i| i.to_string()),
            name: record.name.clone().unwrap_or_else(|| "(Unnamed patch)".to_string()),
            enabled: match record.enabled {
                Some(true) => "yes".to_string(),
                Some(false) => "no".to_string(),
                None => "—".to_string(),
            },
            packages,
            options: record.options.len(),
        }
    }
}

/// Load, parse, and filter the catalog for the given tool paths.
fn load_catalog(
    config: &Config,
    engine: &PatchEngine,
    bundle: &PathBuf,
    target: Option<&str>,
    include_universal: bool,
    ctx: &AppContext,
) -> Result<Vec<PatchRecord>> {
    JavaRuntime::detect(config.java.min_version, config.java.max_version)?;

    let listing = engine.list_patches(bundle, ctx)?;
    let catalog = parse_listing(&listing);
    debug!(total = catalog.len(), target = ?target, "catalog loaded");

    Ok(filter_catalog(&catalog, target, include_universal))
}

/// `pup list-patches` entry point.
pub fn list_run(args: ListPatchesArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config().unwrap_or_default();
    let engine_jar = resolve_tool(ToolKind::Engine, args.engine_jar, config.tools.engine.clone())?;
    let bundle = resolve_tool(ToolKind::Bundle, args.bundle, config.tools.bundle.clone())?;

    let engine = PatchEngine::new(engine_jar, config.jvm_opts.clone());
    let catalog = load_catalog(
        &config,
        &engine,
        &bundle,
        args.package.as_deref(),
        args.include_universal,
        ctx,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    if catalog.is_empty() {
        println!("No patches matched.");
        return Ok(());
    }

    let rows: Vec<CatalogRow> = catalog.iter().map(CatalogRow::from_record).collect();
    let table = Table::new(rows).with(Style::sharp()).to_string();
    println!("{table}");

    if !ctx.quiet {
        println!("{} patches", catalog.len());
    }

    Ok(())
}

/// Find the package file to patch: explicit path, or a scan of the working
/// tree with an interactive pick when several candidates exist.
fn locate_package_file(
    explicit: Option<PathBuf>,
    config: &Config,
    ctx: &AppContext,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let path = PathUtils::expand(&path)?;
        if !path.is_file() {
            anyhow::bail!("Package file not found: {}", path.display());
        }
        return Ok(path);
    }

    let found = find_package_files(std::path::Path::new("."), &config.exclude_dirs)?;
    match found.len() {
        0 => anyhow::bail!("No package files (.apk/.apkm/.xapk) found under the current directory"),
        1 => {
            if !ctx.quiet {
                println!("{} Using {}", "ℹ".cyan(), found[0].display());
            }
            Ok(found[0].clone())
        }
        _ => {
            let labels: Vec<String> = found
                .iter()
                .map(|path| {
                    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                    format!("{} ({})", path.display(), FmtUtils::human_size(size))
                })
                .collect();
            let picked = ConsolePrompt::new().pick_index("Select a package file:", &labels)?;
            Ok(found[picked].clone())
        }
    }
}

/// Target package: explicit flag, then detection, then an optional manual
/// entry (empty answer means no filtering).
fn determine_target_package(
    explicit: Option<String>,
    package_file: &std::path::Path,
    auto: bool,
    ctx: &AppContext,
) -> Result<Option<String>> {
    if let Some(pkg) = explicit {
        return Ok(Some(pkg));
    }

    if let Some(pkg) = detect_package_name(package_file) {
        if !ctx.quiet {
            println!("{} Detected package: {}", "✓".green(), pkg.bold());
        }
        return Ok(Some(pkg));
    }

    if auto {
        anyhow::bail!(
            "Could not detect the package identifier of {} (is 'aapt' installed?)",
            package_file.display()
        );
    }

    println!("{} Could not detect a package identifier", "⚠".yellow());
    let entered = ConsolePrompt::new()
        .text("Enter package name (empty to list all patches):", None)?;
    Ok(Some(entered).filter(|p| !p.is_empty()))
}

/// `pup patch` entry point.
pub fn patch_run(args: PatchArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config().unwrap_or_default();

    let engine_jar = resolve_tool(ToolKind::Engine, args.engine_jar, config.tools.engine.clone())?;
    let bundle = resolve_tool(ToolKind::Bundle, args.bundle, config.tools.bundle.clone())?;
    let engine = PatchEngine::new(engine_jar, config.jvm_opts.clone());

    let package_file = locate_package_file(args.package_file, &config, ctx)?;
    let target = determine_target_package(args.package, &package_file, args.auto, ctx)?;

    let catalog = load_catalog(
        &config,
        &engine,
        &bundle,
        target.as_deref(),
        args.include_universal,
        ctx,
    )?;
    if catalog.is_empty() {
        anyhow::bail!("No patches matched the target package");
    }

    let mut prompt: Box<dyn OperatorPrompt> = if args.auto {
        Box::new(AutoPrompt)
    } else {
        Box::new(ConsolePrompt::new())
    };

    let choices = prompt.choose_patches(&catalog)?;
    if choices.is_empty() {
        anyhow::bail!("No patches selected");
    }

    let selections: Vec<Selection> = resolve_selections(&catalog, &choices, prompt.as_mut())?;

    let signing = SigningArgs {
        keystore: args.keystore.or(config.signing.keystore.clone()),
        keystore_password: args
            .keystore_password
            .or(config.signing.keystore_password.clone()),
        entry_alias: args.key_alias.or(config.signing.entry_alias.clone()),
        entry_password: args.key_password.or(config.signing.entry_password.clone()),
    };

    let output_dir = args.output.unwrap_or_else(|| config.output_dir.clone());
    let stem = package_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("patched");
    let output_path = output_dir.join(format!("{stem}_patched.apk"));

    // Split archives are merged into a single installable package first.
    let input_path = if is_split_archive(&package_file) {
        let editor_jar =
            resolve_tool(ToolKind::Editor, args.editor_jar, config.tools.editor.clone())?;
        let merged = output_dir.join(format!("{stem}.apk"));

        if ctx.dry_run {
            if !ctx.quiet {
                println!(
                    "{} would merge {} into {}",
                    "DRY RUN:".yellow(),
                    package_file.display(),
                    merged.display()
                );
            }
            merged
        } else {
            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("Failed to create {}", output_dir.display()))?;
            if !ctx.quiet {
                println!("{} Merging split archive...", "ℹ".cyan());
            }
            merge_split_package(&editor_jar, &package_file, &merged)?
        }
    } else {
        package_file.clone()
    };

    let patch_args = build_patch_args(
        args.exclusive,
        &selections,
        &signing,
        &args.extra_args,
        &output_path.to_string_lossy(),
        &input_path.to_string_lossy(),
    );
    let argv = engine.patch_argv(&bundle, &patch_args);

    if ctx.dry_run {
        println!("{}", "DRY RUN: patch command:".yellow());
        println!("{}", render_command_line(&argv));
        return Ok(());
    }

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    engine.patch(&bundle, &patch_args, ctx)?;

    if !ctx.quiet {
        println!(
            "{} Patched package saved at {}",
            "✓".green(),
            output_path.display()
        );
    }

    Ok(())
}
