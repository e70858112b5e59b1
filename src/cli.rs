use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "patchup")]
#[command(
    about = "A fast, lightweight CLI for patching Android application packages with an external patch engine"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress spinners and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without executing
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Patch a package: select patches, configure options, run the engine
    Patch(PatchArgs),

    /// List the patches a definition bundle exposes
    ListPatches(ListPatchesArgs),

    /// Detect the package identifier of a package file
    Detect(DetectArgs),

    /// Merge a multi-split archive into one installable package
    Merge(MergeArgs),

    /// Manage registered toolchain artifacts
    Tools(ToolsArgs),

    /// Initialize a patchup.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser)]
pub struct PatchArgs {
    /// Package file to patch (scans the current directory when omitted)
    pub package_file: Option<PathBuf>,

    /// Target package identifier (auto-detected when omitted)
    #[arg(short, long)]
    pub package: Option<String>,

    /// When filtering by package, also include universal patches
    #[arg(long)]
    pub include_universal: bool,

    /// Only apply the explicitly selected patches
    #[arg(long, default_value = "true")]
    #[arg(action = clap::ArgAction::Set)]
    pub exclusive: bool,

    /// Accept the engine's default-enabled patches without prompting
    #[arg(long)]
    pub auto: bool,

    /// Patch engine executable (.jar)
    #[arg(long)]
    pub engine_jar: Option<PathBuf>,

    /// Patch-definition bundle
    #[arg(long)]
    pub bundle: Option<PathBuf>,

    /// Split-package editor tool (.jar), needed for .apkm/.xapk inputs
    #[arg(long)]
    pub editor_jar: Option<PathBuf>,

    /// Output directory for the patched package
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Path to the keystore used for signing
    #[arg(long)]
    pub keystore: Option<String>,

    /// Password for the keystore
    #[arg(long)]
    pub keystore_password: Option<String>,

    /// Alias of the signing key entry
    #[arg(long)]
    pub key_alias: Option<String>,

    /// Password for the signing key entry
    #[arg(long)]
    pub key_password: Option<String>,

    /// Extra arguments passed to the engine verbatim (after --)
    #[arg(last = true)]
    pub extra_args: Vec<String>,
}

#[derive(Parser)]
pub struct ListPatchesArgs {
    /// Patch engine executable (.jar)
    #[arg(long)]
    pub engine_jar: Option<PathBuf>,

    /// Patch-definition bundle
    #[arg(long)]
    pub bundle: Option<PathBuf>,

    /// Only show patches declaring compatibility with this package
    #[arg(short, long)]
    pub package: Option<String>,

    /// When filtering by package, also include universal patches
    #[arg(long)]
    pub include_universal: bool,

    /// Emit the catalog as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct DetectArgs {
    /// Package file to inspect
    pub package_file: PathBuf,

    /// Emit JSON instead of human text
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct MergeArgs {
    /// Split archive (.apkm/.xapk) to merge
    pub archive: PathBuf,

    /// Split-package editor tool (.jar)
    #[arg(long)]
    pub editor_jar: Option<PathBuf>,

    /// Output path for the merged package (defaults to <archive>.apk)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Toolchain artifact kinds tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ToolKind {
    /// Patch engine executable
    Engine,
    /// Patch-definition bundle
    Bundle,
    /// Split-package editor tool
    Editor,
}

impl ToolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolKind::Engine => "engine",
            ToolKind::Bundle => "bundle",
            ToolKind::Editor => "editor",
        }
    }

    /// CLI flag that overrides the registry for this kind.
    pub fn flag(self) -> &'static str {
        match self {
            ToolKind::Engine => "--engine-jar",
            ToolKind::Bundle => "--bundle",
            ToolKind::Editor => "--editor-jar",
        }
    }
}

#[derive(Parser)]
pub struct ToolsArgs {
    #[command(subcommand)]
    pub command: ToolsSubcommand,
}

#[derive(Subcommand)]
pub enum ToolsSubcommand {
    /// Register a toolchain artifact for future runs
    Register(ToolsRegisterArgs),

    /// Show registered artifacts
    Show(ToolsShowArgs),

    /// Clear the registry
    Clear,
}

#[derive(Parser, Debug)]
pub struct ToolsRegisterArgs {
    /// Artifact kind
    #[arg(value_enum)]
    pub kind: ToolKind,

    /// Path to the artifact
    pub path: PathBuf,

    /// Release tag to record alongside the artifact
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ToolsShowArgs {
    /// Machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
