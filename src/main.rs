use anyhow::Result;
use clap::Parser;
use patchup::cli::{AppContext, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Diagnostics go to stderr so captured stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Patch(args) => patchup::patch_run(args, &ctx),
        Commands::ListPatches(args) => patchup::list_run(args, &ctx),
        Commands::Detect(args) => patchup::core::apk::detect_run(args, &ctx),
        Commands::Merge(args) => patchup::core::apk::merge_run(args, &ctx),
        Commands::Tools(args) => patchup::infra::cache::tools_run(args, &ctx),
        Commands::Init(args) => patchup::infra::config::init(args, &ctx),
        Commands::Completions(args) => patchup::completion::run(args),
    }
}
