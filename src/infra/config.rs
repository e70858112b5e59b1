use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directories skipped when scanning for package files
    pub exclude_dirs: Vec<String>,

    /// Output directory for patched packages
    pub output_dir: PathBuf,

    /// JVM tuning options passed to every engine invocation
    pub jvm_opts: Vec<String>,

    /// Supported Java runtime range
    pub java: JavaConfig,

    /// Default toolchain artifact paths
    pub tools: ToolsConfig,

    /// Default signing parameters
    pub signing: SigningConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JavaConfig {
    /// Lowest supported major version (inclusive)
    pub min_version: u32,
    /// Lowest unsupported major version (exclusive upper bound)
    pub max_version: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Patch engine executable (.jar)
    pub engine: Option<PathBuf>,
    /// Patch-definition bundle
    pub bundle: Option<PathBuf>,
    /// Split-package editor tool (.jar)
    pub editor: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SigningConfig {
    pub keystore: Option<String>,
    pub keystore_password: Option<String>,
    pub entry_alias: Option<String>,
    pub entry_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exclude_dirs: vec![
                "output".to_string(),
                ".git".to_string(),
                ".cache".to_string(),
                "target".to_string(),
                "node_modules".to_string(),
                "build".to_string(),
                "dist".to_string(),
            ],
            output_dir: PathBuf::from("output"),
            jvm_opts: vec![
                "-XX:+UseG1GC".to_string(),
                "-XX:+ParallelRefProcEnabled".to_string(),
                "-XX:MaxGCPauseMillis=200".to_string(),
                "-Xmx4G".to_string(),
                "-Xms512M".to_string(),
            ],
            java: JavaConfig { min_version: 17, max_version: 25 },
            tools: ToolsConfig::default(),
            signing: SigningConfig::default(),
        }
    }
}

pub fn load_config() -> Result<Config> {
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    let config_paths = ["patchup.toml", ".patchup.toml"];

    for path in &config_paths {
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
            break;
        }
    }

    // Add environment variables with PATCHUP_ prefix
    builder = builder.add_source(config::Environment::with_prefix("PATCHUP").separator("_"));

    let cfg = builder.build().context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(args: InitArgs, ctx: &AppContext) -> Result<()> {
    let config_path = args.path.join("patchup.toml");

    if config_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
