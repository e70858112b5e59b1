//! **patchup** - Fast Rust CLI for patching Android application packages
//!
//! Drives an external patch engine: parses its patch listing into a
//! structured catalog, resolves operator selections into a deterministic
//! argument list, and handles package discovery, identification, and
//! split-archive merging around it.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core pipeline - catalog parsing, selection, invocation, engine glue
pub mod core {
    /// Listing text → structured patch records, plus catalog filtering
    pub mod catalog;
    pub use catalog::{OptionSchema, PatchRecord, filter_catalog, parse_listing, split_blocks};

    /// Operator choices → resolved, option-bound selections
    pub mod select;
    pub use select::{ChoiceKey, OperatorPrompt, Selection, resolve_selections};

    /// Selections → ordered engine argument list
    pub mod invoke;
    pub use invoke::{SigningArgs, build_patch_args};

    /// Java runtime gate and external engine subprocess glue
    pub mod engine;
    pub use engine::{JavaRuntime, PatchEngine};

    /// Package discovery, identification, and split-archive merging
    pub mod apk;

    /// End-to-end patch and list flows
    pub mod pipeline;
    pub use pipeline::{list_run, patch_run};
}

/// Infrastructure - configuration, registry, prompts, and utilities
pub mod infra {
    /// Configuration management with TOML support and env overrides
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Toolchain registry persisted under the user cache directory
    pub mod cache;
    pub use cache::{ToolCache, resolve_tool};

    /// Console operator prompts over stdin/stdout
    pub mod prompt;
    pub use prompt::{AutoPrompt, ConsolePrompt};

    /// Utility functions and helpers for common operations
    pub mod utils;
    // Keep utils private - not part of the public API
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use core::{list_run, patch_run};
pub use infra::{Config, load_config};

// Core types for external consumers
pub use core::catalog::{OptionSchema, PatchRecord};
pub use core::invoke::{SigningArgs, build_patch_args};
pub use core::select::{ChoiceKey, Selection};
