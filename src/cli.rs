//! Command-line surface.
//!
//! Generalizes the teacher's `main.rs` `Cli`/`Commands` derive from the
//! single-purpose `Init`/`Auth`/`Sync`/`List`/`Daemon`/`Doctor` set down to
//! the `sync`/`list` surface plus the deprecated `clone-all`/`pull-all`
//! aliases. `Init`, `Auth`, `Daemon` and `Doctor` have no counterpart here:
//! provider credentials live in an external YAML store (`mgit login` is out
//! of scope) and there is no long-running daemon mode.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mgit")]
#[command(about = "Multi-provider git fleet-management tool")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Provider configuration file path (defaults to XDG config location)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clone/pull every repository matching PATTERN into PATH
    Sync {
        /// Query pattern: org/project/repo, each segment a glob
        pattern: String,

        /// Destination directory (defaults to the configured base directory)
        path: Option<PathBuf>,

        /// Restrict resolution to a single named provider
        #[arg(long)]
        provider: Option<String>,

        /// Force re-clone of existing directories (requires confirmation
        /// unless --yes is also given)
        #[arg(long)]
        force: bool,

        /// Skip the force-reclone confirmation prompt
        #[arg(long)]
        yes: bool,

        /// Maximum concurrent clone/pull operations
        #[arg(long)]
        concurrency: Option<usize>,

        /// Preview planned actions without making changes
        #[arg(long)]
        dry_run: bool,

        /// Use the flat, collision-resolved layout instead of host/org/repo
        #[arg(long)]
        hierarchy: bool,
    },

    /// List repositories matching QUERY without cloning
    List {
        query: String,

        #[arg(long)]
        provider: Option<String>,

        #[arg(long, value_enum, default_value_t = ListFormat::Table)]
        format: ListFormat,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Deprecated alias for `sync --update-mode skip`
    #[command(name = "clone-all")]
    CloneAll {
        pattern: String,
        path: Option<PathBuf>,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Deprecated alias for `sync --update-mode pull`
    #[command(name = "pull-all")]
    PullAll {
        pattern: String,
        path: Option<PathBuf>,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ListFormat {
    Table,
    Json,
}
