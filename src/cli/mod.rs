pub mod commands;

use crate::errors::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::branch::BranchAction;
use commands::commit::CommitAction;
use commands::repo::RepoAction;
use commands::stack_cmd::StackAction;
use commands::upstack::UpstackAction;

#[derive(Parser)]
#[command(name = "gs")]
#[command(about = "git-spice - stacked branch management for git")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the repository for stacking
    Init {
        /// Trunk branch name (defaults to the current branch)
        #[arg(long)]
        trunk: Option<String>,
    },

    /// Branch management
    Branch {
        #[command(subcommand)]
        action: BranchAction,
    },

    /// Operations on a branch and the branches above it
    Upstack {
        #[command(subcommand)]
        action: UpstackAction,
    },

    /// Operations on the whole stack of a branch
    Stack {
        #[command(subcommand)]
        action: StackAction,
    },

    /// Repository-wide operations
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },

    /// Commit management
    Commit {
        #[command(subcommand)]
        action: CommitAction,
    },

    /// Continue an interrupted operation after resolving conflicts
    Continue {
        /// Open an editor to edit continuation commit messages
        #[arg(long, overrides_with = "no_edit")]
        edit: bool,

        /// Take continuation commit messages as-is
        #[arg(long)]
        no_edit: bool,
    },

    /// Abort an interrupted operation, discarding queued work
    Abort,

    /// List tracked branches and their restack status
    Log,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        self.setup_logging();
        self.command.execute()
    }

    fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time();

        if self.no_color {
            subscriber.with_ansi(false).init();
        } else {
            subscriber.init();
        }
    }
}

impl Commands {
    /// Dispatch without touching process-level setup, so continuations can
    /// re-enter commands parsed from the queue.
    pub fn execute(self) -> Result<()> {
        match self {
            Commands::Init { trunk } => commands::init::run(trunk),
            Commands::Branch { action } => commands::branch::run(action),
            Commands::Upstack { action } => commands::upstack::run(action),
            Commands::Stack { action } => commands::stack_cmd::run(action),
            Commands::Repo { action } => commands::repo::run(action),
            Commands::Commit { action } => commands::commit::run(action),
            Commands::Continue { edit: _, no_edit } => commands::continue_cmd::run(!no_edit),
            Commands::Abort => commands::abort::run(),
            Commands::Log => commands::log_cmd::run(),
            Commands::Completions { shell } => commands::completions::run(shell),
        }
    }
}
