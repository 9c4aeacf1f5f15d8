//! docbridge CLI
//!
//! Keeps a Markdown vault and a remote page workspace in step.
//!
//! # Commands
//!
//! - `once` - Run one pull-then-push cycle (the default)
//! - `daemon` - Run a cycle every interval until interrupted
//! - `pull` / `push` - Run a single phase
//! - `detect` - Report (and optionally mark) local edits in the pulled tree
//! - `status` - Show the cycle ledger and change-detection counts
//! - `reset` - Clear change-detection state
//! - `cleanup` - Delete old archive records

mod client;
mod commands;
mod error;

use clap::{Parser, Subcommand};
use docbridge_sync_engine::RemoteConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Two-way sync between a Markdown vault and a remote page workspace.
#[derive(Parser, Debug)]
#[command(name = "docbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the vault directory
    #[arg(global = true, long, env = "DOCBRIDGE_VAULT", default_value = ".")]
    vault: PathBuf,

    /// API token for the remote workspace
    #[arg(global = true, long, env = "DOCBRIDGE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// API base URL
    #[arg(global = true, long, env = "DOCBRIDGE_API_URL", default_value = RemoteConfig::DEFAULT_BASE_URL)]
    api_url: String,

    /// Id of the synchronization record database (discovered by title when unset)
    #[arg(global = true, long, env = "DOCBRIDGE_RECORD_DATABASE")]
    record_database: Option<String>,

    /// Author marker written by local tools
    #[arg(global = true, long, env = "DOCBRIDGE_LOCAL_AUTHOR", default_value = "local")]
    local_author: String,

    /// Minutes between daemon cycles
    #[arg(global = true, long, env = "DOCBRIDGE_SYNC_INTERVAL_MINUTES", default_value_t = 15)]
    interval_minutes: u64,

    /// Wall-clock bound for one cycle, in seconds
    #[arg(global = true, long, default_value_t = 300)]
    cycle_timeout_secs: u64,

    /// Items requested per remote listing page (at most 100)
    #[arg(global = true, long, env = "DOCBRIDGE_PAGE_SIZE", default_value_t = 100)]
    page_size: u32,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Commands {
    /// Run one pull-then-push cycle
    Once,

    /// Run a cycle every interval until Ctrl-C
    Daemon,

    /// Pull remote pages into the vault
    Pull,

    /// Push local edits upstream
    Push,

    /// Report local edits in the pulled tree
    Detect {
        /// Mark changed documents pending
        #[arg(short, long)]
        mark: bool,
    },

    /// Show the cycle ledger and change-detection counts
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Clear change-detection state
    Reset,

    /// Delete archive records older than a number of days
    Cleanup {
        /// Maximum age in days
        #[arg(short, long, default_value_t = 30)]
        days: u64,
    },
}

impl Cli {
    fn settings(&self) -> commands::Settings {
        let mut remote = RemoteConfig::new().with_base_url(self.api_url.as_str());
        if let Some(token) = &self.token {
            remote = remote.with_token(token.as_str());
        }
        if let Some(id) = self.record_database.as_deref().filter(|id| !id.trim().is_empty()) {
            remote = remote.with_record_database(id);
        }
        commands::Settings {
            vault: self.vault.clone(),
            local_author: self.local_author.clone(),
            remote,
            interval: Duration::from_secs(self.interval_minutes.max(1) * 60),
            cycle_timeout: Duration::from_secs(self.cycle_timeout_secs.max(1)),
            page_size: self.page_size,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = cli.settings();
    let outcome = match cli.command.clone().unwrap_or(Commands::Once) {
        Commands::Once => commands::cycle::once(&settings),
        Commands::Daemon => commands::daemon::run(&settings),
        Commands::Pull => commands::cycle::pull(&settings),
        Commands::Push => commands::cycle::push(&settings),
        Commands::Detect { mark } => commands::detect::run(&settings, mark),
        Commands::Status { format } => commands::status::run(&settings, &format),
        Commands::Reset => commands::maintenance::reset(&settings),
        Commands::Cleanup { days } => commands::maintenance::cleanup(&settings, days),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "docbridge failed");
            ExitCode::FAILURE
        }
    }
}
