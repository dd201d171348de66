//! claude-guard CLI - Session guard for Claude Code.

use clap::{Parser, Subcommand};
use claude_guard::cli;
use claude_guard::core::stats::Period;
use claude_guard::logging;
use std::process::ExitCode;

/// Get the version string.
///
/// - Release builds (on a git tag): "0.2.0"
/// - Development builds: "0.2.0-dev (abc1234)"
/// - Dirty working directory: "0.2.0-dev (abc1234-dirty)"
fn version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GUARD_GIT_HASH");
    const IS_RELEASE: &str = env!("GUARD_IS_RELEASE");

    static VERSION_STRING: std::sync::OnceLock<String> = std::sync::OnceLock::new();

    VERSION_STRING.get_or_init(|| {
        if IS_RELEASE == "true" {
            VERSION.to_string()
        } else {
            format!("{VERSION}-dev ({GIT_HASH})")
        }
    })
}

#[derive(Parser)]
#[command(name = "claude-guard")]
#[command(author, version = version(), about = "Session guard for Claude Code", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// [Internal] Run a hook (JSON stdin/stdout). Called by Claude Code hooks.
    Hook {
        /// Hook name (session-start, post-tool-use, stop, session-end).
        name: String,
    },

    /// [User] Show token usage and estimated cost.
    Stats {
        /// Session ID or unique prefix.
        #[arg(short, long)]
        session: Option<String>,

        /// Reporting period.
        #[arg(short, long, value_enum)]
        period: Option<Period>,

        /// Per-day breakdown for the last N days.
        #[arg(short, long, num_args = 0..=1, default_missing_value = "7")]
        daily: Option<u32>,
    },

    /// [User] Show storage location, session counts and tracked tokens.
    Status,

    /// [User] List recent sessions.
    List {
        /// Maximum number of sessions to show. Defaults to 20.
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// [User] Dump a session's stored state as JSON.
    Show {
        /// Session ID or unique prefix.
        session_id: String,
    },

    /// [User] Print the recovery context for a session.
    Recover {
        /// Session ID or unique prefix.
        session_id: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    let result = match cli.command {
        Commands::Hook { name } => cli::hook::run(&name),
        Commands::Stats {
            session,
            period,
            daily,
        } => cli::stats::run(session.as_deref(), period, daily),
        Commands::Status => cli::status::run(),
        Commands::List { limit } => cli::list::run(limit),
        Commands::Show { session_id } => cli::show::run(&session_id),
        Commands::Recover { session_id } => cli::recover::run(&session_id),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("claude-guard: error: {e}");
            ExitCode::FAILURE
        }
    }
}
