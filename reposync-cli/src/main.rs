//! reposync — keep shared files in sync across many GitHub repositories.
//!
//! # Usage
//!
//! ```text
//! reposync sync  [--config reposync.yaml] [--dry-run[=BOOL]|--no-dry-run] [--repo owner/name]...
//!                [--concurrency N] [--timeout SECS] [--json] [--verbose]
//! reposync check [--config reposync.yaml] [--json]
//! ```
//!
//! Exit codes: 0 when every repository succeeded, 1 when at least one
//! failed, 2 when the configuration is invalid.

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use reposync_core::ConfigError;

use commands::{check::CheckArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "reposync",
    version,
    about = "Sync files from a source tree into many GitHub repositories through pull requests",
    long_about = None,
)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy the bound files into every repository and open or update a pull request.
    Sync(SyncArgs),

    /// Validate the configuration and print what a run would use.
    Check(CheckArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

const EXIT_FAILED: u8 = 1;
const EXIT_CONFIG: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Check(args) => args.run(),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            if err.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::from(EXIT_FAILED)
            }
        }
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
