//! `reposync sync` — sync every configured repository.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use reposync_core::{Config, Overrides};
use reposync_forge::OctocrabForge;
use reposync_sync::{cancel, pipeline, GitCli, RunSummary, SyncOutcome, SyncReport};

use super::{ConfigArgs, DryRunArgs};

/// Arguments for `reposync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub dry_run: DryRunArgs,

    /// Restrict the run to this repository; repeatable.
    #[arg(long = "repo", value_name = "OWNER/NAME")]
    pub repos: Vec<String>,

    /// Number of repositories synced at the same time.
    #[arg(long, env = "REPOSYNC_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Cancel whatever is still running after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<ExitCode> {
        let config = self.config.load(Overrides {
            dry_run: self.dry_run.value(),
            concurrency: self.concurrency,
            only: self.repos.clone(),
            ..Overrides::default()
        })?;
        config.log_summary();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let summary = runtime.block_on(execute(&config, self.timeout.map(Duration::from_secs)))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("failed to serialize run summary")?
            );
        } else {
            print_summary(&summary);
        }

        Ok(if summary.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(crate::EXIT_FAILED)
        })
    }
}

/// Run the pipeline, cancelling it on Ctrl-C or when `timeout` elapses.
async fn execute(config: &Config, timeout: Option<Duration>) -> Result<RunSummary> {
    let forge = Arc::new(
        OctocrabForge::connect(&config.forge.host, &config.forge.token)
            .context("failed to set up forge client")?,
    );
    let git = Arc::new(GitCli::github(&config.forge.host, &config.forge.token));
    let (handle, signal) = cancel::channel();

    let run = pipeline::run(config, forge, git, signal);
    tokio::pin!(run);
    let deadline = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut watch_ctrl_c = true;
    let mut watch_deadline = true;
    loop {
        tokio::select! {
            result = &mut run => return result.context("sync run failed"),
            signal = tokio::signal::ctrl_c(), if watch_ctrl_c => {
                watch_ctrl_c = false;
                match signal {
                    Ok(()) => {
                        tracing::warn!("received ctrl-c, cancelling remaining work");
                        handle.cancel();
                    }
                    Err(err) => tracing::warn!(error = %err, "ctrl-c handler failed"),
                }
            }
            _ = &mut deadline, if watch_deadline => {
                watch_deadline = false;
                tracing::warn!(
                    timeout_secs = timeout.map(|t| t.as_secs()).unwrap_or_default(),
                    "timeout reached, cancelling remaining work"
                );
                handle.cancel();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "result")]
    result: String,
    #[tabled(rename = "branch")]
    branch: String,
    #[tabled(rename = "changes")]
    changes: usize,
    #[tabled(rename = "detail")]
    detail: String,
}

fn print_summary(summary: &RunSummary) {
    let prefix = if summary.dry_run { "[dry-run] " } else { "" };
    if summary.reports.is_empty() {
        println!("{prefix}No repositories to sync.");
        return;
    }

    let rows: Vec<ReportRow> = summary.reports.iter().map(report_row).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    for report in &summary.reports {
        for warning in &report.warnings {
            println!(
                "{} {}: {warning}",
                "warning:".yellow().bold(),
                report.repository
            );
        }
        if let Some(err) = &report.cleanup_error {
            println!(
                "{} {}: workspace not removed: {err}",
                "warning:".yellow().bold(),
                report.repository
            );
        }
    }

    let line = format!(
        "{prefix}{} repositories: {} published, {} would change, {} unchanged, {} failed ({:.1}s)",
        summary.reports.len(),
        summary.published(),
        summary.would_change(),
        summary.unchanged(),
        summary.failed(),
        summary.duration_ms as f64 / 1000.0,
    );
    if summary.is_success() {
        println!("{} {line}", "✓".green().bold());
    } else {
        println!("{} {line}", "✗".red().bold());
    }
}

fn report_row(report: &SyncReport) -> ReportRow {
    let result = match &report.outcome {
        SyncOutcome::NoChange => report.outcome.to_string().bright_black().to_string(),
        SyncOutcome::WouldChange => report.outcome.to_string().yellow().to_string(),
        SyncOutcome::Published { .. } => report.outcome.to_string().green().to_string(),
        SyncOutcome::Failed { .. } => report.outcome.to_string().red().bold().to_string(),
    };
    let detail = match &report.outcome {
        SyncOutcome::Published { url, .. } => url.clone(),
        SyncOutcome::Failed { error, .. } => error.clone(),
        SyncOutcome::WouldChange | SyncOutcome::NoChange => String::new(),
    };
    ReportRow {
        repository: report.repository.to_string(),
        result,
        branch: report
            .proposal
            .as_ref()
            .map(|p| p.branch_name.clone())
            .unwrap_or_else(|| "-".to_string()),
        changes: report.changed_paths.len(),
        detail,
    }
}
