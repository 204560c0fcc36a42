//! `reposync check` — validate the configuration without touching any
//! repository.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use reposync_core::{Config, Overrides};

use super::{ConfigArgs, DryRunArgs};

/// Arguments for `reposync check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub dry_run: DryRunArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    repositories: Vec<String>,
    bindings: Vec<BindingCheck>,
    dry_run: bool,
    host: String,
    branch_pattern: String,
    branch_template: String,
    base_branches: Vec<String>,
    concurrency: usize,
    workspace: String,
    commit_message: String,
    pr_title: String,
}

#[derive(Debug, Serialize)]
struct BindingCheck {
    binding: String,
    source_exists: bool,
}

impl CheckArgs {
    pub fn run(self) -> Result<ExitCode> {
        let config = self.config.load(Overrides {
            dry_run: self.dry_run.value(),
            ..Overrides::default()
        })?;
        let report = build_report(&config);

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize check JSON")?
            );
        } else {
            print_report(&report);
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn build_report(config: &Config) -> CheckReport {
    CheckReport {
        repositories: config
            .repositories
            .iter()
            .map(|r| r.full_name())
            .collect(),
        bindings: config
            .bindings
            .iter()
            .map(|b| BindingCheck {
                binding: b.to_string(),
                source_exists: config.source_root.join(&b.source).exists(),
            })
            .collect(),
        dry_run: config.dry_run,
        host: config.forge.host.clone(),
        branch_pattern: config.branch_policy.pattern().to_string(),
        branch_template: config.branch_policy.template().to_string(),
        base_branches: config.base_branches.clone(),
        concurrency: config.concurrency,
        workspace: config.workspace.display().to_string(),
        commit_message: config.commit_message.clone(),
        pr_title: config.pr_title.clone(),
    }
}

fn print_report(report: &CheckReport) {
    println!("{} configuration is valid", "✓".green().bold());
    println!("{}", "repositories".bold());
    for repo in &report.repositories {
        println!("  {repo}");
    }
    println!("{}", "bindings".bold());
    for b in &report.bindings {
        if b.source_exists {
            println!("  {}", b.binding);
        } else {
            println!("  {} {}", b.binding, "(source missing)".yellow());
        }
    }
    println!("dry run:        {}", report.dry_run);
    println!("forge host:     {}", report.host);
    println!(
        "sync branch:    {} (new: {})",
        report.branch_pattern, report.branch_template
    );
    println!("base branches:  {}", report.base_branches.join(", "));
    println!("concurrency:    {}", report.concurrency);
    println!("workspace:      {}", report.workspace);
    println!("pr title:       {}", report.pr_title);
}
