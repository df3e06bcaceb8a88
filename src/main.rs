// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use hcpverify::{
    cleanup::cleanup_expired,
    client::{ArmClient, ResourceClient},
    config::HarnessConfig,
    harness::{ScenarioHarness, ScenarioReport},
    metrics, scenarios, telemetry,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "hcpverify", version, about = "Hosted control plane end-to-end verifier")]
struct Cli {
    /// YAML configuration file; environment variables override its values
    #[arg(long, short, global = true, env = "HCPVERIFY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Command {
    /// List the built-in scenarios
    List,
    /// Run scenarios and write a report per scenario
    Run {
        /// Scenario to run; repeat for several. Runs every scenario when omitted.
        #[arg(long = "scenario", short)]
        scenarios: Vec<String>,
        /// Maximum number of scenarios running at once
        #[arg(long)]
        parallelism: Option<usize>,
        /// Leave created resources in place
        #[arg(long)]
        skip_cleanup: bool,
    },
    /// Delete harness resource groups whose deleteAfter tag has passed
    CleanupExpired,
}

fn main() -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("hcpverify")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<ExitCode> {
    let cli = Cli::parse();
    telemetry::init_tracing();
    debug!("Logging initialized with file and line number tracking");

    if let Command::List = cli.command {
        for scenario in scenarios::builtin_scenarios() {
            println!(
                "{:<36} [{}] {}",
                scenario.name(),
                scenario.labels().join(","),
                scenario.description()
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = HarnessConfig::load(cli.config.as_deref())?;
    if let Command::Run {
        parallelism,
        skip_cleanup,
        ..
    } = &cli.command
    {
        if let Some(parallelism) = parallelism {
            config.parallelism = *parallelism;
        }
        config.skip_cleanup |= *skip_cleanup;
    }
    config.validate()?;
    info!(
        subscription = %config.subscription_id,
        location = %config.location,
        endpoint = %config.arm_endpoint,
        "Configuration loaded"
    );

    let client: Arc<dyn ResourceClient> = Arc::new(ArmClient::new(
        &config.arm_endpoint,
        config.token.clone(),
        config.accept_invalid_certs,
    )?);
    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    let config = Arc::new(config);
    let exit = match cli.command {
        Command::List => ExitCode::SUCCESS,
        Command::Run { scenarios, .. } => run(client, Arc::clone(&config), &scenarios, shutdown).await?,
        Command::CleanupExpired => {
            let summary = cleanup_expired(client, &config, Utc::now(), &shutdown).await?;
            info!(
                deleted = summary.deleted.len(),
                failed = summary.failed.len(),
                "Expired resource group cleanup finished"
            );
            if let Some(dir) = &config.artifact_dir {
                write_json(&dir.join("cleanup-expired.json"), &summary).await?;
            }
            if summary.failed.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    };

    if let Some(dir) = &config.artifact_dir {
        write_metrics(dir).await;
    }
    Ok(exit)
}

async fn run(
    client: Arc<dyn ResourceClient>,
    config: Arc<HarnessConfig>,
    names: &[String],
    shutdown: CancellationToken,
) -> Result<ExitCode> {
    let selected = scenarios::select_scenarios(names)?;
    let harness = ScenarioHarness::new(client, Arc::clone(&config)).with_shutdown(shutdown);

    let reports = harness.run_all(&selected).await;

    if let Some(dir) = &config.artifact_dir {
        for report in &reports {
            write_json(&dir.join(format!("{}.json", report.scenario)), report).await?;
        }
    }

    let failed: Vec<&ScenarioReport> = reports.iter().filter(|r| !r.passed).collect();
    for report in &reports {
        let verdict = if report.passed { "PASS" } else { "FAIL" };
        println!("{verdict} {:<36} {:>8.1?} {}", report.scenario, report.duration, report.message);
        if !report.cleanup_clean() && !report.cleanup_skipped {
            warn!(
                scenario = %report.scenario,
                failures = report.cleanup_failures.len(),
                "Cleanup incomplete"
            );
        }
    }
    info!(
        total = reports.len(),
        failed = failed.len(),
        "Scenario run finished"
    );

    Ok(if failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("Interrupt received, canceling running scenarios");
            shutdown.cancel();
        }
        Err(e) => error!(error = %e, "Failed to listen for interrupt signal"),
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), "Wrote report");
    Ok(())
}

/// Metrics are best effort; a failure here never changes the exit code.
async fn write_metrics(dir: &Path) {
    let path = dir.join("metrics.prom");
    let written = match metrics::gather_metrics() {
        Ok(text) => tokio::fs::write(&path, text).await.map_err(anyhow::Error::from),
        Err(e) => Err(anyhow::Error::from(e)),
    };
    if let Err(e) = written {
        warn!(path = %path.display(), error = %e, "Failed to write metrics");
    }
}
