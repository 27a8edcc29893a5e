// HTS token-service conformance runner
//
// Usage:
//   hts-tck --config hts-tck.json features/token_service.feature --tag transfer

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use hts_testing_framework::config::{HarnessConfig, LOCAL_NETWORK};
use hts_testing_framework::logging::init_logging;
use hts_testing_framework::orchestrator::{Clock, SystemClock};
use hts_testing_framework::scenarios::{
    read_feature, token_service_steps, RunnerSettings, ScenarioRunner,
};

#[derive(Parser, Debug)]
#[command(name = "hts-tck")]
#[command(about = "Run token-service feature files against a ledger", version)]
struct Args {
    /// Path to the harness configuration
    #[arg(short, long, default_value = "hts-tck.json")]
    config: PathBuf,

    /// Feature files to run
    #[arg(required = true)]
    features: Vec<PathBuf>,

    /// Only run scenarios with one of these tags (repeatable)
    #[arg(short, long = "tag")]
    tags: Vec<String>,

    /// Per-step timeout in seconds, overrides the configuration
    #[arg(long)]
    step_timeout: Option<u64>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write the run report as JSON to this file
    #[arg(long)]
    report_json: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether every scenario passed
async fn run(args: Args) -> Result<bool> {
    let level: LevelFilter = args
        .log_level
        .parse()
        .map_err(|_| anyhow!("Invalid log level '{}'", args.log_level))?;
    init_logging(level, args.log_file.as_deref())?;

    let config = HarnessConfig::load(&args.config)?;
    if config.network != LOCAL_NETWORK {
        bail!(
            "Network '{}' is not supported, only '{}' can be run",
            config.network,
            LOCAL_NETWORK
        );
    }

    let mut settings = RunnerSettings::from_config(&config).with_tags(args.tags.clone());
    if let Some(secs) = args.step_timeout {
        if secs == 0 {
            bail!("--step-timeout must be greater than 0");
        }
        settings = settings.with_step_timeout(Duration::from_secs(secs));
    }

    let features = args
        .features
        .iter()
        .map(|path| read_feature(path))
        .collect::<Result<Vec<_>>>()?;

    let registry = Arc::new(token_service_steps().context("Invalid step pattern")?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (runner, _ledger) = ScenarioRunner::local(registry, &config, settings, clock)?;

    info!(
        "Loaded {} feature(s) from {}",
        features.len(),
        args.config.display()
    );
    let report = runner.run(&features).await;
    report.print();

    if let Some(path) = &args.report_json {
        let json = report.to_json().context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(report.all_passed())
}
