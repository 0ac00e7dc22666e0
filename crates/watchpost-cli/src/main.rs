mod config;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use watchpost_client::{DiscordNotifier, ReqwestFetcher, TextCleaner};
use watchpost_core::{MonitorService, Termination, TracingMonitorReporter};

use crate::config::{RuntimeConfig, Settings, log_directives};

const EXIT_FATAL: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let settings = Settings::parse();

    if let Err(e) = init_tracing(&settings.log_level) {
        eprintln!("Error: {e:#}");
        return ExitCode::from(EXIT_CONFIG);
    }

    let config = match settings.into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match run(config).await {
        Termination::Cancelled => ExitCode::SUCCESS,
        Termination::Fatal => ExitCode::from(EXIT_FATAL),
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directives = log_directives(log_level)?;
            EnvFilter::try_new(&directives)
                .with_context(|| format!("Invalid log filter '{directives}'"))?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to install tracing subscriber")
}

async fn run(config: RuntimeConfig) -> Termination {
    let RuntimeConfig { monitor, discord } = config;

    tracing::info!("Starting Watchpost...");
    for line in monitor.summary_lines() {
        tracing::info!("{line}");
    }
    if !discord.is_configured() {
        tracing::warn!("Discord not configured; notifications will only be logged");
    }

    let fetcher = ReqwestFetcher::with_timeout(monitor.policy.timeout);
    let notifier = DiscordNotifier::new(discord).with_timeout(monitor.policy.timeout);
    let service = MonitorService::new(fetcher, TextCleaner::new(), notifier, monitor);

    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    service.run(cancel_token, &TracingMonitorReporter).await
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
    cancel_token.cancel();
}
