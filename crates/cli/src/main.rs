mod args;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sourcefinder_core::{
    load_config, load_config_from_env, validate_config, Config, RedditApi, RedditClient,
    ResolutionResult, Resolver, SanitizedConfig,
};

use args::{Cli, CONFIG_ENV};

/// Exit code when resolution ended in a `Failure`.
const EXIT_FAILURE_RESULT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(
            cli.log_json
                .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
        )
        .with(
            (!cli.log_json)
                .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        )
        .init();

    let config_path = cli.config_path(std::env::var(CONFIG_ENV).ok());
    let config = load(&config_path)?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    info!(
        oauth = sanitized.reddit.oauth_configured,
        base_url = %sanitized.reddit.base_url,
        "Configuration loaded"
    );

    let query = cli.query(std::io::stdin().lock())?;

    let client = RedditClient::new(config.reddit.clone(), config.pacing.clone())
        .context("Failed to create Reddit client")?;
    let api: Arc<dyn RedditApi> = Arc::new(client);
    let resolver = Resolver::try_new(api, config.resolver.clone())
        .context("Invalid resolver configuration")?;

    let cancel = CancellationToken::new();
    let watchdog = tokio::spawn(cancel_on_interrupt_or_timeout(
        cancel.clone(),
        config.resolver.timeout_secs.map(Duration::from_secs),
    ));

    let report = resolver.resolve_detailed(&query, &cancel).await;
    watchdog.abort();

    let output = match (cli.report, cli.pretty) {
        (true, true) => serde_json::to_string_pretty(&report),
        (true, false) => serde_json::to_string(&report),
        (false, true) => serde_json::to_string_pretty(&report.result),
        (false, false) => serde_json::to_string(&report.result),
    }
    .context("Failed to serialize result")?;
    println!("{}", output);

    Ok(match report.result {
        ResolutionResult::Failure { .. } => ExitCode::from(EXIT_FAILURE_RESULT),
        _ => ExitCode::SUCCESS,
    })
}

/// Load the config file, or defaults plus environment overrides when it does not exist.
fn load(path: &Path) -> Result<Config> {
    if path.exists() {
        info!("Loading configuration from {:?}", path);
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))
    } else {
        info!("No config file at {:?}, using defaults", path);
        load_config_from_env().context("Failed to load config from environment")
    }
}

/// Cancel the resolution on Ctrl-C or once the overall timeout elapses.
async fn cancel_on_interrupt_or_timeout(cancel: CancellationToken, timeout: Option<Duration>) {
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            info!("Interrupted, stopping after the current strategy");
        }
        _ = deadline => {
            warn!("Resolution timed out, stopping after the current strategy");
        }
    }
    cancel.cancel();
}
