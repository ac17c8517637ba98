use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tablethive_core::{
    load_config, load_identities, metrics, validate_config, FleetOrchestrator, HttpTransport,
    Transport,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn config_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("TABLETHIVE_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.json"))
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("TabletHive v{}", VERSION);

    let config_path = config_path();
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;
    info!(server = %config.server, endpoints = config.endpoints.len(), "Configuration loaded");

    let identities = load_identities(&config, None)
        .await
        .with_context(|| format!("Failed to load identities from {:?}", config.token_file_path))?;

    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::new(config.request_timeout()).context("Failed to create HTTP client")?,
    );

    let report_path = config.report.path.clone();
    let metrics_path = config.report.metrics_path.clone();

    let mut orchestrator = FleetOrchestrator::new(config, identities, transport)
        .context("Failed to create fleet orchestrator")?;
    let report = orchestrator.run().await.context("Fleet run failed")?;

    if let Some(path) = metrics_path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        tokio::fs::write(&path, metrics::encode_metrics())
            .await
            .with_context(|| format!("Failed to write metrics to {:?}", path))?;
        info!("Metrics written to {:?}", path);
    }

    if report.transport_failures() > 0 {
        warn!(
            failures = report.transport_failures(),
            "Some device calls received no response"
        );
    }
    info!(
        run_id = %report.run_id,
        fetched = report.fetch_results.len(),
        updated = report.update_results.len(),
        other = report.other_results.len(),
        elapsed = format!("{:.5}s", report.elapsed_time),
        "Report written to {:?}",
        report_path
    );

    Ok(())
}
