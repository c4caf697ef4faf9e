//! tickerhub entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Multi-exchange ticker ingestion service.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TICKERHUB_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // TLS provider must be installed before any stream connects
    tickerhub_ws::init_crypto();

    let args = Args::parse();

    tickerhub_telemetry::init_logging()?;

    info!("Starting tickerhub v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > TICKERHUB_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("TICKERHUB_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = tickerhub_app::AppConfig::from_file(&config_path)?;
    info!(
        poll_interval_secs = config.poll_interval_secs,
        streaming = config.streaming_enabled,
        api_port = config.api.port,
        "Configuration loaded"
    );

    let app = tickerhub_app::Application::new(config)?;
    app.run().await?;

    Ok(())
}
