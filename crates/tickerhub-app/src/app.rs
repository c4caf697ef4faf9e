//! Main application orchestration.
//!
//! Builds the shared pieces once and hands them to every connector:
//! - one `reqwest::Client` (REST tickers and symbol sources)
//! - one `SymbolCatalog` over an in-memory TTL cache
//! - one `FetchOrchestrator` over the ticker cache

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use std::sync::Arc;
use tickerhub_connector::{catalog_spec, variant_for, ExchangeConnector, LiveConnector};
use tickerhub_fetcher::{FetchOrchestrator, TickerCache};
use tickerhub_registry::{InMemoryTtlCache, SymbolCatalog};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
    orchestrator: Arc<FetchOrchestrator>,
}

impl Application {
    /// Build connectors for every enabled exchange.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let exchanges = config.enabled_exchanges();
        if exchanges.is_empty() {
            return Err(AppError::Config("no exchange is enabled".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.rest_timeout())
            .build()?;

        let mut catalog = SymbolCatalog::new(Arc::new(InMemoryTtlCache::new()));
        let mut settings = Vec::with_capacity(exchanges.len());
        for exchange in exchanges {
            let variant = variant_for(exchange);
            let connector_settings = config.connector_settings(variant);
            let spec = catalog_spec(
                variant,
                &client,
                &connector_settings.rest_base_url,
                config.catalog.source_attempts,
                config.source_retry_pause(),
            )
            .with_ttl(config.catalog_ttl())
            .with_min_quote_volume(config.catalog.min_quote_volume);
            catalog = catalog.with_spec(spec);
            settings.push((variant, connector_settings));
        }
        let catalog = Arc::new(catalog);

        let connectors: Vec<Arc<dyn ExchangeConnector>> = settings
            .into_iter()
            .map(|(variant, connector_settings)| {
                info!(
                    exchange = %variant.exchange,
                    rest = connector_settings.descriptor.rest_enabled,
                    stream = connector_settings.descriptor.stream_enabled,
                    ws_url = %connector_settings.ws_url,
                    "Connector configured"
                );
                Arc::new(LiveConnector::new(
                    variant,
                    connector_settings,
                    Arc::clone(&catalog),
                    client.clone(),
                )) as Arc<dyn ExchangeConnector>
            })
            .collect();

        let orchestrator = FetchOrchestrator::new(
            connectors,
            Arc::new(TickerCache::new()),
            catalog,
            config.orchestrator(),
        );

        Ok(Self {
            config,
            orchestrator: Arc::new(orchestrator),
        })
    }

    pub fn orchestrator(&self) -> &Arc<FetchOrchestrator> {
        &self.orchestrator
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        let shutdown = CancellationToken::new();
        let handle = self.start(shutdown.clone()).await;

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");

        shutdown.cancel();
        handle.stop(&self.orchestrator).await;
        Ok(())
    }

    /// Resolve symbols, start streams, then spawn the poll loop and API.
    pub async fn start(&self, shutdown: CancellationToken) -> RunningTasks {
        info!(exchanges = self.config.enabled_exchanges().len(), "Starting application");

        self.orchestrator.prepare().await;
        self.orchestrator.start_streams();

        let poll = {
            let orchestrator = Arc::clone(&self.orchestrator);
            let token = shutdown.clone();
            tokio::spawn(async move { orchestrator.run_poll_loop(token).await })
        };

        let api = self.config.api.enabled.then(|| {
            let orchestrator = Arc::clone(&self.orchestrator);
            let config = self.config.api.clone();
            let token = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = tickerhub_api::run_server(orchestrator, config, token).await {
                    error!(error = %e, "API server failed");
                }
            })
        });

        RunningTasks { poll, api }
    }
}

/// Background tasks spawned by [`Application::start`].
pub struct RunningTasks {
    poll: tokio::task::JoinHandle<()>,
    api: Option<tokio::task::JoinHandle<()>>,
}

impl RunningTasks {
    /// Wait for the tasks after cancellation, then disconnect every stream.
    pub async fn stop(self, orchestrator: &FetchOrchestrator) {
        if let Err(e) = self.poll.await {
            warn!(error = %e, "Poll loop task failed");
        }
        orchestrator.shutdown().await;
        if let Some(api) = self.api {
            if let Err(e) = api.await {
                warn!(error = %e, "API task failed");
            }
        }
        info!("Shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickerhub_core::ExchangeId;

    #[test]
    fn test_no_enabled_exchange_is_rejected() {
        let mut config = AppConfig::default();
        for exchange in ExchangeId::ALL {
            match exchange {
                ExchangeId::Binance => config.exchanges.binance.enabled = false,
                ExchangeId::Bybit => config.exchanges.bybit.enabled = false,
                ExchangeId::Kraken => config.exchanges.kraken.enabled = false,
                ExchangeId::Coinbase => config.exchanges.coinbase.enabled = false,
            }
        }
        assert!(matches!(Application::new(config), Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_connectors_follow_enabled_exchanges() {
        let mut config = AppConfig::default();
        config.exchanges.kraken.enabled = false;
        config.exchanges.coinbase.enabled = false;

        let app = Application::new(config).unwrap();
        let exchanges: Vec<ExchangeId> = app
            .orchestrator()
            .status()
            .into_iter()
            .map(|s| s.exchange)
            .collect();
        assert_eq!(exchanges, vec![ExchangeId::Binance, ExchangeId::Bybit]);
    }
}
