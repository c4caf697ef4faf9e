//! Fetch orchestrator.
//!
//! Streams are preferred. The poll loop fetches over REST only for
//! connectors whose stream is not `Open`, each at its own cadence.

use crate::cache::TickerCache;
use crate::comparison::{self, ArbitrageOutcome, ComparisonOutcome};
use crate::error::{FetchError, FetchResult};
use crate::query::{ExchangeStatus, TickerQuery};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tickerhub_connector::{ExchangeConnector, TickerSink};
use tickerhub_core::{ExchangeId, Symbol, TickerData};
use tickerhub_registry::SymbolCatalog;
use tickerhub_telemetry::Metrics;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on how early a connector may be polled before its cadence.
const MAX_POLL_SLACK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Poll timer period; per-connector cadence is checked on each tick.
    pub poll_interval: Duration,
    /// Initial state of the global streaming toggle.
    pub streaming_enabled: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            streaming_enabled: true,
        }
    }
}

/// Outcome of one poll tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub polled: Vec<ExchangeId>,
    /// Stream open, REST suppressed.
    pub skipped_streaming: Vec<ExchangeId>,
    /// Own poll interval not yet elapsed.
    pub not_due: Vec<ExchangeId>,
    pub tickers: usize,
}

pub struct FetchOrchestrator {
    connectors: Vec<Arc<dyn ExchangeConnector>>,
    cache: Arc<TickerCache>,
    catalog: Arc<SymbolCatalog>,
    config: OrchestratorConfig,
    streaming_enabled: AtomicBool,
    last_poll: RwLock<HashMap<ExchangeId, DateTime<Utc>>>,
}

impl FetchOrchestrator {
    pub fn new(
        connectors: Vec<Arc<dyn ExchangeConnector>>,
        cache: Arc<TickerCache>,
        catalog: Arc<SymbolCatalog>,
        config: OrchestratorConfig,
    ) -> Self {
        let streaming_enabled = AtomicBool::new(config.streaming_enabled);
        Self {
            connectors,
            cache,
            catalog,
            config,
            streaming_enabled,
            last_poll: RwLock::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<TickerCache> {
        &self.cache
    }

    pub fn is_streaming_enabled(&self) -> bool {
        self.streaming_enabled.load(Ordering::SeqCst)
    }

    fn connector(&self, exchange: ExchangeId) -> Option<&Arc<dyn ExchangeConnector>> {
        self.connectors.iter().find(|c| c.exchange() == exchange)
    }

    fn sink(&self, exchange: ExchangeId) -> TickerSink {
        let cache = Arc::clone(&self.cache);
        Arc::new(move |ticker: TickerData| {
            Metrics::ticker_ingested(exchange.as_str(), "stream");
            cache.put(ticker);
        })
    }

    /// Resolve every connector's symbol set.
    pub async fn prepare(&self) {
        let prepared = join_all(self.connectors.iter().map(|c| c.prepare())).await;
        for (connector, symbols) in self.connectors.iter().zip(prepared) {
            info!(exchange = %connector.exchange(), symbols = symbols.len(), "Symbols resolved");
        }
    }

    /// Connect every stream-enabled connector, if streaming is on.
    pub fn start_streams(&self) {
        if !self.is_streaming_enabled() {
            info!("Streaming disabled, not starting streams");
            return;
        }

        for connector in &self.connectors {
            let exchange = connector.exchange();
            if !connector.descriptor().stream_enabled {
                debug!(%exchange, "Stream disabled by configuration");
                continue;
            }
            match connector.connect(self.sink(exchange)) {
                Ok(()) => info!(%exchange, "Stream started"),
                Err(e) => warn!(%exchange, error = %e, "Stream not started"),
            }
        }
    }

    /// One poll tick over every REST-enabled connector.
    pub async fn poll_once(&self) -> PollReport {
        let now = Utc::now();
        // Timer ticks jitter around the period; a connector whose cadence
        // equals the period must not slip to every other tick.
        let slack = (self.config.poll_interval / 2).min(MAX_POLL_SLACK);
        let slack = chrono::Duration::from_std(slack).unwrap_or_else(|_| chrono::Duration::zero());
        let mut report = PollReport::default();
        let mut due = Vec::new();

        for connector in &self.connectors {
            let exchange = connector.exchange();
            let descriptor = connector.descriptor();
            if !descriptor.rest_enabled {
                continue;
            }

            if connector.is_connected() {
                Metrics::poll_skipped(exchange.as_str());
                report.skipped_streaming.push(exchange);
                continue;
            }

            let interval = chrono::Duration::from_std(descriptor.poll_interval())
                .unwrap_or_else(|_| chrono::Duration::seconds(10));
            let last = self.last_poll.read().get(&exchange).copied();
            if last.is_some_and(|at| now - at + slack < interval) {
                report.not_due.push(exchange);
                continue;
            }

            due.push(Arc::clone(connector));
        }

        let fetched = join_all(due.iter().map(|c| c.fetch_all())).await;

        for (connector, tickers) in due.iter().zip(fetched) {
            let exchange = connector.exchange();
            self.last_poll.write().insert(exchange, now);
            debug!(%exchange, count = tickers.len(), "Polled tickers");
            report.tickers += tickers.len();
            for ticker in tickers {
                Metrics::ticker_ingested(exchange.as_str(), "poll");
                self.cache.put(ticker);
            }
            report.polled.push(exchange);
        }

        report
    }

    /// Poll on the timer until `shutdown` is cancelled.
    pub async fn run_poll_loop(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.config.poll_interval.as_millis() as u64, "Poll loop started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Poll loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let report = self.poll_once().await;
                    debug!(
                        polled = report.polled.len(),
                        skipped = report.skipped_streaming.len(),
                        tickers = report.tickers,
                        "Poll tick"
                    );
                }
            }
        }
    }

    /// Disconnect every stream. Pending reconnects are cancelled.
    pub async fn shutdown(&self) {
        join_all(self.connectors.iter().map(|c| c.disconnect())).await;
        info!("All streams disconnected");
    }

    pub fn enable_streaming(&self) {
        self.streaming_enabled.store(true, Ordering::SeqCst);
        info!("Streaming enabled");
        self.start_streams();
    }

    pub async fn disable_streaming(&self) {
        self.streaming_enabled.store(false, Ordering::SeqCst);
        info!("Streaming disabled");
        self.shutdown().await;
    }

    /// Drop the cached catalog for `exchange` and re-resolve the connector.
    pub async fn refresh_symbols(&self, exchange: ExchangeId) -> FetchResult<Vec<Symbol>> {
        let connector = self
            .connector(exchange)
            .ok_or(FetchError::UnknownExchange(exchange))?;
        let refreshed = self.catalog.refresh(exchange).await;
        let tracked = connector.prepare().await;
        info!(%exchange, catalog = refreshed.len(), tracked = tracked.len(), "Symbols refreshed");
        Ok(tracked)
    }

    /// Filtered, ordered positive-volume tickers.
    pub fn tickers(&self, query: &TickerQuery) -> Vec<TickerData> {
        query.apply(self.cache.live_snapshot())
    }

    /// Exchanges that currently have live data.
    pub fn available_exchanges(&self) -> Vec<ExchangeId> {
        self.cache
            .live_snapshot()
            .into_iter()
            .map(|t| t.exchange_name)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn status(&self) -> Vec<ExchangeStatus> {
        let streaming_active = self.is_streaming_enabled();
        let last_poll = self.last_poll.read();
        self.connectors
            .iter()
            .map(|c| {
                let exchange = c.exchange();
                let descriptor = c.descriptor();
                ExchangeStatus {
                    exchange,
                    stream_state: c.stream_state().as_str().to_string(),
                    connected: c.is_connected(),
                    rest_enabled: descriptor.rest_enabled,
                    stream_enabled: descriptor.stream_enabled,
                    streaming_active,
                    tracked_symbols: c.symbols().len(),
                    cached_tickers: self.cache.live_count(exchange),
                    last_poll: last_poll.get(&exchange).copied(),
                }
            })
            .collect()
    }

    pub fn compare(&self, raw_symbol: &str) -> ComparisonOutcome {
        match Symbol::canonical(raw_symbol) {
            Ok(symbol) => comparison::compare(&symbol, &self.cache.live_snapshot()),
            Err(_) => ComparisonOutcome::NoData {
                symbol: raw_symbol.to_string(),
            },
        }
    }

    pub fn arbitrage(&self, raw_symbol: &str) -> ArbitrageOutcome {
        match Symbol::canonical(raw_symbol) {
            Ok(symbol) => comparison::arbitrage(&symbol, &self.cache.live_snapshot()),
            Err(_) => ArbitrageOutcome::InsufficientData {
                symbol: raw_symbol.to_string(),
                available: 0,
            },
        }
    }
}
