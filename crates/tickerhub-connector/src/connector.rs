//! The connector capability interface and its live implementation.

use crate::error::{ConnectorError, ConnectorResult};
use crate::rest::RestClient;
use crate::settings::ConnectorSettings;
use crate::stream::{resolve_tracked, TickerStreamSession};
use crate::variant::ExchangeVariant;
use futures_util::stream::{self, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tickerhub_core::{BoxFuture, ConnectorDescriptor, ExchangeId, Symbol, TickerData};
use tickerhub_feed::WireProtocol;
use tickerhub_registry::SymbolCatalog;
use tickerhub_telemetry::Metrics;
use tickerhub_ws::{ConnectionConfig, ConnectionManager, ConnectionState};
use tracing::{debug, info, warn};

/// Consumer callback for streamed tickers.
pub type TickerSink = Arc<dyn Fn(TickerData) + Send + Sync>;

/// REST + stream capability pair for one exchange.
///
/// Fetches never fail: a symbol that could not be fetched is simply absent.
pub trait ExchangeConnector: Send + Sync {
    fn exchange(&self) -> ExchangeId;

    fn descriptor(&self) -> &ConnectorDescriptor;

    /// Resolve the tracked symbol set.
    fn prepare(&self) -> BoxFuture<'_, Vec<Symbol>>;

    /// Last resolved symbol set.
    fn symbols(&self) -> Vec<Symbol>;

    fn fetch_one<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, Option<TickerData>>;

    /// Union of `fetch_one` over the tracked symbols, failures dropped.
    fn fetch_all(&self) -> BoxFuture<'_, Vec<TickerData>>;

    /// Start streaming into `sink`.
    fn connect(&self, sink: TickerSink) -> ConnectorResult<()>;

    fn disconnect(&self) -> BoxFuture<'_, ()>;

    fn is_connected(&self) -> bool;

    fn stream_state(&self) -> ConnectionState;
}

/// Connector driven by an exchange variant and its wire protocol.
pub struct LiveConnector {
    settings: ConnectorSettings,
    protocol: &'static dyn WireProtocol,
    catalog: Arc<SymbolCatalog>,
    rest: RestClient,
    stream: Arc<ConnectionManager>,
    tracked: Arc<RwLock<Vec<Symbol>>>,
}

impl LiveConnector {
    pub fn new(
        variant: &ExchangeVariant,
        settings: ConnectorSettings,
        catalog: Arc<SymbolCatalog>,
        client: reqwest::Client,
    ) -> Self {
        let protocol = variant.protocol();
        let exchange = variant.exchange;

        let stream = ConnectionManager::new(ConnectionConfig {
            exchange: exchange.as_str().to_string(),
            url: settings.ws_url.clone(),
            reconnect_delay_ms: settings.reconnect_delay.as_millis() as u64,
            heartbeat_interval_ms: settings.heartbeat_interval.as_millis() as u64,
            heartbeat_timeout_ms: settings.heartbeat_timeout.as_millis() as u64,
            ping_payload: protocol.ping_message(),
        });

        Self {
            rest: RestClient::new(client, settings.rest_base_url.clone(), protocol),
            settings,
            protocol,
            catalog,
            stream: Arc::new(stream),
            tracked: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    async fn refresh_tracked(&self) -> Vec<Symbol> {
        let symbols = resolve_tracked(
            &self.catalog,
            self.exchange(),
            self.settings.max_stream_symbols,
        )
        .await;
        *self.tracked.write() = symbols.clone();
        symbols
    }

    async fn fetch_ticker(&self, symbol: &Symbol) -> Option<TickerData> {
        let exchange = self.exchange();
        let start = Instant::now();
        let result = self.rest.fetch_ticker(symbol).await;
        Metrics::rest_latency(exchange.as_str(), start.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(ticker) => Some(ticker),
            Err(ConnectorError::Feed(e)) => {
                warn!(%exchange, %symbol, error = %e, "Dropping REST ticker");
                Metrics::normalize_failed(exchange.as_str(), "rest");
                Metrics::rest_fetch_failed(exchange.as_str());
                None
            }
            Err(e) => {
                warn!(%exchange, %symbol, error = %e, "REST ticker fetch failed");
                Metrics::rest_fetch_failed(exchange.as_str());
                None
            }
        }
    }
}

impl ExchangeConnector for LiveConnector {
    fn exchange(&self) -> ExchangeId {
        self.settings.descriptor.exchange_name
    }

    fn descriptor(&self) -> &ConnectorDescriptor {
        &self.settings.descriptor
    }

    fn prepare(&self) -> BoxFuture<'_, Vec<Symbol>> {
        Box::pin(async move {
            let symbols = self.refresh_tracked().await;
            info!(exchange = %self.exchange(), count = symbols.len(), "Connector prepared");
            symbols
        })
    }

    fn symbols(&self) -> Vec<Symbol> {
        self.tracked.read().clone()
    }

    fn fetch_one<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, Option<TickerData>> {
        Box::pin(self.fetch_ticker(symbol))
    }

    fn fetch_all(&self) -> BoxFuture<'_, Vec<TickerData>> {
        Box::pin(async move {
            let symbols = self.refresh_tracked().await;
            let requested = symbols.len();

            let tickers: Vec<TickerData> = stream::iter(symbols)
                .map(|symbol| async move { self.fetch_ticker(&symbol).await })
                .buffer_unordered(self.settings.rest_concurrency.max(1))
                .filter_map(|ticker| async move { ticker })
                .collect()
                .await;

            debug!(
                exchange = %self.exchange(),
                requested,
                fetched = tickers.len(),
                "REST batch complete"
            );
            tickers
        })
    }

    fn connect(&self, sink: TickerSink) -> ConnectorResult<()> {
        if !self.settings.descriptor.stream_enabled {
            return Err(ConnectorError::StreamDisabled(self.exchange()));
        }

        let session = TickerStreamSession::new(
            self.protocol,
            Arc::clone(&self.catalog),
            Arc::clone(&self.tracked),
            self.settings.max_stream_symbols,
            sink,
        );
        self.stream.connect(Arc::new(session))?;
        Ok(())
    }

    fn disconnect(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.stream.disconnect())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_connected()
    }

    fn stream_state(&self) -> ConnectionState {
        self.stream.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::BINANCE;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::time::Duration;
    use tickerhub_registry::{CatalogSpec, InMemoryTtlCache};

    async fn ticker_24hr(Query(params): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
        let symbol = params.get("symbol").cloned().unwrap_or_default();
        let body = match symbol.as_str() {
            "BTCUSDT" => serde_json::json!({
                "symbol": "BTCUSDT", "lastPrice": "64000.5", "openPrice": "63000",
                "highPrice": "65000", "lowPrice": "62000", "volume": "12.5",
                "priceChangePercent": "1.587", "count": 10
            }),
            _ => serde_json::json!({"code": -1121, "msg": "Invalid symbol."}),
        };
        Json(body)
    }

    async fn spawn_rest_server() -> String {
        let app = Router::new().route("/api/v3/ticker/24hr", get(ticker_24hr));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn connector(rest_base_url: String, defaults: &[&str]) -> LiveConnector {
        let defaults = defaults.iter().map(|s| Symbol::canonical(s).unwrap()).collect();
        let catalog = SymbolCatalog::new(Arc::new(InMemoryTtlCache::new()))
            .with_spec(CatalogSpec::new(ExchangeId::Binance, defaults));

        let mut settings = ConnectorSettings::from_variant(&BINANCE);
        settings.rest_base_url = rest_base_url;
        LiveConnector::new(&BINANCE, settings, Arc::new(catalog), reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_fetch_one_normalizes_rest_ticker() {
        let base = spawn_rest_server().await;
        let connector = connector(base, &["BTCUSDT"]);

        let symbol = Symbol::canonical("BTCUSDT").unwrap();
        let ticker = connector.fetch_one(&symbol).await.unwrap();
        assert_eq!(ticker.exchange_name, ExchangeId::Binance);
        assert_eq!(ticker.last_price, dec!(64000.5));
        assert_eq!(ticker.volume_24h, dec!(12.5));
    }

    #[tokio::test]
    async fn test_fetch_one_failure_is_no_data() {
        let base = spawn_rest_server().await;
        let connector = connector(base, &["BTCUSDT"]);

        let rejected = Symbol::canonical("NOPEUSDT").unwrap();
        assert!(connector.fetch_one(&rejected).await.is_none());

        let unreachable = connector_unreachable().await;
        let symbol = Symbol::canonical("BTCUSDT").unwrap();
        assert!(unreachable.fetch_one(&symbol).await.is_none());
    }

    async fn connector_unreachable() -> LiveConnector {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        connector(format!("http://{addr}"), &["BTCUSDT"])
    }

    #[tokio::test]
    async fn test_fetch_all_drops_failed_symbols() {
        let base = spawn_rest_server().await;
        let connector = connector(base, &["BTCUSDT", "NOPEUSDT", "GONEUSDT"]);

        let tickers = connector.fetch_all().await;
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].symbol.as_str(), "BTCUSDT");
        assert_eq!(connector.symbols().len(), 3);
    }

    #[tokio::test]
    async fn test_connect_refused_when_stream_disabled() {
        let mut settings = ConnectorSettings::from_variant(&BINANCE);
        settings.descriptor.stream_enabled = false;
        let catalog = SymbolCatalog::new(Arc::new(InMemoryTtlCache::new()));
        let connector =
            LiveConnector::new(&BINANCE, settings, Arc::new(catalog), reqwest::Client::new());

        let sink: TickerSink = Arc::new(|_| {});
        let err = connector.connect(sink).unwrap_err();
        assert!(matches!(err, ConnectorError::StreamDisabled(ExchangeId::Binance)));
        assert_eq!(connector.stream_state(), ConnectionState::Disconnected);

        tokio::time::timeout(Duration::from_secs(1), connector.disconnect())
            .await
            .unwrap();
    }
}
