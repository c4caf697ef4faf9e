//! Stream side of a connector.

use crate::connector::TickerSink;
use parking_lot::RwLock;
use std::sync::Arc;
use tickerhub_core::{BoxFuture, ExchangeId, Symbol, TickerData};
use tickerhub_feed::{NormalizeContext, WireProtocol};
use tickerhub_registry::SymbolCatalog;
use tickerhub_telemetry::Metrics;
use tickerhub_ws::StreamSession;
use tracing::{debug, info};

/// Resolve the catalog and cap it to the tracked set.
pub(crate) async fn resolve_tracked(
    catalog: &SymbolCatalog,
    exchange: ExchangeId,
    max_symbols: usize,
) -> Vec<Symbol> {
    let mut symbols = catalog.get_available_symbols(exchange).await;
    if symbols.len() > max_symbols {
        info!(%exchange, available = symbols.len(), max_symbols, "Capping tracked symbols");
        symbols.truncate(max_symbols);
    }
    symbols
}

/// Bridges a `ConnectionManager` to the feed normalizer and a ticker sink.
pub struct TickerStreamSession {
    exchange: ExchangeId,
    protocol: &'static dyn WireProtocol,
    catalog: Arc<SymbolCatalog>,
    tracked: Arc<RwLock<Vec<Symbol>>>,
    max_symbols: usize,
    sink: TickerSink,
}

impl TickerStreamSession {
    pub fn new(
        protocol: &'static dyn WireProtocol,
        catalog: Arc<SymbolCatalog>,
        tracked: Arc<RwLock<Vec<Symbol>>>,
        max_symbols: usize,
        sink: TickerSink,
    ) -> Self {
        Self {
            exchange: protocol.exchange(),
            protocol,
            catalog,
            tracked,
            max_symbols,
            sink,
        }
    }

    /// Decode one text frame. `None` for control traffic and dropped messages.
    pub fn normalize(&self, text: &str) -> Option<TickerData> {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                debug!(exchange = %self.exchange, error = %e, "Dropping non-JSON stream frame");
                Metrics::normalize_failed(self.exchange.as_str(), "stream");
                return None;
            }
        };

        match self.protocol.normalize_stream(&value, &NormalizeContext::now()) {
            Ok(ticker) => ticker,
            Err(e) => {
                debug!(exchange = %self.exchange, error = %e, "Dropping stream message");
                Metrics::normalize_failed(self.exchange.as_str(), "stream");
                None
            }
        }
    }
}

impl StreamSession for TickerStreamSession {
    fn subscriptions(&self) -> BoxFuture<'_, Vec<String>> {
        Box::pin(async move {
            let symbols = resolve_tracked(&self.catalog, self.exchange, self.max_symbols).await;
            let frames = self.protocol.subscribe_messages(&symbols);
            info!(exchange = %self.exchange, symbols = symbols.len(), "Subscribing");
            *self.tracked.write() = symbols;
            frames
        })
    }

    fn on_message(&self, text: &str) {
        if let Some(ticker) = self.normalize(text) {
            (self.sink)(ticker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tickerhub_registry::{CatalogSpec, InMemoryTtlCache};

    fn session(received: Arc<Mutex<Vec<TickerData>>>) -> TickerStreamSession {
        let defaults = vec![
            Symbol::canonical("BTCUSDT").unwrap(),
            Symbol::canonical("ETHUSDT").unwrap(),
            Symbol::canonical("SOLUSDT").unwrap(),
        ];
        let catalog = SymbolCatalog::new(Arc::new(InMemoryTtlCache::new()))
            .with_spec(CatalogSpec::new(ExchangeId::Binance, defaults).with_ttl(Duration::from_secs(60)));
        let sink: TickerSink = Arc::new(move |t| received.lock().push(t));
        TickerStreamSession::new(
            tickerhub_feed::protocol_for(ExchangeId::Binance),
            Arc::new(catalog),
            Arc::new(RwLock::new(Vec::new())),
            2,
            sink,
        )
    }

    #[tokio::test]
    async fn test_subscriptions_use_capped_catalog() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let session = session(received);

        let frames = session.subscriptions().await;
        assert_eq!(frames.len(), 1);
        let frame: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(frame["params"], serde_json::json!(["btcusdt@ticker", "ethusdt@ticker"]));
        assert_eq!(session.tracked.read().len(), 2);
    }

    #[test]
    fn test_ticker_reaches_sink() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let session = session(received.clone());

        let msg = serde_json::json!({
            "e": "24hrTicker", "E": 1_700_000_000_500i64, "s": "BTCUSDT",
            "P": "1.5", "c": "64000", "o": "63000", "v": "10", "n": 3
        });
        session.on_message(&msg.to_string());

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].symbol.as_str(), "BTCUSDT");
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let session = session(received.clone());

        session.on_message("not json");
        session.on_message(r#"{"result":null,"id":1}"#);
        session.on_message(r#"{"e":"24hrTicker","c":"1"}"#);

        assert!(received.lock().is_empty());
    }
}
