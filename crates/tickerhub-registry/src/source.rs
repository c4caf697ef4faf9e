//! Symbol-list sources.
//!
//! Each exchange exposes a few endpoints that can enumerate its pairs.
//! A source fetches one of them and parses it into `Listing`s. Liveness
//! probes carry no symbols; a successful probe tells the catalog to
//! hand out its defaults.

use crate::error::{RegistryError, RegistryResult};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tickerhub_core::{parse_or_zero, BoxFuture};
use tracing::{debug, warn};

/// One pair reported by a source, still in wire spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub wire_symbol: String,
    /// Present only when the source reports prices.
    pub last_price: Option<Decimal>,
    /// Present only when the source reports quote-currency volume.
    pub quote_volume: Option<Decimal>,
}

impl Listing {
    pub fn bare(wire_symbol: impl Into<String>) -> Self {
        Self {
            wire_symbol: wire_symbol.into(),
            last_price: None,
            quote_volume: None,
        }
    }

    /// Dead pairs: non-positive price or quote volume under `floor`.
    /// Figures the source does not report never disqualify a listing.
    pub fn is_liquid(&self, floor: Decimal) -> bool {
        let priced = self.last_price.map_or(true, |p| p > Decimal::ZERO);
        let traded = self.quote_volume.map_or(true, |v| v >= floor);
        priced && traded
    }
}

/// What a source produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Listings(Vec<Listing>),
    /// The exchange answered a liveness probe.
    Alive,
}

/// A symbol-list source.
pub trait SymbolSource: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &str;

    fn fetch(&self) -> BoxFuture<'_, RegistryResult<SourceOutcome>>;
}

/// Response layouts understood by `HttpSymbolSource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFormat {
    /// Binance `/api/v3/ticker/24hr` without a symbol.
    BinanceTicker24h,
    /// Binance `/api/v3/ticker/price`.
    BinancePriceList,
    /// Bybit `/v5/market/tickers`.
    BybitTickers,
    /// Bybit `/v5/market/instruments-info`.
    BybitInstruments,
    /// Kraken `/0/public/AssetPairs`.
    KrakenAssetPairs,
    /// Coinbase Exchange `/products`.
    CoinbaseProducts,
    /// Any 2xx response means the exchange is up.
    LivenessProbe,
}

impl ListingFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ListingFormat::BinanceTicker24h => "binance_ticker_24h",
            ListingFormat::BinancePriceList => "binance_price_list",
            ListingFormat::BybitTickers => "bybit_tickers",
            ListingFormat::BybitInstruments => "bybit_instruments",
            ListingFormat::KrakenAssetPairs => "kraken_asset_pairs",
            ListingFormat::CoinbaseProducts => "coinbase_products",
            ListingFormat::LivenessProbe => "liveness_probe",
        }
    }

    /// Parse a decoded response body.
    pub fn parse(&self, body: serde_json::Value) -> RegistryResult<SourceOutcome> {
        let listings = match self {
            ListingFormat::LivenessProbe => return Ok(SourceOutcome::Alive),
            ListingFormat::BinanceTicker24h => {
                let rows: Vec<BinanceTickerRow> = serde_json::from_value(body)?;
                rows.into_iter()
                    .map(|r| Listing {
                        wire_symbol: r.symbol,
                        last_price: Some(parse_or_zero(r.last_price.as_deref())),
                        quote_volume: Some(parse_or_zero(r.quote_volume.as_deref())),
                    })
                    .collect()
            }
            ListingFormat::BinancePriceList => {
                let rows: Vec<BinancePriceRow> = serde_json::from_value(body)?;
                rows.into_iter()
                    .map(|r| Listing {
                        wire_symbol: r.symbol,
                        last_price: Some(parse_or_zero(r.price.as_deref())),
                        quote_volume: None,
                    })
                    .collect()
            }
            ListingFormat::BybitTickers => {
                let env: BybitEnvelope<BybitTickerRow> = serde_json::from_value(body)?;
                env.into_list()?
                    .into_iter()
                    .map(|r| Listing {
                        wire_symbol: r.symbol,
                        last_price: Some(parse_or_zero(r.last_price.as_deref())),
                        quote_volume: Some(parse_or_zero(r.turnover_24h.as_deref())),
                    })
                    .collect()
            }
            ListingFormat::BybitInstruments => {
                let env: BybitEnvelope<BybitInstrumentRow> = serde_json::from_value(body)?;
                env.into_list()?
                    .into_iter()
                    .filter(|r| r.status.as_deref().map_or(true, |s| s == "Trading"))
                    .map(|r| Listing::bare(r.symbol))
                    .collect()
            }
            ListingFormat::KrakenAssetPairs => {
                let env: KrakenAssetPairs = serde_json::from_value(body)?;
                if !env.error.is_empty() {
                    return Err(RegistryError::ParseError(env.error.join("; ")));
                }
                env.result
                    .into_iter()
                    .filter(|(key, _)| !key.ends_with(".d"))
                    .filter(|(_, p)| p.status.as_deref().map_or(true, |s| s == "online"))
                    .map(|(key, p)| Listing::bare(p.wsname.or(p.altname).unwrap_or(key)))
                    .collect()
            }
            ListingFormat::CoinbaseProducts => {
                let rows: Vec<CoinbaseProductRow> = serde_json::from_value(body)?;
                rows.into_iter()
                    .filter(CoinbaseProductRow::is_tradable)
                    .map(|r| Listing::bare(r.id))
                    .collect()
            }
        };
        Ok(SourceOutcome::Listings(listings))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTickerRow {
    symbol: String,
    #[serde(default)]
    last_price: Option<String>,
    #[serde(default)]
    quote_volume: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BinancePriceRow {
    symbol: String,
    #[serde(default)]
    price: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitEnvelope<T> {
    #[serde(default)]
    ret_code: i64,
    #[serde(default)]
    ret_msg: Option<String>,
    result: Option<BybitList<T>>,
}

#[derive(Debug, Deserialize)]
struct BybitList<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
}

impl<T> BybitEnvelope<T> {
    fn into_list(self) -> RegistryResult<Vec<T>> {
        if self.ret_code != 0 {
            return Err(RegistryError::ParseError(format!(
                "Bybit {}: {}",
                self.ret_code,
                self.ret_msg.unwrap_or_default()
            )));
        }
        Ok(self.result.map(|r| r.list).unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitTickerRow {
    symbol: String,
    #[serde(default)]
    last_price: Option<String>,
    #[serde(default, rename = "turnover24h")]
    turnover_24h: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BybitInstrumentRow {
    symbol: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KrakenAssetPairs {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: BTreeMap<String, KrakenPair>,
}

#[derive(Debug, Deserialize)]
struct KrakenPair {
    #[serde(default)]
    wsname: Option<String>,
    #[serde(default)]
    altname: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoinbaseProductRow {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    trading_disabled: bool,
    #[serde(default)]
    cancel_only: bool,
    #[serde(default)]
    post_only: bool,
    #[serde(default)]
    limit_only: bool,
}

impl CoinbaseProductRow {
    fn is_tradable(&self) -> bool {
        self.status.as_deref().map_or(true, |s| s == "online")
            && !self.trading_disabled
            && !self.cancel_only
            && !self.post_only
            && !self.limit_only
    }
}

/// Source backed by one HTTP GET endpoint.
pub struct HttpSymbolSource {
    client: Client,
    url: String,
    format: ListingFormat,
    /// Attempts before giving up on this source.
    attempts: u32,
    retry_pause: Duration,
}

impl HttpSymbolSource {
    pub fn new(client: Client, url: impl Into<String>, format: ListingFormat) -> Self {
        Self {
            client,
            url: url.into(),
            format,
            attempts: 1,
            retry_pause: Duration::from_millis(500),
        }
    }

    /// Retry this source before the chain moves on.
    pub fn with_retries(mut self, attempts: u32, pause: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_pause = pause;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_once(&self) -> RegistryResult<SourceOutcome> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RegistryError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::HttpClient(format!("HTTP {status}: {body}")));
        }

        if self.format == ListingFormat::LivenessProbe {
            return Ok(SourceOutcome::Alive);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RegistryError::HttpClient(format!("Failed to parse response: {e}")))?;
        self.format.parse(body)
    }
}

impl SymbolSource for HttpSymbolSource {
    fn name(&self) -> &str {
        self.format.name()
    }

    fn fetch(&self) -> BoxFuture<'_, RegistryResult<SourceOutcome>> {
        Box::pin(async move {
            let mut attempt = 1;
            loop {
                debug!(url = %self.url, attempt, "Fetching symbol list");
                match self.fetch_once().await {
                    Ok(outcome) => return Ok(outcome),
                    Err(e) if attempt < self.attempts => {
                        warn!(url = %self.url, attempt, error = %e, "Symbol source failed, retrying");
                        tokio::time::sleep(self.retry_pause).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn listings(outcome: SourceOutcome) -> Vec<Listing> {
        match outcome {
            SourceOutcome::Listings(l) => l,
            SourceOutcome::Alive => panic!("expected listings"),
        }
    }

    #[test]
    fn test_liquidity() {
        let mut l = Listing::bare("BTCUSDT");
        assert!(l.is_liquid(dec!(1000)));
        l.last_price = Some(Decimal::ZERO);
        assert!(!l.is_liquid(dec!(1000)));
        l.last_price = Some(dec!(1));
        l.quote_volume = Some(dec!(999.99));
        assert!(!l.is_liquid(dec!(1000)));
        l.quote_volume = Some(dec!(1000));
        assert!(l.is_liquid(dec!(1000)));
    }

    #[test]
    fn test_parse_binance_ticker() {
        let body = json!([
            {"symbol": "BTCUSDT", "lastPrice": "64000", "quoteVolume": "1000000"},
            {"symbol": "DEADUSDT", "lastPrice": "0.00000000", "quoteVolume": "0"}
        ]);
        let l = listings(ListingFormat::BinanceTicker24h.parse(body).unwrap());
        assert_eq!(l.len(), 2);
        assert_eq!(l[0].quote_volume, Some(dec!(1000000)));
        assert!(!l[1].is_liquid(dec!(1000)));
    }

    #[test]
    fn test_parse_bybit() {
        let body = json!({
            "retCode": 0, "retMsg": "OK",
            "result": {"category": "spot", "list": [
                {"symbol": "BTCUSDT", "status": "Trading"},
                {"symbol": "OLDUSDT", "status": "Closed"}
            ]}
        });
        let l = listings(ListingFormat::BybitInstruments.parse(body).unwrap());
        assert_eq!(l, vec![Listing::bare("BTCUSDT")]);

        let err = ListingFormat::BybitTickers
            .parse(json!({"retCode": 10002, "retMsg": "bad"}))
            .unwrap_err();
        assert!(matches!(err, RegistryError::ParseError(_)));
    }

    #[test]
    fn test_parse_kraken_pairs() {
        let body = json!({
            "error": [],
            "result": {
                "XXBTZUSD": {"altname": "XBTUSD", "wsname": "XBT/USD", "status": "online"},
                "XXBTZUSD.d": {"altname": "XBTUSD.d"},
                "XETHZEUR": {"altname": "ETHEUR", "wsname": "ETH/EUR", "status": "cancel_only"}
            }
        });
        let l = listings(ListingFormat::KrakenAssetPairs.parse(body).unwrap());
        assert_eq!(l, vec![Listing::bare("XBT/USD")]);
    }

    #[test]
    fn test_parse_coinbase_products() {
        let body = json!([
            {"id": "BTC-USD", "status": "online", "trading_disabled": false},
            {"id": "OLD-USD", "status": "delisted"},
            {"id": "ETH-USD", "status": "online", "post_only": true}
        ]);
        let l = listings(ListingFormat::CoinbaseProducts.parse(body).unwrap());
        assert_eq!(l, vec![Listing::bare("BTC-USD")]);
    }

    #[test]
    fn test_probe_is_alive() {
        assert_eq!(
            ListingFormat::LivenessProbe.parse(json!({})).unwrap(),
            SourceOutcome::Alive
        );
    }

    mod http {
        use super::*;
        use crate::catalog::{CatalogSpec, SymbolCatalog};
        use crate::ttl_cache::InMemoryTtlCache;
        use axum::extract::State;
        use axum::http::StatusCode;
        use axum::response::{IntoResponse, Response};
        use axum::routing::get;
        use axum::{Json, Router};
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tickerhub_core::{ExchangeId, Symbol};

        /// Answers 500 for the first `failures` requests, then a price list.
        #[derive(Clone)]
        struct Flaky {
            hits: Arc<AtomicUsize>,
            failures: usize,
        }

        async fn price_list(State(flaky): State<Flaky>) -> Response {
            let hit = flaky.hits.fetch_add(1, Ordering::SeqCst);
            if hit < flaky.failures {
                return (StatusCode::INTERNAL_SERVER_ERROR, "busy").into_response();
            }
            Json(json!([
                {"symbol": "BTCUSDT", "price": "64000.00"},
                {"symbol": "ETHUSDT", "price": "3000.00"}
            ]))
            .into_response()
        }

        async fn spawn_price_server(failures: usize) -> (String, Arc<AtomicUsize>) {
            let hits = Arc::new(AtomicUsize::new(0));
            let app = Router::new()
                .route("/api/v3/ticker/price", get(price_list))
                .with_state(Flaky {
                    hits: hits.clone(),
                    failures,
                });
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            (format!("http://{addr}/api/v3/ticker/price"), hits)
        }

        fn source(url: String, attempts: u32) -> HttpSymbolSource {
            HttpSymbolSource::new(Client::new(), url, ListingFormat::BinancePriceList)
                .with_retries(attempts, Duration::from_millis(10))
        }

        #[tokio::test]
        async fn test_retry_recovers_after_server_error() {
            let (url, hits) = spawn_price_server(1).await;

            let outcome = source(url, 2).fetch().await.unwrap();
            let l = listings(outcome);
            assert_eq!(l.len(), 2);
            assert_eq!(l[0].wire_symbol, "BTCUSDT");
            assert_eq!(hits.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn test_exhausted_attempts_fail() {
            let (url, hits) = spawn_price_server(usize::MAX).await;

            let err = source(url, 3).fetch().await.unwrap_err();
            assert!(matches!(err, RegistryError::HttpClient(_)));
            assert_eq!(hits.load(Ordering::SeqCst), 3);
        }

        #[tokio::test]
        async fn test_single_attempt_does_not_retry() {
            let (url, hits) = spawn_price_server(1).await;

            assert!(source(url, 1).fetch().await.is_err());
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_failing_source_falls_through_chain() {
            let (down, down_hits) = spawn_price_server(usize::MAX).await;
            let (up, _) = spawn_price_server(0).await;

            let defaults = vec![Symbol::canonical("SOLUSDT").unwrap()];
            let spec = CatalogSpec::new(ExchangeId::Binance, defaults)
                .with_source(Arc::new(source(down, 2)))
                .with_source(Arc::new(source(up, 2)));
            let catalog = SymbolCatalog::new(Arc::new(InMemoryTtlCache::new())).with_spec(spec);

            let symbols = catalog.get_available_symbols(ExchangeId::Binance).await;
            let names: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
            assert_eq!(names, vec!["BTCUSDT", "ETHUSDT"]);
            assert_eq!(down_hits.load(Ordering::SeqCst), 2);
        }
    }
}
