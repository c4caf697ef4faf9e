//! Symbol catalog resolver.
//!
//! `SymbolCatalog::get_available_symbols` answers from the TTL cache
//! when it can. On a miss the exchange's sources are tried strictly in
//! order; the first non-empty result is cached and returned. When every
//! source fails the exchange's defaults are returned uncached, so the
//! next call tries the network again.

use crate::error::RegistryResult;
use crate::source::{Listing, SourceOutcome, SymbolSource};
use crate::ttl_cache::TtlCache;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tickerhub_core::{ExchangeId, Symbol};
use tickerhub_feed::protocol_for;
use tickerhub_telemetry::Metrics;
use tracing::{debug, info, warn};

/// Catalog entries live for five hours.
pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(5 * 60 * 60);

/// Default liquidity floor, in quote currency.
pub const DEFAULT_MIN_QUOTE_VOLUME: Decimal = Decimal::ONE_THOUSAND;

/// Resolution rules for one exchange.
pub struct CatalogSpec {
    pub exchange: ExchangeId,
    pub cache_key: String,
    /// Tried in order.
    pub sources: Vec<Arc<dyn SymbolSource>>,
    /// Handed out after a liveness probe succeeds or every source fails.
    pub defaults: Vec<Symbol>,
    pub min_quote_volume: Decimal,
    pub ttl: Duration,
}

impl CatalogSpec {
    pub fn new(exchange: ExchangeId, defaults: Vec<Symbol>) -> Self {
        Self {
            exchange,
            cache_key: format!("tickerhub:symbols:{exchange}"),
            sources: Vec::new(),
            defaults,
            min_quote_volume: DEFAULT_MIN_QUOTE_VOLUME,
            ttl: DEFAULT_CATALOG_TTL,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn SymbolSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_min_quote_volume(mut self, floor: Decimal) -> Self {
        self.min_quote_volume = floor;
        self
    }
}

/// Tradable symbols of one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCatalogEntry {
    pub exchange: ExchangeId,
    pub symbols: Vec<Symbol>,
    pub fetched_at: DateTime<Utc>,
}

impl SymbolCatalogEntry {
    pub fn new(exchange: ExchangeId, symbols: Vec<Symbol>) -> Self {
        Self {
            exchange,
            symbols,
            fetched_at: Utc::now(),
        }
    }
}

/// Resolver over every registered exchange.
pub struct SymbolCatalog {
    cache: Arc<dyn TtlCache>,
    specs: HashMap<ExchangeId, CatalogSpec>,
}

impl SymbolCatalog {
    pub fn new(cache: Arc<dyn TtlCache>) -> Self {
        Self {
            cache,
            specs: HashMap::new(),
        }
    }

    pub fn with_spec(mut self, spec: CatalogSpec) -> Self {
        self.specs.insert(spec.exchange, spec);
        self
    }

    pub fn exchanges(&self) -> impl Iterator<Item = ExchangeId> + '_ {
        self.specs.keys().copied()
    }

    /// Ordered tradable symbols for `exchange`.
    ///
    /// Never fails; an unregistered exchange yields an empty list.
    pub async fn get_available_symbols(&self, exchange: ExchangeId) -> Vec<Symbol> {
        self.resolve(exchange).await.symbols
    }

    /// Full catalog entry for `exchange`.
    pub async fn resolve(&self, exchange: ExchangeId) -> SymbolCatalogEntry {
        let Some(spec) = self.specs.get(&exchange) else {
            warn!(%exchange, "No symbol catalog registered");
            return SymbolCatalogEntry::new(exchange, Vec::new());
        };

        if let Some(entry) = self.read_cached(spec).await {
            debug!(%exchange, count = entry.symbols.len(), "Symbol catalog cache hit");
            return entry;
        }

        for source in &spec.sources {
            let symbols = match source.fetch().await {
                Ok(SourceOutcome::Alive) => {
                    info!(%exchange, source = source.name(), "Exchange alive, using default symbols");
                    spec.defaults.clone()
                }
                Ok(SourceOutcome::Listings(listings)) => canonical_symbols(spec, listings),
                Err(e) => {
                    warn!(%exchange, source = source.name(), error = %e, "Symbol source failed");
                    continue;
                }
            };

            if symbols.is_empty() {
                warn!(%exchange, source = source.name(), "Symbol source returned no usable symbols");
                continue;
            }

            info!(%exchange, source = source.name(), count = symbols.len(), "Resolved symbol catalog");
            Metrics::catalog_resolved(exchange.as_str(), source.name());
            let entry = SymbolCatalogEntry::new(exchange, symbols);
            self.write_cached(spec, &entry).await;
            return entry;
        }

        warn!(%exchange, "All symbol sources failed, falling back to defaults");
        Metrics::catalog_resolved(exchange.as_str(), "defaults");
        SymbolCatalogEntry::new(exchange, spec.defaults.clone())
    }

    /// Drop the cached catalog and resolve again.
    pub async fn refresh(&self, exchange: ExchangeId) -> Vec<Symbol> {
        if let Some(spec) = self.specs.get(&exchange) {
            if let Err(e) = self.cache.delete(&spec.cache_key).await {
                warn!(%exchange, error = %e, "Failed to clear cached symbol catalog");
            }
        }
        self.get_available_symbols(exchange).await
    }

    async fn read_cached(&self, spec: &CatalogSpec) -> Option<SymbolCatalogEntry> {
        let raw = match self.cache.get(&spec.cache_key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(exchange = %spec.exchange, error = %e, "TTL cache read failed");
                return None;
            }
        };
        match serde_json::from_str::<SymbolCatalogEntry>(&raw) {
            Ok(entry) if !entry.symbols.is_empty() => Some(entry),
            Ok(_) => None,
            Err(e) => {
                warn!(exchange = %spec.exchange, error = %e, "Discarding malformed cached catalog");
                None
            }
        }
    }

    async fn write_cached(&self, spec: &CatalogSpec, entry: &SymbolCatalogEntry) {
        let result: RegistryResult<()> = async {
            let json = serde_json::to_string(entry)?;
            self.cache.set(&spec.cache_key, json, spec.ttl).await
        }
        .await;
        if let Err(e) = result {
            warn!(exchange = %spec.exchange, error = %e, "TTL cache write failed");
        }
    }
}

/// Liquidity-filter, canonicalize and de-duplicate, keeping source order.
///
/// Pairs that do not survive the venue's canonical/wire round trip are
/// dropped so every handed-out symbol can be subscribed.
fn canonical_symbols(spec: &CatalogSpec, listings: Vec<Listing>) -> Vec<Symbol> {
    let protocol = protocol_for(spec.exchange);
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|l| l.is_liquid(spec.min_quote_volume))
        .filter_map(|l| protocol.canonicalize(&l.wire_symbol).ok())
        .filter(|s| protocol.round_trips(s))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::ttl_cache::InMemoryTtlCache;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tickerhub_core::BoxFuture;

    enum Behavior {
        Fail,
        Listings(Vec<Listing>),
        Alive,
    }

    struct StubSource {
        name: &'static str,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SymbolSource for StubSource {
        fn name(&self) -> &str {
            self.name
        }

        fn fetch(&self) -> BoxFuture<'_, RegistryResult<SourceOutcome>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = match &self.behavior {
                Behavior::Fail => Err(RegistryError::HttpClient("connection refused".into())),
                Behavior::Listings(l) => Ok(SourceOutcome::Listings(l.clone())),
                Behavior::Alive => Ok(SourceOutcome::Alive),
            };
            Box::pin(async move { result })
        }
    }

    fn sym(s: &str) -> Symbol {
        Symbol::canonical(s).unwrap()
    }

    fn bare(symbols: &[&str]) -> Behavior {
        Behavior::Listings(symbols.iter().map(|s| Listing::bare(*s)).collect())
    }

    fn defaults() -> Vec<Symbol> {
        vec![sym("BTCUSDT"), sym("ETHUSDT"), sym("BNBUSDT")]
    }

    #[tokio::test]
    async fn test_secondary_source_used_and_cached() {
        let cache = Arc::new(InMemoryTtlCache::new());
        let primary = StubSource::new("primary", Behavior::Fail);
        let secondary = StubSource::new("secondary", bare(&["BTCUSDT", "ETHUSDT"]));
        let catalog = SymbolCatalog::new(cache.clone()).with_spec(
            CatalogSpec::new(ExchangeId::Binance, defaults())
                .with_source(primary.clone())
                .with_source(secondary.clone()),
        );

        let symbols = catalog.get_available_symbols(ExchangeId::Binance).await;
        assert_eq!(symbols, vec![sym("BTCUSDT"), sym("ETHUSDT")]);
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);

        let raw = cache.get("tickerhub:symbols:BINANCE").await.unwrap().unwrap();
        let cached: SymbolCatalogEntry = serde_json::from_str(&raw).unwrap();
        assert_eq!(cached.symbols, symbols);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let cache = Arc::new(InMemoryTtlCache::new());
        let entry = SymbolCatalogEntry::new(ExchangeId::Binance, vec![sym("SOLUSDT")]);
        cache
            .set(
                "tickerhub:symbols:BINANCE",
                serde_json::to_string(&entry).unwrap(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        let source = StubSource::new("primary", bare(&["BTCUSDT"]));
        let catalog = SymbolCatalog::new(cache)
            .with_spec(CatalogSpec::new(ExchangeId::Binance, defaults()).with_source(source.clone()));

        let symbols = catalog.get_available_symbols(ExchangeId::Binance).await;
        assert_eq!(symbols, vec![sym("SOLUSDT")]);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_liquidity_filter_and_dedup() {
        let listings = vec![
            Listing {
                wire_symbol: "BTCUSDT".into(),
                last_price: Some(dec!(64000)),
                quote_volume: Some(dec!(5000000)),
            },
            Listing {
                wire_symbol: "DEADUSDT".into(),
                last_price: Some(Decimal::ZERO),
                quote_volume: Some(dec!(5000000)),
            },
            Listing {
                wire_symbol: "THINUSDT".into(),
                last_price: Some(dec!(1)),
                quote_volume: Some(dec!(10)),
            },
            Listing::bare("btcusdt"),
        ];
        let catalog = SymbolCatalog::new(Arc::new(InMemoryTtlCache::new())).with_spec(
            CatalogSpec::new(ExchangeId::Binance, defaults())
                .with_source(StubSource::new("full", Behavior::Listings(listings))),
        );
        assert_eq!(
            catalog.get_available_symbols(ExchangeId::Binance).await,
            vec![sym("BTCUSDT")]
        );
    }

    #[tokio::test]
    async fn test_probe_returns_defaults() {
        let cache = Arc::new(InMemoryTtlCache::new());
        let catalog = SymbolCatalog::new(cache.clone()).with_spec(
            CatalogSpec::new(ExchangeId::Binance, defaults())
                .with_source(StubSource::new("full", Behavior::Fail))
                .with_source(StubSource::new("empty", bare(&[])))
                .with_source(StubSource::new("probe", Behavior::Alive)),
        );
        assert_eq!(catalog.get_available_symbols(ExchangeId::Binance).await, defaults());
        assert!(!cache.is_empty());
    }

    #[tokio::test]
    async fn test_all_sources_fail_returns_uncached_defaults() {
        let cache = Arc::new(InMemoryTtlCache::new());
        let source = StubSource::new("full", Behavior::Fail);
        let catalog = SymbolCatalog::new(cache.clone()).with_spec(
            CatalogSpec::new(ExchangeId::Binance, defaults()).with_source(source.clone()),
        );
        assert_eq!(catalog.get_available_symbols(ExchangeId::Binance).await, defaults());
        assert!(cache.is_empty());

        catalog.get_available_symbols(ExchangeId::Binance).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_refetches() {
        let cache = Arc::new(InMemoryTtlCache::new());
        let source = StubSource::new("full", bare(&["BTCUSDT"]));
        let catalog = SymbolCatalog::new(cache).with_spec(
            CatalogSpec::new(ExchangeId::Binance, defaults()).with_source(source.clone()),
        );
        catalog.get_available_symbols(ExchangeId::Binance).await;
        catalog.get_available_symbols(ExchangeId::Binance).await;
        assert_eq!(source.calls(), 1);

        catalog.refresh(ExchangeId::Binance).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_kraken_pairs_are_canonicalized() {
        let catalog = SymbolCatalog::new(Arc::new(InMemoryTtlCache::new())).with_spec(
            CatalogSpec::new(ExchangeId::Kraken, vec![sym("BTCUSD")])
                .with_source(StubSource::new("pairs", bare(&["XBT/USD", "ETH/XBT", "FOO/BAR"]))),
        );
        assert_eq!(
            catalog.get_available_symbols(ExchangeId::Kraken).await,
            vec![sym("BTCUSD"), sym("ETHBTC")]
        );
    }

    #[tokio::test]
    async fn test_unregistered_exchange_is_empty() {
        let catalog = SymbolCatalog::new(Arc::new(InMemoryTtlCache::new()));
        assert!(catalog.get_available_symbols(ExchangeId::Bybit).await.is_empty());
    }
}
