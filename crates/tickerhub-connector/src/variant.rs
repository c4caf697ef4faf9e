//! Per-exchange constants.
//!
//! Everything that differs between exchanges and is not a wire shape lives
//! here: endpoints, symbol sources, default symbols and stream limits.

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tickerhub_core::{ExchangeId, Symbol};
use tickerhub_feed::{protocol_for, WireProtocol};
use tickerhub_registry::{CatalogSpec, HttpSymbolSource, ListingFormat};
use tracing::warn;

/// One symbol-list endpoint, relative to the REST base URL.
#[derive(Debug, Clone, Copy)]
pub struct SourceEndpoint {
    pub path: &'static str,
    pub format: ListingFormat,
}

#[derive(Debug)]
pub struct ExchangeVariant {
    pub exchange: ExchangeId,
    pub rest_base_url: &'static str,
    pub ws_url: &'static str,
    /// Symbol sources in priority order.
    pub symbol_sources: &'static [SourceEndpoint],
    /// Most liquid majors, used when no source yields a list.
    pub default_symbols: &'static [&'static str],
    pub max_stream_symbols: usize,
    pub heartbeat_interval: Duration,
}

impl ExchangeVariant {
    pub fn protocol(&self) -> &'static dyn WireProtocol {
        protocol_for(self.exchange)
    }

    /// Default symbols in canonical form.
    pub fn defaults(&self) -> Vec<Symbol> {
        self.default_symbols
            .iter()
            .filter_map(|raw| match Symbol::canonical(raw) {
                Ok(symbol) => Some(symbol),
                Err(e) => {
                    warn!(exchange = %self.exchange, %raw, error = %e, "Skipping bad default symbol");
                    None
                }
            })
            .collect()
    }
}

pub const BINANCE: ExchangeVariant = ExchangeVariant {
    exchange: ExchangeId::Binance,
    rest_base_url: "https://api.binance.com",
    ws_url: "wss://stream.binance.com:9443/ws",
    symbol_sources: &[
        SourceEndpoint {
            path: "/api/v3/ticker/24hr",
            format: ListingFormat::BinanceTicker24h,
        },
        SourceEndpoint {
            path: "/api/v3/ticker/price",
            format: ListingFormat::BinancePriceList,
        },
        SourceEndpoint {
            path: "/api/v3/ping",
            format: ListingFormat::LivenessProbe,
        },
    ],
    default_symbols: &[
        "BTCUSDT", "ETHUSDT", "BNBUSDT", "XRPUSDT", "ADAUSDT", "SOLUSDT", "DOGEUSDT", "DOTUSDT",
        "LTCUSDT", "LINKUSDT", "BCHUSDT", "XLMUSDT", "UNIUSDT", "ETCUSDT", "FILUSDT", "TRXUSDT",
        "AVAXUSDT", "ATOMUSDT", "SHIBUSDT", "PEPEUSDT", "ARBUSDT", "OPUSDT", "MATICUSDT",
        "NEARUSDT",
    ],
    max_stream_symbols: 200,
    heartbeat_interval: Duration::from_secs(30),
};

pub const BYBIT: ExchangeVariant = ExchangeVariant {
    exchange: ExchangeId::Bybit,
    rest_base_url: "https://api.bybit.com",
    ws_url: "wss://stream.bybit.com/v5/public/spot",
    symbol_sources: &[
        SourceEndpoint {
            path: "/v5/market/tickers?category=spot",
            format: ListingFormat::BybitTickers,
        },
        SourceEndpoint {
            path: "/v5/market/instruments-info?category=spot",
            format: ListingFormat::BybitInstruments,
        },
        SourceEndpoint {
            path: "/v5/market/time",
            format: ListingFormat::LivenessProbe,
        },
    ],
    default_symbols: &[
        "BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT", "DOGEUSDT", "ADAUSDT", "LTCUSDT", "LINKUSDT",
        "DOTUSDT", "AVAXUSDT", "TRXUSDT", "TONUSDT",
    ],
    max_stream_symbols: 200,
    // Bybit drops idle connections after 30s without a ping.
    heartbeat_interval: Duration::from_secs(20),
};

pub const KRAKEN: ExchangeVariant = ExchangeVariant {
    exchange: ExchangeId::Kraken,
    rest_base_url: "https://api.kraken.com",
    ws_url: "wss://ws.kraken.com",
    symbol_sources: &[
        SourceEndpoint {
            path: "/0/public/AssetPairs",
            format: ListingFormat::KrakenAssetPairs,
        },
        SourceEndpoint {
            path: "/0/public/Time",
            format: ListingFormat::LivenessProbe,
        },
    ],
    default_symbols: &[
        "BTCUSD", "ETHUSD", "SOLUSD", "XRPUSD", "ADAUSD", "DOGEUSD", "DOTUSD", "LTCUSD", "LINKUSD",
        "BTCEUR", "ETHEUR", "USDTUSD",
    ],
    max_stream_symbols: 100,
    heartbeat_interval: Duration::from_secs(30),
};

pub const COINBASE: ExchangeVariant = ExchangeVariant {
    exchange: ExchangeId::Coinbase,
    rest_base_url: "https://api.exchange.coinbase.com",
    ws_url: "wss://ws-feed.exchange.coinbase.com",
    symbol_sources: &[
        SourceEndpoint {
            path: "/products",
            format: ListingFormat::CoinbaseProducts,
        },
        SourceEndpoint {
            path: "/time",
            format: ListingFormat::LivenessProbe,
        },
    ],
    default_symbols: &[
        "BTCUSD", "ETHUSD", "SOLUSD", "XRPUSD", "ADAUSD", "DOGEUSD", "LTCUSD", "LINKUSD", "AVAXUSD",
        "BTCEUR", "ETHEUR", "USDTUSD",
    ],
    max_stream_symbols: 100,
    heartbeat_interval: Duration::from_secs(30),
};

pub fn variant_for(exchange: ExchangeId) -> &'static ExchangeVariant {
    match exchange {
        ExchangeId::Binance => &BINANCE,
        ExchangeId::Bybit => &BYBIT,
        ExchangeId::Kraken => &KRAKEN,
        ExchangeId::Coinbase => &COINBASE,
    }
}

/// Build the catalog fallback chain for `variant` against `rest_base_url`.
pub fn catalog_spec(
    variant: &ExchangeVariant,
    client: &Client,
    rest_base_url: &str,
    source_attempts: u32,
    retry_pause: Duration,
) -> CatalogSpec {
    let base = rest_base_url.trim_end_matches('/');
    variant
        .symbol_sources
        .iter()
        .fold(
            CatalogSpec::new(variant.exchange, variant.defaults()),
            |spec, endpoint| {
                let source = HttpSymbolSource::new(
                    client.clone(),
                    format!("{base}{}", endpoint.path),
                    endpoint.format,
                )
                .with_retries(source_attempts, retry_pause);
                spec.with_source(Arc::new(source))
            },
        )
}
