//! The per-exchange wire protocol seam.
//!
//! A `WireProtocol` owns every exchange-specific shape: symbol spelling,
//! REST request layout, subscription frames and the decoding of ticker
//! payloads. Connector drivers are written once against this trait.

use crate::error::{FeedError, FeedResult};
use crate::{BinanceProtocol, BybitProtocol, CoinbaseProtocol, KrakenProtocol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tickerhub_core::{
    derive_change_percent, derive_mid, fraction_to_percent, ExchangeId, Symbol, TickerData,
};

/// How a venue reports the 24h price change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PercentConvention {
    /// Already in percent units (`1.23` = 1.23%).
    Percent,
    /// A fraction (`0.0123` = 1.23%), scaled by 100 on ingest.
    Fraction,
    /// Not reported; derived from last and open prices.
    Derived,
}

impl PercentConvention {
    /// Resolve the stored percent change from the wire figure and prices.
    pub fn resolve(&self, reported: Decimal, last: Decimal, open: Decimal) -> Decimal {
        match self {
            PercentConvention::Percent => reported,
            PercentConvention::Fraction => fraction_to_percent(reported),
            PercentConvention::Derived => derive_change_percent(last, open),
        }
    }
}

/// Out-of-band information for a single normalization call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeContext {
    /// Symbol the payload belongs to, when the caller knows it.
    pub symbol: Option<Symbol>,
    /// Ingestion time; used when the payload carries no event time.
    pub received_at: DateTime<Utc>,
}

impl NormalizeContext {
    pub fn at(received_at: DateTime<Utc>) -> Self {
        Self {
            symbol: None,
            received_at,
        }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn with_symbol(mut self, symbol: Symbol) -> Self {
        self.symbol = Some(symbol);
        self
    }

    /// Prefer the symbol echoed on the wire, fall back to the context.
    pub(crate) fn resolve_symbol(
        &self,
        protocol: &dyn WireProtocol,
        wire: Option<&str>,
    ) -> FeedResult<Symbol> {
        if let Some(sym) = wire.and_then(|w| protocol.canonicalize(w).ok()) {
            return Ok(sym);
        }
        self.symbol.clone().ok_or_else(|| {
            FeedError::UnresolvableSymbol(format!(
                "{}: {}",
                protocol.exchange(),
                wire.unwrap_or("<missing>")
            ))
        })
    }
}

/// One HTTP GET against the exchange's REST base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestRequest {
    pub path: String,
    pub query: Vec<(&'static str, String)>,
}

impl RestRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }
}

/// Exchange-specific wire knowledge.
pub trait WireProtocol: Send + Sync {
    fn exchange(&self) -> ExchangeId;

    fn percent_convention(&self) -> PercentConvention;

    /// Symbol as spelled in REST requests.
    fn wire_symbol(&self, symbol: &Symbol) -> FeedResult<String>;

    /// Symbol as spelled in stream subscriptions.
    fn stream_symbol(&self, symbol: &Symbol) -> FeedResult<String> {
        self.wire_symbol(symbol)
    }

    /// Canonicalize any wire spelling this venue emits.
    fn canonicalize(&self, wire: &str) -> FeedResult<Symbol>;

    /// Requests needed to build one ticker, in the order `normalize_rest` expects.
    fn rest_requests(&self, symbol: &Symbol) -> FeedResult<Vec<RestRequest>>;

    /// Normalize the decoded REST bodies for one symbol.
    fn normalize_rest(
        &self,
        bodies: &[serde_json::Value],
        ctx: &NormalizeContext,
    ) -> FeedResult<TickerData>;

    /// Subscription frames for a symbol set, chunked to the venue's limit.
    fn subscribe_messages(&self, symbols: &[Symbol]) -> Vec<String>;

    /// Normalize one stream message. `Ok(None)` for non-ticker traffic.
    fn normalize_stream(
        &self,
        message: &serde_json::Value,
        ctx: &NormalizeContext,
    ) -> FeedResult<Option<TickerData>>;

    /// Application-level keepalive frame, if the venue requires one.
    fn ping_message(&self) -> Option<String> {
        None
    }

    /// True when the symbol survives canonical -> wire -> canonical intact.
    fn round_trips(&self, symbol: &Symbol) -> bool {
        let rest = self
            .wire_symbol(symbol)
            .and_then(|w| self.canonicalize(&w))
            .map_or(false, |s| &s == symbol);
        let stream = self
            .stream_symbol(symbol)
            .and_then(|w| self.canonicalize(&w))
            .map_or(false, |s| &s == symbol);
        rest && stream
    }
}

/// Figures decoded from a wire payload, before venue conventions apply.
#[derive(Debug, Clone, Default)]
pub(crate) struct TickerFigures {
    pub last: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
    /// Percent change as reported; ignored under `Derived`.
    pub reported_change: Decimal,
    pub open: Decimal,
    /// Venue VWAP; zero when not reported.
    pub weighted: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub trades: u64,
}

impl TickerFigures {
    /// Apply the venue's percent convention and mid fallback.
    pub(crate) fn into_ticker(
        self,
        protocol: &dyn WireProtocol,
        symbol: Symbol,
        observed_at: DateTime<Utc>,
    ) -> TickerData {
        let mut t = TickerData::new(protocol.exchange(), symbol, observed_at);
        t.price_change_percent_24h =
            protocol
                .percent_convention()
                .resolve(self.reported_change, self.last, self.open);
        t.weighted_avg_price = if self.weighted > Decimal::ZERO {
            self.weighted
        } else {
            derive_mid(self.bid, self.ask, self.last)
        };
        t.last_price = self.last;
        t.high_price_24h = self.high;
        t.low_price_24h = self.low;
        t.volume_24h = self.volume;
        t.open_price = self.open;
        t.trade_count = self.trades;
        t.sanitized()
    }
}

/// Static protocol instance for an exchange.
pub fn protocol_for(exchange: ExchangeId) -> &'static dyn WireProtocol {
    match exchange {
        ExchangeId::Binance => &BinanceProtocol,
        ExchangeId::Bybit => &BybitProtocol,
        ExchangeId::Kraken => &KrakenProtocol,
        ExchangeId::Coinbase => &CoinbaseProtocol,
    }
}

/// Split `items` into JSON frames of at most `limit` entries each.
pub(crate) fn chunked<T, F>(items: &[T], limit: usize, mut frame: F) -> Vec<String>
where
    F: FnMut(usize, &[T]) -> serde_json::Value,
{
    items
        .chunks(limit.max(1))
        .enumerate()
        .map(|(i, chunk)| frame(i, chunk).to_string())
        .collect()
}
