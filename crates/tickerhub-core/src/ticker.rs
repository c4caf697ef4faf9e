//! Normalized ticker record.
//!
//! `TickerData` is the only market-data shape that leaves the wire
//! normalizers. It is an immutable value: a newer observation for the
//! same `(exchange, symbol)` replaces it wholesale.

use crate::decimal::non_negative;
use crate::{ExchangeId, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 24h ticker snapshot for one symbol on one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerData {
    /// Exchange the observation came from.
    pub exchange_name: ExchangeId,
    /// Canonical symbol.
    pub symbol: Symbol,
    pub last_price: Decimal,
    pub high_price_24h: Decimal,
    pub low_price_24h: Decimal,
    /// Base-asset volume over the trailing 24h.
    pub volume_24h: Decimal,
    /// Signed, in percent units (`1.23` means 1.23%).
    pub price_change_percent_24h: Decimal,
    pub open_price: Decimal,
    /// Volume-weighted average, or bid/ask mid when the venue has no VWAP.
    pub weighted_avg_price: Decimal,
    pub trade_count: u64,
    /// Event time when the source supplies one, else ingestion time.
    pub observed_at: DateTime<Utc>,
}

impl TickerData {
    /// Create an empty record; all figures start at zero.
    pub fn new(exchange_name: ExchangeId, symbol: Symbol, observed_at: DateTime<Utc>) -> Self {
        Self {
            exchange_name,
            symbol,
            last_price: Decimal::ZERO,
            high_price_24h: Decimal::ZERO,
            low_price_24h: Decimal::ZERO,
            volume_24h: Decimal::ZERO,
            price_change_percent_24h: Decimal::ZERO,
            open_price: Decimal::ZERO,
            weighted_avg_price: Decimal::ZERO,
            trade_count: 0,
            observed_at,
        }
    }

    /// Cache key.
    pub fn key(&self) -> (ExchangeId, Symbol) {
        (self.exchange_name, self.symbol.clone())
    }

    /// Zero-volume rows are treated as "no live data yet".
    #[inline]
    pub fn has_volume(&self) -> bool {
        self.volume_24h > Decimal::ZERO
    }

    /// Clamp every non-signed figure at zero.
    pub fn sanitized(mut self) -> Self {
        self.last_price = non_negative(self.last_price);
        self.high_price_24h = non_negative(self.high_price_24h);
        self.low_price_24h = non_negative(self.low_price_24h);
        self.volume_24h = non_negative(self.volume_24h);
        self.open_price = non_negative(self.open_price);
        self.weighted_avg_price = non_negative(self.weighted_avg_price);
        self
    }
}
