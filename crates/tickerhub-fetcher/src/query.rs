//! Read-side query and status types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tickerhub_core::{ExchangeId, TickerData};

/// Filters for the ticker listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TickerQuery {
    /// Canonical-symbol substring (`btc`, `BTC/USDT`).
    pub symbol: Option<String>,
    /// Exchange name, case-insensitive.
    pub exchange: Option<String>,
    pub limit: Option<usize>,
}

impl TickerQuery {
    /// Apply the filters, order by exchange then symbol, and cap.
    pub fn apply(&self, mut tickers: Vec<TickerData>) -> Vec<TickerData> {
        if let Some(raw) = self.exchange.as_deref().filter(|s| !s.trim().is_empty()) {
            match ExchangeId::from_str(raw.trim()) {
                Ok(exchange) => tickers.retain(|t| t.exchange_name == exchange),
                Err(_) => return Vec::new(),
            }
        }

        if let Some(filter) = self.symbol.as_deref().filter(|s| !s.trim().is_empty()) {
            tickers.retain(|t| t.symbol.matches_filter(filter));
        }

        tickers.sort_by(|a, b| {
            a.exchange_name
                .as_str()
                .cmp(b.exchange_name.as_str())
                .then_with(|| a.symbol.cmp(&b.symbol))
        });

        if let Some(limit) = self.limit {
            tickers.truncate(limit);
        }
        tickers
    }
}

/// Connectivity of one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeStatus {
    pub exchange: ExchangeId,
    pub stream_state: String,
    pub connected: bool,
    pub rest_enabled: bool,
    pub stream_enabled: bool,
    /// Global streaming toggle.
    pub streaming_active: bool,
    pub tracked_symbols: usize,
    pub cached_tickers: usize,
    pub last_poll: Option<DateTime<Utc>>,
}
