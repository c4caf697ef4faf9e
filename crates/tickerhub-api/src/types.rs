//! Response bodies.

use serde::Serialize;
use tickerhub_core::{ExchangeId, TickerData};
use tickerhub_fetcher::ExchangeStatus;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerList {
    pub count: usize,
    pub tickers: Vec<TickerData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeList {
    pub exchanges: Vec<ExchangeId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub streaming_enabled: bool,
    pub cached_tickers: usize,
    pub exchanges: Vec<ExchangeStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingToggle {
    pub streaming_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRefresh {
    pub exchange: ExchangeId,
    pub tracked_symbols: usize,
}
