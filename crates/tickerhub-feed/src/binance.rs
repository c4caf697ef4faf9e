//! Binance spot.
//!
//! REST: `GET /api/v3/ticker/24hr?symbol=BTCUSDT`.
//! Stream: `<symbol>@ticker` on `/ws`, optionally wrapped in a
//! combined-stream `{"stream": .., "data": ..}` envelope.
//! `priceChangePercent` / `P` are already in percent units.

use crate::error::{FeedError, FeedResult};
use crate::protocol::{
    chunked, NormalizeContext, PercentConvention, RestRequest, TickerFigures, WireProtocol,
};
use crate::wire::{count, from_millis, num, WireNumber};
use serde::Deserialize;
use serde_json::json;
use tickerhub_core::{ExchangeId, Symbol, TickerData};
use tracing::debug;

/// Streams per SUBSCRIBE frame.
const MAX_STREAMS_PER_MESSAGE: usize = 50;

/// `/api/v3/ticker/24hr` response (or an error body).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestTicker {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    last_price: Option<WireNumber>,
    #[serde(default)]
    high_price: Option<WireNumber>,
    #[serde(default)]
    low_price: Option<WireNumber>,
    #[serde(default)]
    volume: Option<WireNumber>,
    #[serde(default)]
    price_change_percent: Option<WireNumber>,
    #[serde(default)]
    open_price: Option<WireNumber>,
    #[serde(default)]
    weighted_avg_price: Option<WireNumber>,
    #[serde(default)]
    bid_price: Option<WireNumber>,
    #[serde(default)]
    ask_price: Option<WireNumber>,
    #[serde(default)]
    count: Option<WireNumber>,
    #[serde(default)]
    close_time: Option<i64>,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
}

/// `24hrTicker` stream event.
#[derive(Debug, Deserialize)]
struct StreamTicker {
    #[serde(rename = "e", default)]
    event: Option<String>,
    #[serde(rename = "E", default)]
    event_time: Option<i64>,
    #[serde(rename = "s", default)]
    symbol: Option<String>,
    #[serde(rename = "c", default)]
    last: Option<WireNumber>,
    #[serde(rename = "h", default)]
    high: Option<WireNumber>,
    #[serde(rename = "l", default)]
    low: Option<WireNumber>,
    #[serde(rename = "v", default)]
    volume: Option<WireNumber>,
    #[serde(rename = "P", default)]
    change_percent: Option<WireNumber>,
    #[serde(rename = "o", default)]
    open: Option<WireNumber>,
    #[serde(rename = "w", default)]
    weighted: Option<WireNumber>,
    #[serde(rename = "b", default)]
    bid: Option<WireNumber>,
    #[serde(rename = "a", default)]
    ask: Option<WireNumber>,
    #[serde(rename = "n", default)]
    trades: Option<WireNumber>,
}

/// Binance wire protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinanceProtocol;

impl WireProtocol for BinanceProtocol {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    fn percent_convention(&self) -> PercentConvention {
        PercentConvention::Percent
    }

    fn wire_symbol(&self, symbol: &Symbol) -> FeedResult<String> {
        Ok(symbol.as_str().to_string())
    }

    fn stream_symbol(&self, symbol: &Symbol) -> FeedResult<String> {
        Ok(symbol.as_str().to_ascii_lowercase())
    }

    fn canonicalize(&self, wire: &str) -> FeedResult<Symbol> {
        Symbol::canonical(wire).map_err(|e| FeedError::UnresolvableSymbol(e.to_string()))
    }

    fn rest_requests(&self, symbol: &Symbol) -> FeedResult<Vec<RestRequest>> {
        Ok(vec![RestRequest::get("/api/v3/ticker/24hr")
            .param("symbol", self.wire_symbol(symbol)?)])
    }

    fn normalize_rest(
        &self,
        bodies: &[serde_json::Value],
        ctx: &NormalizeContext,
    ) -> FeedResult<TickerData> {
        let body = bodies
            .first()
            .ok_or_else(|| FeedError::ParseError("empty Binance response".to_string()))?;
        let raw: RestTicker = serde_json::from_value(body.clone())?;

        if let (None, Some(code)) = (&raw.symbol, raw.code) {
            return Err(FeedError::Rejected(format!(
                "Binance {code}: {}",
                raw.msg.unwrap_or_default()
            )));
        }

        let symbol = ctx.resolve_symbol(self, raw.symbol.as_deref())?;
        let figures = TickerFigures {
            last: num(&raw.last_price),
            high: num(&raw.high_price),
            low: num(&raw.low_price),
            volume: num(&raw.volume),
            reported_change: num(&raw.price_change_percent),
            open: num(&raw.open_price),
            weighted: num(&raw.weighted_avg_price),
            bid: num(&raw.bid_price),
            ask: num(&raw.ask_price),
            trades: count(&raw.count),
        };
        let observed_at = from_millis(raw.close_time).unwrap_or(ctx.received_at);
        Ok(figures.into_ticker(self, symbol, observed_at))
    }

    fn subscribe_messages(&self, symbols: &[Symbol]) -> Vec<String> {
        let streams: Vec<String> = symbols
            .iter()
            .filter_map(|s| self.stream_symbol(s).ok())
            .map(|s| format!("{s}@ticker"))
            .collect();
        chunked(&streams, MAX_STREAMS_PER_MESSAGE, |i, chunk| {
            json!({ "method": "SUBSCRIBE", "params": chunk, "id": i + 1 })
        })
    }

    fn normalize_stream(
        &self,
        message: &serde_json::Value,
        ctx: &NormalizeContext,
    ) -> FeedResult<Option<TickerData>> {
        let payload = message.get("data").unwrap_or(message);
        if !payload.is_object() {
            return Err(FeedError::ParseError(
                "Binance stream payload is not an object".to_string(),
            ));
        }
        let raw: StreamTicker = serde_json::from_value(payload.clone())?;

        match raw.event.as_deref() {
            Some("24hrTicker") => {}
            other => {
                debug!(event = ?other, "Ignoring non-ticker Binance message");
                return Ok(None);
            }
        }

        let symbol = ctx.resolve_symbol(self, raw.symbol.as_deref())?;
        let figures = TickerFigures {
            last: num(&raw.last),
            high: num(&raw.high),
            low: num(&raw.low),
            volume: num(&raw.volume),
            reported_change: num(&raw.change_percent),
            open: num(&raw.open),
            weighted: num(&raw.weighted),
            bid: num(&raw.bid),
            ask: num(&raw.ask),
            trades: count(&raw.trades),
        };
        let observed_at = from_millis(raw.event_time).unwrap_or(ctx.received_at);
        Ok(Some(figures.into_ticker(self, symbol, observed_at)))
    }
}
