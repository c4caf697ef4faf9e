//! Bybit v5 spot.
//!
//! REST: `GET /v5/market/tickers?category=spot&symbol=BTCUSDT`.
//! Stream: `tickers.<SYMBOL>` topics on `/v5/public/spot`.
//! `price24hPcnt` is a fraction and is scaled on ingest.

use crate::error::{FeedError, FeedResult};
use crate::protocol::{
    chunked, NormalizeContext, PercentConvention, RestRequest, TickerFigures, WireProtocol,
};
use crate::wire::{from_millis, num, WireNumber};
use serde::Deserialize;
use serde_json::json;
use tickerhub_core::{ExchangeId, Symbol, TickerData};
use tracing::debug;

/// Spot connections accept at most ten args per subscribe request.
const MAX_ARGS_PER_MESSAGE: usize = 10;

const TOPIC_PREFIX: &str = "tickers.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestEnvelope {
    #[serde(default)]
    ret_code: Option<i64>,
    #[serde(default)]
    ret_msg: Option<String>,
    #[serde(default)]
    result: Option<RestResult>,
    #[serde(default)]
    time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RestResult {
    #[serde(default)]
    list: Vec<WireTicker>,
}

/// Ticker fields shared by the REST list entries and stream `data`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTicker {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    last_price: Option<WireNumber>,
    #[serde(default)]
    high_price_24h: Option<WireNumber>,
    #[serde(default)]
    low_price_24h: Option<WireNumber>,
    #[serde(default)]
    prev_price_24h: Option<WireNumber>,
    #[serde(default)]
    volume_24h: Option<WireNumber>,
    #[serde(default)]
    price_24h_pcnt: Option<WireNumber>,
    #[serde(default)]
    bid1_price: Option<WireNumber>,
    #[serde(default)]
    ask1_price: Option<WireNumber>,
}

impl WireTicker {
    fn figures(&self) -> TickerFigures {
        TickerFigures {
            last: num(&self.last_price),
            high: num(&self.high_price_24h),
            low: num(&self.low_price_24h),
            volume: num(&self.volume_24h),
            reported_change: num(&self.price_24h_pcnt),
            open: num(&self.prev_price_24h),
            weighted: Default::default(),
            bid: num(&self.bid1_price),
            ask: num(&self.ask1_price),
            trades: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    ts: Option<i64>,
    #[serde(default)]
    data: Option<WireTicker>,
}

/// Bybit wire protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct BybitProtocol;

impl WireProtocol for BybitProtocol {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Bybit
    }

    fn percent_convention(&self) -> PercentConvention {
        PercentConvention::Fraction
    }

    fn wire_symbol(&self, symbol: &Symbol) -> FeedResult<String> {
        Ok(symbol.as_str().to_string())
    }

    fn canonicalize(&self, wire: &str) -> FeedResult<Symbol> {
        Symbol::canonical(wire).map_err(|e| FeedError::UnresolvableSymbol(e.to_string()))
    }

    fn rest_requests(&self, symbol: &Symbol) -> FeedResult<Vec<RestRequest>> {
        Ok(vec![RestRequest::get("/v5/market/tickers")
            .param("category", "spot")
            .param("symbol", self.wire_symbol(symbol)?)])
    }

    fn normalize_rest(
        &self,
        bodies: &[serde_json::Value],
        ctx: &NormalizeContext,
    ) -> FeedResult<TickerData> {
        let body = bodies
            .first()
            .ok_or_else(|| FeedError::ParseError("empty Bybit response".to_string()))?;
        let envelope: RestEnvelope = serde_json::from_value(body.clone())?;

        if let Some(code) = envelope.ret_code.filter(|c| *c != 0) {
            return Err(FeedError::Rejected(format!(
                "Bybit {code}: {}",
                envelope.ret_msg.unwrap_or_default()
            )));
        }

        let raw = envelope
            .result
            .and_then(|r| r.list.into_iter().next())
            .ok_or_else(|| FeedError::ParseError("Bybit ticker list is empty".to_string()))?;

        let symbol = ctx.resolve_symbol(self, raw.symbol.as_deref())?;
        let observed_at = from_millis(envelope.time).unwrap_or(ctx.received_at);
        Ok(raw.figures().into_ticker(self, symbol, observed_at))
    }

    fn subscribe_messages(&self, symbols: &[Symbol]) -> Vec<String> {
        let args: Vec<String> = symbols
            .iter()
            .filter_map(|s| self.stream_symbol(s).ok())
            .map(|s| format!("{TOPIC_PREFIX}{s}"))
            .collect();
        chunked(&args, MAX_ARGS_PER_MESSAGE, |_, chunk| {
            json!({ "op": "subscribe", "args": chunk })
        })
    }

    fn normalize_stream(
        &self,
        message: &serde_json::Value,
        ctx: &NormalizeContext,
    ) -> FeedResult<Option<TickerData>> {
        let msg: StreamMessage = serde_json::from_value(message.clone())?;

        let Some(topic_symbol) = msg
            .topic
            .as_deref()
            .and_then(|t| t.strip_prefix(TOPIC_PREFIX))
        else {
            debug!(op = ?message.get("op"), "Ignoring non-ticker Bybit message");
            return Ok(None);
        };

        let raw = msg
            .data
            .ok_or_else(|| FeedError::ParseError("Bybit ticker without data".to_string()))?;
        let wire = raw
            .symbol
            .as_deref()
            .filter(|s| self.canonicalize(s).is_ok())
            .unwrap_or(topic_symbol);
        let symbol = ctx.resolve_symbol(self, Some(wire))?;
        let observed_at = from_millis(msg.ts).unwrap_or(ctx.received_at);
        Ok(Some(raw.figures().into_ticker(self, symbol, observed_at)))
    }

    fn ping_message(&self) -> Option<String> {
        Some(json!({ "op": "ping" }).to_string())
    }
}
