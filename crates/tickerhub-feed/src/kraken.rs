//! Kraken spot.
//!
//! REST: `GET /0/public/Ticker?pair=XBTUSD`; the result is keyed by the
//! legacy pair name (`XXBTZUSD`).
//! Stream (v1): subscribe by `XBT/USD`; ticker pushes are positional
//! arrays `[channelId, {..}, "ticker", "XBT/USD"]`.
//! Kraken reports no percent change, so it is derived from the open.

use crate::error::{FeedError, FeedResult};
use crate::protocol::{
    chunked, NormalizeContext, PercentConvention, RestRequest, TickerFigures, WireProtocol,
};
use crate::wire::{num_at, WireNumber};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use tickerhub_core::{ExchangeId, Symbol, TickerData};
use tracing::debug;

/// Pairs per subscribe frame.
const MAX_PAIRS_PER_MESSAGE: usize = 100;

/// Quote assets in canonical spelling, used to split canonical symbols.
const QUOTES: &[&str] = &[
    "USD", "USDT", "USDC", "EUR", "GBP", "CAD", "JPY", "CHF", "AUD", "BTC", "ETH", "DAI",
];

/// Quote assets in Kraken spelling, used to split compact wire names.
const WIRE_QUOTES: &[&str] = &[
    "USD", "USDT", "USDC", "EUR", "GBP", "CAD", "JPY", "CHF", "AUD", "XBT", "ETH", "DAI",
];

/// Kraken asset codes that differ from the common ticker.
const ASSET_ALIASES: &[(&str, &str)] = &[
    ("XBT", "BTC"),
    ("XXBT", "BTC"),
    ("XDG", "DOGE"),
    ("XXDG", "DOGE"),
    ("XETH", "ETH"),
    ("XLTC", "LTC"),
    ("XXRP", "XRP"),
    ("XXLM", "XLM"),
    ("XETC", "ETC"),
    ("XXMR", "XMR"),
    ("XZEC", "ZEC"),
    ("XMLN", "MLN"),
    ("XREP", "REP"),
    ("ZUSD", "USD"),
    ("ZEUR", "EUR"),
    ("ZGBP", "GBP"),
    ("ZCAD", "CAD"),
    ("ZJPY", "JPY"),
    ("ZCHF", "CHF"),
    ("ZAUD", "AUD"),
];

fn to_common(asset: &str) -> &str {
    ASSET_ALIASES
        .iter()
        .find(|(kraken, _)| *kraken == asset)
        .map_or(asset, |(_, common)| *common)
}

fn is_legacy(asset: &str) -> bool {
    asset.len() == 4 && ASSET_ALIASES.iter().any(|(kraken, _)| *kraken == asset)
}

/// Split a separator-less pair. Eight-letter legacy names (`XXBTZUSD`)
/// split in half; everything else splits on the quote suffix.
fn split_compact(compact: &Symbol) -> Option<(&str, &str)> {
    let s = compact.as_str();
    if s.len() == 8 {
        let (base, quote) = s.split_at(4);
        if is_legacy(base) && is_legacy(quote) {
            return Some((base, quote));
        }
    }
    compact.split_quote(WIRE_QUOTES)
}

fn to_kraken(asset: &str) -> &str {
    match asset {
        "BTC" => "XBT",
        "DOGE" => "XDG",
        other => other,
    }
}

#[derive(Debug, Deserialize)]
struct RestEnvelope {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: BTreeMap<String, WireTicker>,
}

/// Ticker object. Arrays are `[today, last 24h]` except `a`/`b`/`c`,
/// which lead with the price. `o` is a scalar on REST and a pair on the
/// stream.
#[derive(Debug, Deserialize)]
struct WireTicker {
    #[serde(default)]
    a: Option<Vec<WireNumber>>,
    #[serde(default)]
    b: Option<Vec<WireNumber>>,
    #[serde(default)]
    c: Option<Vec<WireNumber>>,
    #[serde(default)]
    v: Option<Vec<WireNumber>>,
    #[serde(default)]
    p: Option<Vec<WireNumber>>,
    #[serde(default)]
    t: Option<Vec<WireNumber>>,
    #[serde(default)]
    l: Option<Vec<WireNumber>>,
    #[serde(default)]
    h: Option<Vec<WireNumber>>,
    #[serde(default)]
    o: Option<OpenField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OpenField {
    Pair(Vec<WireNumber>),
    Single(WireNumber),
}

impl WireTicker {
    fn figures(&self) -> TickerFigures {
        let open = match &self.o {
            Some(OpenField::Single(n)) => n.to_decimal(),
            Some(OpenField::Pair(v)) => v
                .get(1)
                .or_else(|| v.first())
                .map(WireNumber::to_decimal)
                .unwrap_or_default(),
            None => Default::default(),
        };
        TickerFigures {
            last: num_at(&self.c, 0),
            high: num_at(&self.h, 1),
            low: num_at(&self.l, 1),
            volume: num_at(&self.v, 1),
            reported_change: Default::default(),
            open,
            weighted: num_at(&self.p, 1),
            bid: num_at(&self.b, 0),
            ask: num_at(&self.a, 0),
            trades: self
                .t
                .as_ref()
                .and_then(|t| t.get(1))
                .map_or(0, WireNumber::to_u64),
        }
    }
}

/// Kraken wire protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct KrakenProtocol;

impl KrakenProtocol {
    fn split<'a>(&self, symbol: &'a Symbol) -> FeedResult<(&'a str, &'a str)> {
        symbol.split_quote(QUOTES).ok_or_else(|| {
            FeedError::UnresolvableSymbol(format!("no Kraken quote asset in {symbol}"))
        })
    }
}

impl WireProtocol for KrakenProtocol {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Kraken
    }

    fn percent_convention(&self) -> PercentConvention {
        PercentConvention::Derived
    }

    /// Compact REST spelling, e.g. `XBTUSD`.
    fn wire_symbol(&self, symbol: &Symbol) -> FeedResult<String> {
        let (base, quote) = self.split(symbol)?;
        Ok(format!("{}{}", to_kraken(base), to_kraken(quote)))
    }

    /// Slash-delimited stream spelling, e.g. `XBT/USD`.
    fn stream_symbol(&self, symbol: &Symbol) -> FeedResult<String> {
        let (base, quote) = self.split(symbol)?;
        Ok(format!("{}/{}", to_kraken(base), to_kraken(quote)))
    }

    /// Accepts `XBT/USD`, `XBTUSD` and legacy `XXBTZUSD`.
    fn canonicalize(&self, wire: &str) -> FeedResult<Symbol> {
        let unresolvable = || FeedError::UnresolvableSymbol(format!("Kraken pair {wire}"));
        let wire = wire.trim().to_ascii_uppercase();

        let (base, quote) = match wire.split_once('/') {
            Some(parts) => parts,
            None => {
                let compact = Symbol::canonical(&wire).map_err(|_| unresolvable())?;
                let (base, quote) = split_compact(&compact).ok_or_else(unresolvable)?;
                return Symbol::from_parts(to_common(base), to_common(quote))
                    .map_err(|_| unresolvable());
            }
        };
        Symbol::from_parts(to_common(base), to_common(quote)).map_err(|_| unresolvable())
    }

    fn rest_requests(&self, symbol: &Symbol) -> FeedResult<Vec<RestRequest>> {
        Ok(vec![
            RestRequest::get("/0/public/Ticker").param("pair", self.wire_symbol(symbol)?)
        ])
    }

    fn normalize_rest(
        &self,
        bodies: &[serde_json::Value],
        ctx: &NormalizeContext,
    ) -> FeedResult<TickerData> {
        let body = bodies
            .first()
            .ok_or_else(|| FeedError::ParseError("empty Kraken response".to_string()))?;
        let envelope: RestEnvelope = serde_json::from_value(body.clone())?;

        if !envelope.error.is_empty() {
            return Err(FeedError::Rejected(envelope.error.join("; ")));
        }

        let (pair, raw) = envelope
            .result
            .into_iter()
            .next()
            .ok_or_else(|| FeedError::ParseError("Kraken result is empty".to_string()))?;

        let symbol = ctx.resolve_symbol(self, Some(&pair))?;
        Ok(raw.figures().into_ticker(self, symbol, ctx.received_at))
    }

    fn subscribe_messages(&self, symbols: &[Symbol]) -> Vec<String> {
        let pairs: Vec<String> = symbols
            .iter()
            .filter_map(|s| self.stream_symbol(s).ok())
            .collect();
        chunked(&pairs, MAX_PAIRS_PER_MESSAGE, |_, chunk| {
            json!({
                "event": "subscribe",
                "pair": chunk,
                "subscription": { "name": "ticker" }
            })
        })
    }

    fn normalize_stream(
        &self,
        message: &serde_json::Value,
        ctx: &NormalizeContext,
    ) -> FeedResult<Option<TickerData>> {
        let Some(items) = message.as_array() else {
            debug!(event = ?message.get("event"), "Ignoring Kraken event message");
            return Ok(None);
        };

        // [channelId, payload, channelName, pair]
        if items.len() < 4 || items[items.len() - 2].as_str() != Some("ticker") {
            return Ok(None);
        }

        let raw: WireTicker = serde_json::from_value(items[1].clone())?;
        let symbol = ctx.resolve_symbol(self, items[items.len() - 1].as_str())?;
        Ok(Some(raw.figures().into_ticker(self, symbol, ctx.received_at)))
    }
}
