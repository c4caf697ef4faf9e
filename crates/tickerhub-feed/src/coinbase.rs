//! Coinbase Exchange.
//!
//! REST needs two calls per product: `/products/{id}/ticker` for the
//! last trade and top of book, `/products/{id}/stats` for the 24h
//! open/high/low. Neither body echoes the product id, so the symbol
//! comes from the normalize context.
//! Stream: `ticker` channel on the public feed.

use crate::error::{FeedError, FeedResult};
use crate::protocol::{
    chunked, NormalizeContext, PercentConvention, RestRequest, TickerFigures, WireProtocol,
};
use crate::wire::{from_rfc3339, num, WireNumber};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tickerhub_core::{ExchangeId, Symbol, TickerData};
use tracing::debug;

const MAX_PRODUCTS_PER_MESSAGE: usize = 100;

const QUOTES: &[&str] = &["USD", "USDT", "USDC", "EUR", "GBP", "BTC", "ETH", "DAI"];

#[derive(Debug, Deserialize)]
struct RestTicker {
    #[serde(default)]
    price: Option<WireNumber>,
    #[serde(default)]
    bid: Option<WireNumber>,
    #[serde(default)]
    ask: Option<WireNumber>,
    #[serde(default)]
    volume: Option<WireNumber>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RestStats {
    #[serde(default)]
    open: Option<WireNumber>,
    #[serde(default)]
    high: Option<WireNumber>,
    #[serde(default)]
    low: Option<WireNumber>,
    #[serde(default)]
    last: Option<WireNumber>,
    #[serde(default)]
    volume: Option<WireNumber>,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    price: Option<WireNumber>,
    #[serde(default)]
    open_24h: Option<WireNumber>,
    #[serde(default)]
    volume_24h: Option<WireNumber>,
    #[serde(default)]
    low_24h: Option<WireNumber>,
    #[serde(default)]
    high_24h: Option<WireNumber>,
    #[serde(default)]
    best_bid: Option<WireNumber>,
    #[serde(default)]
    best_ask: Option<WireNumber>,
    #[serde(default)]
    time: Option<String>,
}

/// Coinbase Exchange wire protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoinbaseProtocol;

impl WireProtocol for CoinbaseProtocol {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Coinbase
    }

    fn percent_convention(&self) -> PercentConvention {
        PercentConvention::Derived
    }

    /// Hyphenated product id, e.g. `BTC-USD`.
    fn wire_symbol(&self, symbol: &Symbol) -> FeedResult<String> {
        let (base, quote) = symbol.split_quote(QUOTES).ok_or_else(|| {
            FeedError::UnresolvableSymbol(format!("no Coinbase quote asset in {symbol}"))
        })?;
        Ok(format!("{base}-{quote}"))
    }

    fn canonicalize(&self, wire: &str) -> FeedResult<Symbol> {
        wire.split_once('-')
            .and_then(|(base, quote)| Symbol::from_parts(base, quote).ok())
            .ok_or_else(|| FeedError::UnresolvableSymbol(format!("Coinbase product {wire}")))
    }

    fn rest_requests(&self, symbol: &Symbol) -> FeedResult<Vec<RestRequest>> {
        let product = self.wire_symbol(symbol)?;
        Ok(vec![
            RestRequest::get(format!("/products/{product}/ticker")),
            RestRequest::get(format!("/products/{product}/stats")),
        ])
    }

    fn normalize_rest(
        &self,
        bodies: &[serde_json::Value],
        ctx: &NormalizeContext,
    ) -> FeedResult<TickerData> {
        let body = bodies
            .first()
            .ok_or_else(|| FeedError::ParseError("empty Coinbase response".to_string()))?;
        let ticker: RestTicker = serde_json::from_value(body.clone())?;
        if let (None, Some(message)) = (&ticker.price, &ticker.message) {
            return Err(FeedError::Rejected(format!("Coinbase: {message}")));
        }

        let stats: RestStats = match bodies.get(1) {
            Some(v) => serde_json::from_value(v.clone())?,
            None => RestStats::default(),
        };

        let symbol = ctx.resolve_symbol(self, None)?;

        let mut last = num(&ticker.price);
        if last == Decimal::ZERO {
            last = num(&stats.last);
        }
        let mut volume = num(&ticker.volume);
        if volume == Decimal::ZERO {
            volume = num(&stats.volume);
        }

        let figures = TickerFigures {
            last,
            high: num(&stats.high),
            low: num(&stats.low),
            volume,
            open: num(&stats.open),
            bid: num(&ticker.bid),
            ask: num(&ticker.ask),
            ..Default::default()
        };
        let observed_at = from_rfc3339(ticker.time.as_deref()).unwrap_or(ctx.received_at);
        Ok(figures.into_ticker(self, symbol, observed_at))
    }

    fn subscribe_messages(&self, symbols: &[Symbol]) -> Vec<String> {
        let products: Vec<String> = symbols
            .iter()
            .filter_map(|s| self.stream_symbol(s).ok())
            .collect();
        chunked(&products, MAX_PRODUCTS_PER_MESSAGE, |_, chunk| {
            json!({
                "type": "subscribe",
                "product_ids": chunk,
                "channels": ["ticker", "heartbeat"]
            })
        })
    }

    fn normalize_stream(
        &self,
        message: &serde_json::Value,
        ctx: &NormalizeContext,
    ) -> FeedResult<Option<TickerData>> {
        let msg: StreamMessage = serde_json::from_value(message.clone())?;
        if msg.kind.as_deref() != Some("ticker") {
            debug!(kind = ?msg.kind, "Ignoring non-ticker Coinbase message");
            return Ok(None);
        }

        let symbol = ctx.resolve_symbol(self, msg.product_id.as_deref())?;
        let figures = TickerFigures {
            last: num(&msg.price),
            high: num(&msg.high_24h),
            low: num(&msg.low_24h),
            volume: num(&msg.volume_24h),
            open: num(&msg.open_24h),
            bid: num(&msg.best_bid),
            ask: num(&msg.best_ask),
            ..Default::default()
        };
        let observed_at = from_rfc3339(msg.time.as_deref()).unwrap_or(ctx.received_at);
        Ok(Some(figures.into_ticker(self, symbol, observed_at)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use rust_decimal_macros::dec;

    fn ctx() -> NormalizeContext {
        NormalizeContext::at(DateTime::from_timestamp_millis(1_700_000_000_000).unwrap())
    }

    fn sym(s: &str) -> Symbol {
        Symbol::canonical(s).unwrap()
    }

    fn bodies() -> Vec<serde_json::Value> {
        vec![
            serde_json::json!({
                "trade_id": 86326522,
                "price": "110.00",
                "size": "0.01",
                "time": "2024-03-01T12:00:00.000000Z",
                "bid": "99",
                "ask": "101",
                "volume": "8500.5"
            }),
            serde_json::json!({
                "open": "100.00",
                "high": "115.00",
                "low": "95.00",
                "last": "110.00",
                "volume": "8500.5",
                "volume_30day": "250000"
            }),
        ]
    }

    #[test]
    fn test_product_ids() {
        let p = CoinbaseProtocol;
        assert_eq!(p.wire_symbol(&sym("BTCUSD")).unwrap(), "BTC-USD");
        assert_eq!(p.wire_symbol(&sym("ETHUSDC")).unwrap(), "ETH-USDC");
        assert_eq!(p.canonicalize("BTC-USD").unwrap(), sym("BTCUSD"));
        assert!(p.canonicalize("BTCUSD").is_err());
        assert!(p.round_trips(&sym("SOLEUR")));
    }

    #[test]
    fn test_rest_combines_ticker_and_stats() {
        let ctx = ctx().with_symbol(sym("BTCUSD"));
        let t = CoinbaseProtocol.normalize_rest(&bodies(), &ctx).unwrap();
        assert_eq!(t.exchange_name, ExchangeId::Coinbase);
        assert_eq!(t.last_price, dec!(110));
        assert_eq!(t.high_price_24h, dec!(115));
        assert_eq!(t.price_change_percent_24h.to_string(), "10.0000");
        assert_eq!(t.weighted_avg_price, dec!(100));
        assert_eq!(t.observed_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_rest_requires_context_symbol() {
        let err = CoinbaseProtocol.normalize_rest(&bodies(), &ctx()).unwrap_err();
        assert!(matches!(err, FeedError::UnresolvableSymbol(_)));
    }

    #[test]
    fn test_rest_without_stats_or_book() {
        let ctx = ctx().with_symbol(sym("BTCUSD"));
        let mut b = bodies();
        b.truncate(1);
        b[0].as_object_mut().unwrap().remove("bid");
        let t = CoinbaseProtocol.normalize_rest(&b, &ctx).unwrap();
        assert_eq!(t.open_price, Decimal::ZERO);
        assert_eq!(t.price_change_percent_24h, Decimal::ZERO);
        assert_eq!(t.weighted_avg_price, t.last_price);
    }

    #[test]
    fn test_rest_not_found() {
        let ctx = ctx().with_symbol(sym("BTCUSD"));
        let body = serde_json::json!({"message": "NotFound"});
        let err = CoinbaseProtocol.normalize_rest(&[body], &ctx).unwrap_err();
        assert!(matches!(err, FeedError::Rejected(_)));
    }

    #[test]
    fn test_stream_ticker() {
        let msg = serde_json::json!({
            "type": "ticker",
            "sequence": 37475248783u64,
            "product_id": "ETH-USD",
            "price": "1285.22",
            "open_24h": "1310.79",
            "volume_24h": "245532.79269678",
            "low_24h": "1280.52",
            "high_24h": "1313.8",
            "best_bid": "1285.04",
            "best_ask": "1285.27",
            "side": "buy",
            "time": "2022-10-19T23:28:22.061769Z",
            "trade_id": 370843401
        });
        let a = CoinbaseProtocol.normalize_stream(&msg, &ctx()).unwrap().unwrap();
        let b = CoinbaseProtocol.normalize_stream(&msg, &ctx()).unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.symbol, sym("ETHUSD"));
        assert_eq!(a.weighted_avg_price, dec!(1285.155));
        assert_eq!(a.price_change_percent_24h, dec!(-1.9507));
    }

    #[test]
    fn test_stream_other_types_ignored() {
        let hb = serde_json::json!({"type": "heartbeat", "product_id": "BTC-USD", "sequence": 1});
        assert!(CoinbaseProtocol.normalize_stream(&hb, &ctx()).unwrap().is_none());
        let subs = serde_json::json!({"type": "subscriptions", "channels": []});
        assert!(CoinbaseProtocol.normalize_stream(&subs, &ctx()).unwrap().is_none());
    }

    #[test]
    fn test_stream_unresolvable_product() {
        let msg = serde_json::json!({"type": "ticker", "price": "1"});
        let err = CoinbaseProtocol.normalize_stream(&msg, &ctx()).unwrap_err();
        assert!(matches!(err, FeedError::UnresolvableSymbol(_)));
    }
}
