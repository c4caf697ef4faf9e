//! Cross-exchange price comparison.
//!
//! Pure functions over a set of tickers for one symbol; the caller
//! supplies the (positive-volume) snapshot.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::HashSet;
use tickerhub_core::{ExchangeId, Symbol, TickerData};

const SPREAD_PERCENT_SCALE: u32 = 4;

/// One exchange's price for the compared symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub exchange: ExchangeId,
    pub price: Decimal,
    pub change_24h: Decimal,
    pub volume: Decimal,
}

impl From<&TickerData> for PriceQuote {
    fn from(t: &TickerData) -> Self {
        Self {
            exchange: t.exchange_name,
            price: t.last_price,
            change_24h: t.price_change_percent_24h,
            volume: t.volume_24h,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub symbol: Symbol,
    pub generated_at: DateTime<Utc>,
    pub lowest: PriceQuote,
    pub highest: PriceQuote,
    pub spread: Decimal,
    pub spread_percent: Decimal,
    /// Every quote, ascending by price.
    pub prices: Vec<PriceQuote>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    Available(Comparison),
    NoData { symbol: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Arbitrage {
    pub symbol: Symbol,
    pub generated_at: DateTime<Utc>,
    pub buy_from: PriceQuote,
    pub sell_to: PriceQuote,
    pub spread: Decimal,
    pub spread_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArbitrageOutcome {
    Opportunity(Arbitrage),
    InsufficientData { symbol: String, available: usize },
}

/// `(high - low) / low * 100` at four decimal places, 0 when `low` is 0.
fn spread_percent(low: Decimal, high: Decimal) -> Decimal {
    if low <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let mut pct = ((high - low) / low * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(SPREAD_PERCENT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    pct.rescale(SPREAD_PERCENT_SCALE);
    pct
}

fn sorted_quotes(symbol: &Symbol, tickers: &[TickerData]) -> Vec<PriceQuote> {
    let mut quotes: Vec<PriceQuote> = tickers
        .iter()
        .filter(|t| &t.symbol == symbol)
        .map(PriceQuote::from)
        .collect();
    quotes.sort_by(|a, b| a.price.cmp(&b.price).then(a.exchange.cmp(&b.exchange)));
    quotes
}

/// Lowest, highest and spread across every exchange quoting `symbol`.
pub fn compare(symbol: &Symbol, tickers: &[TickerData]) -> ComparisonOutcome {
    let prices = sorted_quotes(symbol, tickers);

    let (Some(lowest), Some(highest)) = (prices.first().cloned(), prices.last().cloned()) else {
        return ComparisonOutcome::NoData {
            symbol: symbol.to_string(),
        };
    };

    ComparisonOutcome::Available(Comparison {
        symbol: symbol.clone(),
        generated_at: Utc::now(),
        spread: highest.price - lowest.price,
        spread_percent: spread_percent(lowest.price, highest.price),
        lowest,
        highest,
        prices,
    })
}

/// Buy on the cheapest exchange, sell on the dearest. Needs two exchanges.
pub fn arbitrage(symbol: &Symbol, tickers: &[TickerData]) -> ArbitrageOutcome {
    let quotes = sorted_quotes(symbol, tickers);
    let exchanges: HashSet<ExchangeId> = quotes.iter().map(|q| q.exchange).collect();

    match (quotes.first(), quotes.last()) {
        (Some(buy), Some(sell)) if exchanges.len() >= 2 => {
            ArbitrageOutcome::Opportunity(Arbitrage {
                symbol: symbol.clone(),
                generated_at: Utc::now(),
                spread: sell.price - buy.price,
                spread_percent: spread_percent(buy.price, sell.price),
                buy_from: buy.clone(),
                sell_to: sell.clone(),
            })
        }
        _ => ArbitrageOutcome::InsufficientData {
            symbol: symbol.to_string(),
            available: exchanges.len(),
        },
    }
}
