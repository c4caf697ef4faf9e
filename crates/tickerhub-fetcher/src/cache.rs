//! Shared ticker cache.
//!
//! Written by every stream callback and the poll loop; only single-key
//! `put`/`get` operations, so no further locking is needed.

use dashmap::DashMap;
use tickerhub_core::{ExchangeId, Symbol, TickerData};
use tickerhub_telemetry::Metrics;

#[derive(Debug, Default)]
pub struct TickerCache {
    entries: DashMap<(ExchangeId, Symbol), TickerData>,
}

impl TickerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Last write wins.
    pub fn put(&self, ticker: TickerData) {
        self.entries.insert(ticker.key(), ticker);
        Metrics::cache_size(self.entries.len());
    }

    pub fn get(&self, exchange: ExchangeId, symbol: &Symbol) -> Option<TickerData> {
        self.entries
            .get(&(exchange, symbol.clone()))
            .map(|entry| entry.value().clone())
    }

    /// Every entry, including zero-volume ones.
    pub fn snapshot(&self) -> Vec<TickerData> {
        self.entries.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Entries with strictly positive volume.
    pub fn live_snapshot(&self) -> Vec<TickerData> {
        self.entries
            .iter()
            .filter(|entry| entry.value().has_volume())
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Live entries for one exchange.
    pub fn live_count(&self, exchange: ExchangeId) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.key().0 == exchange && entry.value().has_volume())
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn ticker(exchange: ExchangeId, symbol: &str, volume: rust_decimal::Decimal) -> TickerData {
        let mut t = TickerData::new(exchange, Symbol::canonical(symbol).unwrap(), Utc::now());
        t.last_price = dec!(100);
        t.volume_24h = volume;
        t
    }

    #[test]
    fn test_put_overwrites_same_key() {
        let cache = TickerCache::new();
        cache.put(ticker(ExchangeId::Binance, "BTCUSDT", dec!(1)));
        let mut newer = ticker(ExchangeId::Binance, "BTCUSDT", dec!(2));
        newer.last_price = dec!(101);
        cache.put(newer);

        assert_eq!(cache.len(), 1);
        let symbol = Symbol::canonical("BTCUSDT").unwrap();
        let got = cache.get(ExchangeId::Binance, &symbol).unwrap();
        assert_eq!(got.last_price, dec!(101));
    }

    #[test]
    fn test_zero_volume_hidden_but_retained() {
        let cache = TickerCache::new();
        cache.put(ticker(ExchangeId::Binance, "BTCUSDT", dec!(0)));
        cache.put(ticker(ExchangeId::Bybit, "BTCUSDT", dec!(5)));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.snapshot().len(), 2);
        let live = cache.live_snapshot();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].exchange_name, ExchangeId::Bybit);
        assert_eq!(cache.live_count(ExchangeId::Binance), 0);
        assert_eq!(cache.live_count(ExchangeId::Bybit), 1);
    }
}
