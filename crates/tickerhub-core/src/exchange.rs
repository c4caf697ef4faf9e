//! Exchange identification.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported exchange.
///
/// Serialized as the canonical uppercase name used in cache keys and
/// API responses (e.g. `"BINANCE"`, `"COINBASE_EXCHANGE"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExchangeId {
    #[serde(rename = "BINANCE", alias = "binance")]
    Binance,
    #[serde(rename = "BYBIT", alias = "bybit")]
    Bybit,
    #[serde(rename = "KRAKEN", alias = "kraken")]
    Kraken,
    #[serde(rename = "COINBASE_EXCHANGE", alias = "coinbase", alias = "COINBASE")]
    Coinbase,
}

impl ExchangeId {
    /// Every supported exchange, in display order.
    pub const ALL: [ExchangeId; 4] = [
        ExchangeId::Binance,
        ExchangeId::Bybit,
        ExchangeId::Kraken,
        ExchangeId::Coinbase,
    ];

    /// Canonical uppercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "BINANCE",
            ExchangeId::Bybit => "BYBIT",
            ExchangeId::Kraken => "KRAKEN",
            ExchangeId::Coinbase => "COINBASE_EXCHANGE",
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = CoreError;

    /// Case-insensitive; `COINBASE` is accepted as shorthand.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BINANCE" => Ok(ExchangeId::Binance),
            "BYBIT" => Ok(ExchangeId::Bybit),
            "KRAKEN" => Ok(ExchangeId::Kraken),
            "COINBASE" | "COINBASE_EXCHANGE" => Ok(ExchangeId::Coinbase),
            _ => Err(CoreError::UnknownExchange(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!("binance".parse::<ExchangeId>().unwrap(), ExchangeId::Binance);
        assert_eq!("Coinbase".parse::<ExchangeId>().unwrap(), ExchangeId::Coinbase);
        assert_eq!(ExchangeId::Coinbase.to_string(), "COINBASE_EXCHANGE");
        assert!("ftx".parse::<ExchangeId>().is_err());
    }

    #[test]
    fn test_serde_name() {
        let json = serde_json::to_string(&ExchangeId::Kraken).unwrap();
        assert_eq!(json, "\"KRAKEN\"");
        let back: ExchangeId = serde_json::from_str("\"coinbase\"").unwrap();
        assert_eq!(back, ExchangeId::Coinbase);
    }
}
