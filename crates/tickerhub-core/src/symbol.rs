//! Canonical trading-pair symbols.
//!
//! Every exchange spells pairs differently (`BTC-USD`, `XBT/USD`,
//! `BTCUSDT`). Normalizers convert once at the wire boundary; past that
//! point only `Symbol` is used.

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical symbol: base followed by quote, uppercase, no separators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Canonicalize a raw pair, dropping separators and uppercasing.
    ///
    /// Fails when nothing alphanumeric remains.
    pub fn canonical(raw: &str) -> Result<Self> {
        let s: String = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if s.is_empty() {
            return Err(CoreError::InvalidSymbol(raw.to_string()));
        }
        Ok(Self(s))
    }

    /// Build from separate base and quote assets.
    pub fn from_parts(base: &str, quote: &str) -> Result<Self> {
        if base.trim().is_empty() || quote.trim().is_empty() {
            return Err(CoreError::InvalidSymbol(format!("{base}/{quote}")));
        }
        Self::canonical(&format!("{base}{quote}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(base, quote)` using the longest matching quote suffix.
    ///
    /// The base must be non-empty; returns `None` when no quote matches.
    pub fn split_quote<'a>(&'a self, quotes: &[&str]) -> Option<(&'a str, &'a str)> {
        quotes
            .iter()
            .filter(|q| self.0.len() > q.len() && self.0.ends_with(**q))
            .max_by_key(|q| q.len())
            .map(|q| self.0.split_at(self.0.len() - q.len()))
    }

    /// Substring match against a user-supplied filter (`btc`, `BTC/USDT`).
    pub fn matches_filter(&self, filter: &str) -> bool {
        match Symbol::canonical(filter) {
            Ok(f) => self.0.contains(&f.0),
            Err(_) => true,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Symbol::canonical(&value)
    }
}

impl From<Symbol> for String {
    fn from(s: Symbol) -> Self {
        s.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
