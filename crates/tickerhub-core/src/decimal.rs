//! Decimal helpers shared by every wire normalizer.
//!
//! All prices, volumes and percentages stay in `rust_decimal::Decimal`
//! from the wire to the API. Exchanges disagree on which figures they
//! report, so the derivations live here and are applied uniformly.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Decimal places kept on derived percentages.
pub const PERCENT_SCALE: u32 = 4;

/// Parse an optional wire string, treating missing or malformed values as zero.
///
/// Accepts plain (`"0.0123"`) and scientific (`"1.5e-7"`) notation.
pub fn parse_or_zero(raw: Option<&str>) -> Decimal {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Decimal::ZERO;
    };
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .unwrap_or(Decimal::ZERO)
}

/// Clamp a quantity that can never be negative (price, volume).
#[inline]
pub fn non_negative(value: Decimal) -> Decimal {
    if value.is_sign_negative() {
        Decimal::ZERO
    } else {
        value
    }
}

/// Convert a fractional change (`0.0123`) into percent units (`1.23`).
#[inline]
pub fn fraction_to_percent(fraction: Decimal) -> Decimal {
    fraction * Decimal::ONE_HUNDRED
}

/// Derive the 24h percent change from last and open prices.
///
/// `(last - open) / open * 100`, rounded half-up to four decimal places.
/// Returns zero when `open` is not positive.
pub fn derive_change_percent(last: Decimal, open: Decimal) -> Decimal {
    if open <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let mut pct = ((last - open) / open * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(PERCENT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    pct.rescale(PERCENT_SCALE);
    pct
}

/// Mid price from the best bid and ask, falling back to `last`.
pub fn derive_mid(bid: Decimal, ask: Decimal, last: Decimal) -> Decimal {
    if bid > Decimal::ZERO && ask > Decimal::ZERO {
        (bid + ask) / Decimal::TWO
    } else {
        last
    }
}
