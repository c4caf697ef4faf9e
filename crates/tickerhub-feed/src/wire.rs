//! Wire-level helpers shared by the exchange schemas.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tickerhub_core::parse_or_zero;

/// A numeric field that venues send as a string, an integer or a float.
///
/// Anything else (bool, object) is kept so the surrounding record still
/// decodes; it reads as zero.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireNumber {
    Text(String),
    Int(i64),
    Float(f64),
    Other(serde_json::Value),
}

impl WireNumber {
    pub(crate) fn to_decimal(&self) -> Decimal {
        match self {
            WireNumber::Text(s) => parse_or_zero(Some(s)),
            WireNumber::Int(i) => Decimal::from(*i),
            WireNumber::Float(f) => Decimal::from_f64(*f).unwrap_or(Decimal::ZERO),
            WireNumber::Other(_) => Decimal::ZERO,
        }
    }

    pub(crate) fn to_u64(&self) -> u64 {
        match self {
            WireNumber::Int(i) => u64::try_from(*i).unwrap_or(0),
            WireNumber::Text(s) => s.trim().parse().unwrap_or(0),
            WireNumber::Float(f) if *f >= 0.0 => *f as u64,
            _ => 0,
        }
    }
}

/// Decimal value of an optional field, zero when absent.
pub(crate) fn num(field: &Option<WireNumber>) -> Decimal {
    field.as_ref().map_or(Decimal::ZERO, WireNumber::to_decimal)
}

/// Element `idx` of a positional array field, zero when absent.
pub(crate) fn num_at(field: &Option<Vec<WireNumber>>, idx: usize) -> Decimal {
    field
        .as_ref()
        .and_then(|v| v.get(idx))
        .map_or(Decimal::ZERO, WireNumber::to_decimal)
}

pub(crate) fn count(field: &Option<WireNumber>) -> u64 {
    field.as_ref().map_or(0, WireNumber::to_u64)
}

pub(crate) fn from_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.filter(|ms| *ms > 0)
        .and_then(DateTime::from_timestamp_millis)
}

pub(crate) fn from_rfc3339(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
