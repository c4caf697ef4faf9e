//! Core domain types for tickerhub.
//!
//! This crate provides the exchange-agnostic vocabulary shared by every
//! other crate in the workspace:
//! - `ExchangeId`: Canonical identifier of a supported exchange
//! - `Symbol`: Canonical trading-pair symbol (uppercase, no separators)
//! - `TickerData`: Normalized 24h ticker snapshot
//! - `ConnectorDescriptor`: Per-exchange REST/stream enablement
//! - Decimal derivation helpers (percent change, mid price)

pub mod decimal;
pub mod descriptor;
pub mod error;
pub mod exchange;
pub mod symbol;
pub mod ticker;

pub use decimal::{derive_change_percent, derive_mid, fraction_to_percent, parse_or_zero};
pub use descriptor::ConnectorDescriptor;
pub use error::{CoreError, Result};
pub use exchange::ExchangeId;
pub use symbol::Symbol;
pub use ticker::TickerData;

use std::future::Future;
use std::pin::Pin;

/// Boxed future type for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
