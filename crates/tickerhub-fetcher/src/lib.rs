//! Fetch orchestration for tickerhub.
//!
//! - [`TickerCache`]: concurrent `(exchange, symbol)` → ticker store
//! - [`FetchOrchestrator`]: starts streams, polls REST only for connectors
//!   whose stream is not open, and answers read queries
//! - [`comparison`]: cross-exchange spread and arbitrage over cached tickers
//!
//! Every external read hides zero-volume entries.

pub mod cache;
pub mod comparison;
pub mod error;
pub mod orchestrator;
pub mod query;

pub use cache::TickerCache;
pub use comparison::{
    Arbitrage, ArbitrageOutcome, Comparison, ComparisonOutcome, PriceQuote,
};
pub use error::{FetchError, FetchResult};
pub use orchestrator::{FetchOrchestrator, OrchestratorConfig, PollReport};
pub use query::{ExchangeStatus, TickerQuery};
