//! HTTP query API for tickerhub.
//!
//! Serves the cached tickers, exchange status, cross-exchange
//! comparison and the Prometheus scrape endpoint.

pub mod config;
pub mod error;
pub mod server;
pub mod types;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use server::{create_router, run_server, AppState};
