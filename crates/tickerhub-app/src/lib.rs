//! tickerhub: multi-exchange ticker ingestion.
//!
//! Wires the exchange connectors, symbol catalog and fetch orchestrator
//! together and serves the query API until shutdown.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
