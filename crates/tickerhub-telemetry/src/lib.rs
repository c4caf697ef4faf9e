//! Prometheus metrics and structured logging for tickerhub.
//!
//! - Prometheus metrics for stream health, polling and ingestion
//! - Structured logging with tracing (pretty or JSON)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
