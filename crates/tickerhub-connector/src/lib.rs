//! Exchange connectors for tickerhub.
//!
//! One [`ExchangeConnector`] trait, one data-driven [`ExchangeVariant`] per
//! exchange, and shared drivers written once against the feed crate's
//! `WireProtocol`:
//!
//! - [`RestClient`]: request/normalize cycle for a single symbol
//! - [`TickerStreamSession`]: subscription frames and stream normalization
//! - [`LiveConnector`]: REST side plus a `ConnectionManager`-driven stream
//!
//! Transient failures never cross the connector boundary; a failed fetch
//! is "no data" for that symbol.

pub mod connector;
pub mod error;
pub mod rest;
pub mod settings;
pub mod stream;
pub mod variant;

pub use connector::{ExchangeConnector, LiveConnector, TickerSink};
pub use error::{ConnectorError, ConnectorResult};
pub use rest::RestClient;
pub use settings::ConnectorSettings;
pub use stream::TickerStreamSession;
pub use variant::{catalog_spec, variant_for, ExchangeVariant, SourceEndpoint};
