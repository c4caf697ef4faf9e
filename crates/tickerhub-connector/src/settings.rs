//! Runtime settings for one connector.

use crate::variant::ExchangeVariant;
use std::time::Duration;
use tickerhub_core::ConnectorDescriptor;

/// Effective connector settings: variant constants with configuration applied.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    pub descriptor: ConnectorDescriptor,
    pub rest_base_url: String,
    pub ws_url: String,
    /// Cap on the tracked symbol set (stream subscriptions and REST polling).
    pub max_stream_symbols: usize,
    /// Concurrent REST requests during `fetch_all`.
    pub rest_concurrency: usize,
    pub reconnect_delay: Duration,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
}

impl ConnectorSettings {
    pub fn from_variant(variant: &ExchangeVariant) -> Self {
        Self {
            descriptor: ConnectorDescriptor::new(variant.exchange),
            rest_base_url: variant.rest_base_url.to_string(),
            ws_url: variant.ws_url.to_string(),
            max_stream_symbols: variant.max_stream_symbols,
            rest_concurrency: 8,
            reconnect_delay: Duration::from_secs(5),
            heartbeat_interval: variant.heartbeat_interval,
            heartbeat_timeout: Duration::from_secs(10),
        }
    }
}
