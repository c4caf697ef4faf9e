//! Per-exchange connector descriptor.

use crate::ExchangeId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default REST polling cadence.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Which data paths are enabled for an exchange.
///
/// Built once at startup from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorDescriptor {
    pub exchange_name: ExchangeId,
    pub rest_enabled: bool,
    pub stream_enabled: bool,
    pub poll_interval_secs: u64,
}

impl ConnectorDescriptor {
    /// Both paths enabled, default polling cadence.
    pub fn new(exchange_name: ExchangeId) -> Self {
        Self {
            exchange_name,
            rest_enabled: true,
            stream_enabled: true,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}
