//! Application configuration.

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tickerhub_api::ApiConfig;
use tickerhub_connector::{ConnectorSettings, ExchangeVariant};
use tickerhub_core::ExchangeId;
use tickerhub_fetcher::OrchestratorConfig;

/// Symbol catalog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Cache lifetime of a resolved catalog (seconds). Default: 5 hours.
    #[serde(default = "default_catalog_ttl_secs")]
    pub ttl_secs: u64,
    /// Liquidity floor on 24h quote volume for listing sources.
    #[serde(default = "default_min_quote_volume")]
    pub min_quote_volume: Decimal,
    /// Attempts per symbol source before the chain moves on.
    #[serde(default = "default_source_attempts")]
    pub source_attempts: u32,
    /// Pause between attempts (ms).
    #[serde(default = "default_source_retry_pause_ms")]
    pub source_retry_pause_ms: u64,
}

fn default_catalog_ttl_secs() -> u64 {
    5 * 60 * 60
}

fn default_min_quote_volume() -> Decimal {
    Decimal::ONE_THOUSAND
}

fn default_source_attempts() -> u32 {
    2
}

fn default_source_retry_pause_ms() -> u64 {
    500
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_catalog_ttl_secs(),
            min_quote_volume: default_min_quote_volume(),
            source_attempts: default_source_attempts(),
            source_retry_pause_ms: default_source_retry_pause_ms(),
        }
    }
}

/// Per-exchange overrides. Unset values fall back to the exchange's
/// built-in endpoints or to the global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub rest_enabled: bool,
    #[serde(default = "default_true")]
    pub stream_enabled: bool,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub rest_base_url: Option<String>,
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub max_stream_symbols: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rest_enabled: true,
            stream_enabled: true,
            poll_interval_secs: None,
            rest_base_url: None,
            ws_url: None,
            max_stream_symbols: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangesConfig {
    #[serde(default)]
    pub binance: ExchangeConfig,
    #[serde(default)]
    pub bybit: ExchangeConfig,
    #[serde(default)]
    pub kraken: ExchangeConfig,
    #[serde(default)]
    pub coinbase: ExchangeConfig,
}

impl ExchangesConfig {
    pub fn get(&self, exchange: ExchangeId) -> &ExchangeConfig {
        match exchange {
            ExchangeId::Binance => &self.binance,
            ExchangeId::Bybit => &self.bybit,
            ExchangeId::Kraken => &self.kraken,
            ExchangeId::Coinbase => &self.coinbase,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Poll timer period (seconds). Default: 10.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Initial state of the streaming toggle.
    #[serde(default = "default_true")]
    pub streaming_enabled: bool,
    /// Fixed delay between stream reconnect attempts (ms). Default: 5000.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Heartbeat interval override (ms). Unset uses the exchange's own.
    #[serde(default)]
    pub heartbeat_interval_ms: Option<u64>,
    /// Silence after a heartbeat before the stream is dropped (ms).
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// Per-request REST timeout (seconds).
    #[serde(default = "default_rest_timeout_secs")]
    pub rest_timeout_secs: u64,
    /// Concurrent REST requests per connector poll.
    #[serde(default = "default_rest_concurrency")]
    pub rest_concurrency: usize,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub exchanges: ExchangesConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_heartbeat_timeout_ms() -> u64 {
    10_000
}

fn default_rest_timeout_secs() -> u64 {
    10
}

fn default_rest_concurrency() -> usize {
    8
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            streaming_enabled: true,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            heartbeat_interval_ms: None,
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            rest_timeout_secs: default_rest_timeout_secs(),
            rest_concurrency: default_rest_concurrency(),
            catalog: CatalogConfig::default(),
            exchanges: ExchangesConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Exchanges with `enabled = true`, in canonical order.
    pub fn enabled_exchanges(&self) -> Vec<ExchangeId> {
        ExchangeId::ALL
            .into_iter()
            .filter(|ex| self.exchanges.get(*ex).enabled)
            .collect()
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            streaming_enabled: self.streaming_enabled,
        }
    }

    pub fn rest_timeout(&self) -> Duration {
        Duration::from_secs(self.rest_timeout_secs)
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog.ttl_secs)
    }

    pub fn source_retry_pause(&self) -> Duration {
        Duration::from_millis(self.catalog.source_retry_pause_ms)
    }

    /// Variant constants with this configuration applied.
    pub fn connector_settings(&self, variant: &ExchangeVariant) -> ConnectorSettings {
        let overrides = self.exchanges.get(variant.exchange);
        let mut settings = ConnectorSettings::from_variant(variant);

        settings.descriptor.rest_enabled = overrides.rest_enabled;
        settings.descriptor.stream_enabled = overrides.stream_enabled;
        settings.descriptor.poll_interval_secs =
            overrides.poll_interval_secs.unwrap_or(self.poll_interval_secs);

        if let Some(url) = &overrides.rest_base_url {
            settings.rest_base_url = url.clone();
        }
        if let Some(url) = &overrides.ws_url {
            settings.ws_url = url.clone();
        }
        if let Some(max) = overrides.max_stream_symbols {
            settings.max_stream_symbols = max;
        }
        if let Some(ms) = self.heartbeat_interval_ms {
            settings.heartbeat_interval = Duration::from_millis(ms);
        }

        settings.rest_concurrency = self.rest_concurrency.max(1);
        settings.reconnect_delay = Duration::from_millis(self.reconnect_delay_ms);
        settings.heartbeat_timeout = Duration::from_millis(self.heartbeat_timeout_ms);
        settings
    }
}
