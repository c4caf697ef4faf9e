//! Connector error types.

use thiserror::Error;
use tickerhub_core::ExchangeId;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Normalization failed: {0}")]
    Feed(#[from] tickerhub_feed::FeedError),

    #[error("Stream error: {0}")]
    Stream(#[from] tickerhub_ws::WsError),

    #[error("Streaming disabled for {0}")]
    StreamDisabled(ExchangeId),
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;
