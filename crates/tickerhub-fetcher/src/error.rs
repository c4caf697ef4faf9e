//! Fetcher error types.

use thiserror::Error;
use tickerhub_core::ExchangeId;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No connector registered for {0}")]
    UnknownExchange(ExchangeId),
}

pub type FetchResult<T> = Result<T, FetchError>;
