//! Feed error types.

use thiserror::Error;

/// Normalization failure.
///
/// Any of these drops the single payload; the caller keeps going.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unresolvable symbol: {0}")]
    UnresolvableSymbol(String),

    #[error("Exchange rejected request: {0}")]
    Rejected(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type FeedResult<T> = Result<T, FeedError>;
