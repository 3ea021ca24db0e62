use crate::errors::{SigningError, TransportError};

/// Result type used by [`HyperliquidClient`](super::HyperliquidClient).
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the high level client API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Symbol is absent from the most recently fetched metadata.
    #[error("unknown asset: {0}")]
    UnknownAsset(String),
    /// Privileged operation requested without a valid signing key.
    #[error("unauthenticated: no valid signing key was configured")]
    Authentication,
    /// The operation found nothing to act on.
    #[error("nothing to act on: {0}")]
    NoMatch(String),
    /// Network failure, propagated as received.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Hashing or signing failed even though a key is present.
    #[error("signing error: {0}")]
    Signing(#[from] SigningError),
    /// Request rejected locally before anything was sent.
    #[error("invalid order: {0}")]
    InvalidOrder(String),
    /// Configuration validation failure raised by a builder.
    #[error("invalid config: {field}: {why}")]
    InvalidConfig { field: &'static str, why: String },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True only for failures a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
