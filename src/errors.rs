use thiserror::Error;

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Failures raised while moving a payload to or from the exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: status code {status}: {body}")]
    Http { status: u16, body: String },
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl TransportError {
    pub fn with_http_status(status: reqwest::StatusCode, body: &str) -> Self {
        let body = if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_string()
        } else {
            body.to_string()
        };

        TransportError::Http {
            status: status.as_u16(),
            body,
        }
    }
}

/// Failures raised while hashing or signing an action.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("msgpack encoding failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("action is missing typed field `{0}`")]
    MissingField(&'static str),
    #[error("typed field `{field}` is malformed: {why}")]
    MalformedField { field: &'static str, why: String },
    #[error("action `{0}` is not user-signed")]
    NotUserSigned(&'static str),
    #[error(transparent)]
    Signer(#[from] alloy_signer::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
