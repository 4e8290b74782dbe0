/// Failure of a single remote fetch attempt. The variants mirror the
/// distinguishable failure classes of the upstream API so callers can decide
/// between retry, fallback and hard failure.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("access denied: {0}")]
    Forbidden(String),
    #[error("request limit reached: {0}")]
    TooManyRequests(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// A refresh that could not produce any usable snapshot. Transient failures
/// never surface here as long as a cached snapshot exists to fall back on.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("dataset {key} unavailable: {reason}")]
    Unavailable { key: String, reason: String },
}
