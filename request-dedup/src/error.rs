/// Reasons a request cannot be turned into a [`RequestKey`](crate::RequestKey).
///
/// These never reach callers of `execute`: an unkeyable request simply
/// bypasses the cache and deduplication.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Request URL is empty")]
    EmptyUrl,
    #[error("Request URL could not be parsed: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Request body could not be serialized: {0}")]
    UnserializableBody(String),
}

/// Errors raised by the crate's own fallible operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(#[from] figment::Error),
}
