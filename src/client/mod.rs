pub mod mirror;
pub mod retry;
pub mod service;

pub use mirror::{MirrorState, INVALID_STATE};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use service::{HttpTransport, RelayClient, Transport};

/// A single failed attempt. Never escapes [`RelayClient::call`].
#[derive(Debug, thiserror::Error)]
pub enum NetworkFailure {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for NetworkFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NetworkFailure::Timeout
        } else if let Some(status) = e.status() {
            NetworkFailure::Status(status.as_u16())
        } else {
            NetworkFailure::Connection(e.to_string())
        }
    }
}
