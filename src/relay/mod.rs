pub mod request;
pub mod routes;
pub mod server;

pub use request::{CommanderQuery, MirrorQuery, TailQuery};
pub use routes::{SharedChannel, OUTCOME_HEADER, WELCOME};
pub use server::Relay;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::config::ConfigError;
use crate::logtail::LogTailError;
use crate::serial::SerialError;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Serial communication error: {0}")]
    Serial(SerialError),

    #[error("Log read error: {0}")]
    LogRead(LogTailError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SerialError> for RelayError {
    fn from(e: SerialError) -> Self {
        match e {
            SerialError::DeviceUnavailable(msg) => RelayError::DeviceUnavailable(msg),
            other => RelayError::Serial(other),
        }
    }
}

impl From<LogTailError> for RelayError {
    fn from(e: LogTailError) -> Self {
        match e {
            LogTailError::InvalidParameter(msg) => RelayError::InvalidParameter(msg),
            other => RelayError::LogRead(other),
        }
    }
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::BadRequest(_) | RelayError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            RelayError::DeviceUnavailable(_) | RelayError::Serial(SerialError::Closed) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::debug!("Rejected request: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}
