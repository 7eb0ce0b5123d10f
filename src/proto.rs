use self::response::Response;

pub mod block;
pub mod codec;
pub mod command;
pub mod response;

#[cfg(test)]
pub mod fake;

use thiserror::Error;

use crate::waveform::ValidationError;

#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("I/O error: {:?}", _0)]
    Io(#[from] std::io::Error),

    #[error("Unable to connect to {resource}: {source}")]
    Connection {
        resource: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid resource address: {0}")]
    InvalidResource(String),
    #[error("Unsupported resource: {0}")]
    Unsupported(String),
    #[error("Session is closed")]
    Closed,
    #[error("Timed out waiting for the instrument")]
    Timeout,

    #[error("Invalid waveform: {0}")]
    Validation(#[from] ValidationError),

    #[error("Device reported error {code}: {message}")]
    Device { code: i32, message: String },
    #[error("Invalid units: {0}")]
    InvalidUnits(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Unexpected response: {:?}", _0)]
    Unexpected(Response),
}

impl ProtoError {
    /// True for errors meaning the instrument is unreachable or the
    /// session can no longer be used.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Unsupported(_) | Self::Closed
        )
    }
}

impl From<Response> for ProtoError {
    fn from(value: Response) -> Self {
        Self::Unexpected(value)
    }
}

pub type Result<T> = std::result::Result<T, ProtoError>;
