//! Error types for the HTTP wire codec.

use http::StatusCode;
use std::io;
use thiserror::Error;

/// Errors that can occur while reading an HTTP/1.x message.
#[derive(Debug, Error)]
pub enum HttpError {
    /// IO error on the underlying transport.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Peer closed the connection before sending anything.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Peer closed the connection in the middle of a message.
    #[error("Incomplete message: {0}")]
    Incomplete(&'static str),

    /// Message head could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request method is not a valid token.
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// Message head exceeded the configured limit.
    #[error("Header section too large (max: {max} bytes)")]
    HeadTooLarge {
        /// Maximum allowed.
        max: usize,
    },

    /// More header lines than the parser accepts.
    #[error("Too many headers (max: {max})")]
    TooManyHeaders {
        /// Maximum allowed.
        max: usize,
    },

    /// Body exceeded the configured limit.
    #[error("Body too large (max: {max} bytes)")]
    BodyTooLarge {
        /// Maximum allowed.
        max: usize,
    },

    /// Content-Length missing a number or conflicting with another one.
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    /// Chunked framing violated.
    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),
}

impl HttpError {
    /// Status to answer a downstream client with, if the failure is worth
    /// answering at all. `None` means the connection is closed silently.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Io(_) | HttpError::ConnectionClosed => None,
            HttpError::HeadTooLarge { .. } | HttpError::TooManyHeaders { .. } => {
                Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
            }
            HttpError::BodyTooLarge { .. } => Some(StatusCode::PAYLOAD_TOO_LARGE),
            HttpError::Incomplete(_)
            | HttpError::Parse(_)
            | HttpError::InvalidMethod(_)
            | HttpError::InvalidContentLength(_)
            | HttpError::InvalidChunk(_) => Some(StatusCode::BAD_REQUEST),
        }
    }
}

impl From<httparse::Error> for HttpError {
    fn from(err: httparse::Error) -> Self {
        HttpError::Parse(err.to_string())
    }
}

/// Result type for codec operations.
pub type HttpResult<T> = Result<T, HttpError>;
