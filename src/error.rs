//! Unified error type.

use http::StatusCode;

/// The error type returned by gatekit's fallible operations.
///
/// Every variant except [`Error::Io`] is a terminal request outcome: the
/// dispatcher renders it with [`Response::error`](crate::Response::error)
/// under the status returned by [`Error::status`]. `Io` surfaces local-host
/// infrastructure failures such as binding to a port.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed request, e.g. an undecodable signature header.
    #[error("{0}")]
    BadRequest(String),

    /// Unauthenticated request: stale timestamp or signature mismatch.
    #[error("{0}")]
    NotAcceptable(String),

    /// No matching route, or a missing resource.
    #[error("{0}")]
    NotFound(String),

    /// The handler chain produced no response.
    #[error("{0}")]
    NotImplemented(String),

    /// A recovered handler failure or an unexpected backend error.
    #[error("{0}")]
    Internal(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_acceptable(msg: impl Into<String>) -> Self {
        Self::NotAcceptable(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::NotImplemented(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status this error is rendered with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_)     => StatusCode::BAD_REQUEST,
            Self::NotAcceptable(_)  => StatusCode::NOT_ACCEPTABLE,
            Self::NotFound(_)       => StatusCode::NOT_FOUND,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Internal(_)       => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io(_)             => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
