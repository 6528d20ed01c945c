//! Error types for the Data API client.
//!
//! # Design
//! `Api` carries the server's message code and text verbatim because callers
//! branch on the code (e.g. `952` for an expired token). Everything the
//! client detects on its own side lands in one of the other variants. The
//! "no records match" answer to a find request is not an error at all; the
//! dispatcher turns it into an empty found set.

use thiserror::Error;

/// Errors returned by the request builders, the dispatcher and the facade.
#[derive(Debug, Error)]
pub enum DataApiError {
    /// Missing credentials, token, base URL or another construction option.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request could not be assembled (bad URL, field data that does
    /// not re-encode into a JSON object).
    #[error("failed to build request: {0}")]
    RequestBuild(String),

    /// The server answered with an error envelope.
    #[error("[ {code}, {message} ]")]
    Api { code: String, message: String },

    /// An expected header was absent from a raw response.
    #[error("header not found: {0}")]
    HeaderMissing(String),

    /// The HTTP round-trip itself failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be read as a Data API envelope.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl DataApiError {
    /// Server message code for `Api` errors.
    pub fn code(&self) -> Option<&str> {
        match self {
            DataApiError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DataApiError>;
