use thiserror::Error;

use crate::model::HttpMethod;

/// Errors returned by configuration accessors and `WeatherStation::query_api`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A value failed local validation. Raised before any I/O.
    #[error("Invalid value for '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// A required configuration field was read before being set.
    #[error("Configuration field '{0}' is not initialized")]
    NotInitialized(&'static str),

    #[error("Failed to initialize HTTP transport: {0}")]
    TransportSetup(String),

    /// The server answered with a 4xx or 5xx status.
    #[error(
        "The HTTP {method} request failed with status {status}. Following the complete error: {body}"
    )]
    Http {
        method: HttpMethod,
        status: u16,
        body: String,
    },

    /// The host could not be reached (DNS failure, refused connection, connect timeout).
    #[error("Unable to connect to the configured API {url}. Following the complete error: {source}")]
    Connection {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error(
        "The HTTP {method} request timed out. No data was retrieved for {timeout} seconds. \
         Following the complete error: {source}"
    )]
    Timeout {
        method: HttpMethod,
        timeout: f64,
        #[source]
        source: TransportError,
    },

    #[error("The HTTP {method} request failed. Following the complete error: {message}")]
    Request { method: HttpMethod, message: String },

    /// A response that is neither successful nor a client/server error.
    #[error("Last {method} request failed. Request returned with HTTP code {status}")]
    Runtime { method: HttpMethod, status: u16 },
}

impl ClientError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ClientError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

/// Failures reported by a `Transport` implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}
