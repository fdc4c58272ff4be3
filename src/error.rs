use std::fmt;

use reqwest::header::HeaderMap;

/// Error type returned by the bundled `reqwest` client integration.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with response headers and raw body.
    #[error("http error {status}: {body}")]
    Http {
        status: u16,
        /// Response headers; lookups are case-insensitive.
        headers: HeaderMap,
        body: String,
    },
    /// Response body could not be decoded into the requested type.
    #[error("decode error: {0}")]
    Decode(String),
    /// The request descriptor could not be turned into a request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Plain-data failure record.
///
/// Useful for clients that do not go through `reqwest` and for tests: it
/// carries the same optional status, headers and transport code/message that
/// the classifier looks at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FailureInfo {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub code: Option<String>,
    pub message: Option<String>,
}

impl FailureInfo {
    /// A failure where the server answered with `status`.
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// A failure where no response arrived, described by a transport code
    /// (e.g. `ECONNRESET`) and message.
    pub fn transport(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// A failure with only a message, such as an application error.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl fmt::Display for FailureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.code, &self.message) {
            (Some(status), _, Some(message)) => write!(f, "status {status}: {message}"),
            (Some(status), _, None) => write!(f, "status {status}"),
            (None, Some(code), Some(message)) => write!(f, "{code}: {message}"),
            (None, Some(code), None) => f.write_str(code),
            (None, None, Some(message)) => f.write_str(message),
            (None, None, None) => f.write_str("request failed"),
        }
    }
}

impl std::error::Error for FailureInfo {}
