//! Failure classification: transient vs. terminal.

use std::fmt;

use crate::{FailureInfo, HttpError};

/// Transport error codes treated as evidence of a network-level failure.
const TRANSPORT_CODES: &[(&str, TransportFailure)] = &[
    ("ERR_NETWORK", TransportFailure::Network),
    ("ECONNREFUSED", TransportFailure::Network),
    ("ECONNRESET", TransportFailure::ConnectionReset),
    ("ECONNABORTED", TransportFailure::ConnectionAborted),
    ("ETIMEDOUT", TransportFailure::TimedOut),
];

/// Low-level transport symptom recognized as retryable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportFailure {
    Network,
    ConnectionReset,
    ConnectionAborted,
    TimedOut,
}

impl TransportFailure {
    /// Matches a transport error code or message against the known symptoms.
    ///
    /// Anything not on the list yields `None`: an unknown failure without a
    /// response is not assumed to be a network problem.
    pub fn recognize(code: Option<&str>, message: Option<&str>) -> Option<Self> {
        if let Some(code) = code {
            let found = TRANSPORT_CODES
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(code.trim()))
                .map(|(_, kind)| *kind);
            if found.is_some() {
                return found;
            }
        }

        let message = message?.to_ascii_lowercase();
        if message.contains("network error") {
            Some(Self::Network)
        } else if message.contains("timeout") {
            Some(Self::TimedOut)
        } else {
            None
        }
    }
}

/// Shape of a failed request as seen by the classifier and backoff code.
///
/// Every method has a default, so application errors can opt in with an
/// empty `impl` and are then never retried.
pub trait RequestFailure: fmt::Display {
    /// Status of the response, if one was received.
    fn status(&self) -> Option<u16> {
        None
    }

    /// Response header value. Lookup is case-insensitive.
    fn header(&self, _name: &str) -> Option<&str> {
        None
    }

    /// Transport-level error code, e.g. `ECONNRESET`.
    fn code(&self) -> Option<&str> {
        None
    }

    fn message(&self) -> Option<&str> {
        None
    }

    fn transport_failure(&self) -> Option<TransportFailure> {
        TransportFailure::recognize(self.code(), self.message())
    }

    fn retry_after_header(&self) -> Option<&str> {
        self.header("retry-after")
    }
}

/// Outcome of classifying a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    TransientNetwork(TransportFailure),
    TransientServer,
    RateLimited,
    TerminalClient,
    TerminalOther,
}

impl FailureClass {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::TransientNetwork(_) | Self::TransientServer | Self::RateLimited
        )
    }
}

/// Classifies a failure. First match wins:
/// no response with a recognized transport symptom, then 5xx, then 429.
pub fn classify<E: RequestFailure + ?Sized>(error: &E) -> FailureClass {
    match error.status() {
        None => match error.transport_failure() {
            Some(kind) => FailureClass::TransientNetwork(kind),
            None => FailureClass::TerminalOther,
        },
        Some(500..=599) => FailureClass::TransientServer,
        Some(429) => FailureClass::RateLimited,
        Some(400..=499) => FailureClass::TerminalClient,
        Some(_) => FailureClass::TerminalOther,
    }
}

/// Default retry condition.
pub fn is_retryable<E: RequestFailure + ?Sized>(error: &E) -> bool {
    classify(error).is_retryable()
}

pub(crate) fn is_rate_limited<E: RequestFailure + ?Sized>(error: &E) -> bool {
    error.status() == Some(429)
}

impl RequestFailure for FailureInfo {
    fn status(&self) -> Option<u16> {
        self.status
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl RequestFailure for reqwest::Error {
    fn status(&self) -> Option<u16> {
        reqwest::Error::status(self).map(|status| status.as_u16())
    }

    fn transport_failure(&self) -> Option<TransportFailure> {
        if self.is_timeout() {
            return Some(TransportFailure::TimedOut);
        }
        // is_connect() is not available on wasm32 targets (no TCP)
        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return Some(TransportFailure::Network);
        }
        if self.is_request() || self.is_body() {
            return Some(TransportFailure::ConnectionAborted);
        }
        None
    }
}

impl RequestFailure for HttpError {
    fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(err) => RequestFailure::status(err),
            Self::Decode(_) | Self::InvalidRequest(_) => None,
        }
    }

    fn header(&self, name: &str) -> Option<&str> {
        match self {
            Self::Http { headers, .. } => headers.get(name).and_then(|value| value.to_str().ok()),
            _ => None,
        }
    }

    fn transport_failure(&self) -> Option<TransportFailure> {
        match self {
            Self::Transport(err) => err.transport_failure(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, is_retryable, FailureClass, TransportFailure};
    use crate::{FailureInfo, HttpError};
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn server_errors_are_retryable() {
        for status in 500..=599 {
            assert!(is_retryable(&FailureInfo::status(status)), "status {status}");
        }
    }

    #[test]
    fn client_errors_other_than_429_are_terminal() {
        for status in (400..=428).chain(430..=499) {
            assert!(!is_retryable(&FailureInfo::status(status)), "status {status}");
        }
        assert!(is_retryable(&FailureInfo::status(429)));
    }

    #[test]
    fn success_status_is_terminal() {
        assert_eq!(classify(&FailureInfo::status(200)), FailureClass::TerminalOther);
        assert!(!is_retryable(&FailureInfo::status(304)));
    }

    #[test]
    fn recognized_transport_codes_are_retryable() {
        let err = FailureInfo::transport("ECONNRESET", "socket hang up");
        assert_eq!(
            classify(&err),
            FailureClass::TransientNetwork(TransportFailure::ConnectionReset)
        );
        assert!(is_retryable(&FailureInfo::transport("econnaborted", "aborted")));
        assert!(is_retryable(&FailureInfo::message("Network Error")));
        assert!(is_retryable(&FailureInfo::message("timeout of 10000ms exceeded")));
    }

    #[test]
    fn unrecognized_failure_without_response_is_terminal() {
        let bug = FailureInfo::message("cannot read property 'id' of undefined");
        assert_eq!(classify(&bug), FailureClass::TerminalOther);
        assert!(!is_retryable(&FailureInfo::transport("EINVAL", "bad argument")));
        assert!(!is_retryable(&FailureInfo::default()));
    }

    #[test]
    fn status_wins_over_transport_symptoms() {
        let mut err = FailureInfo::transport("ECONNRESET", "Network Error");
        err.status = Some(404);
        assert!(!is_retryable(&err));
    }

    #[test]
    fn classification_is_stable() {
        let err = FailureInfo::status(502);
        assert_eq!(is_retryable(&err), is_retryable(&err));
    }

    #[test]
    fn http_error_exposes_status_and_headers() {
        use super::RequestFailure;

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("5"));
        let err = HttpError::Http {
            status: 429,
            headers,
            body: String::new(),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.header("Retry-After"), Some("5"));
        assert_eq!(err.retry_after_header(), Some("5"));
        assert!(is_retryable(&err));
        assert!(!is_retryable(&HttpError::Decode("bad json".to_owned())));
    }

    #[test]
    fn failure_info_headers_are_case_insensitive() {
        use super::RequestFailure;

        let err = FailureInfo::status(429).with_header("Retry-After", "7");
        assert_eq!(err.retry_after_header(), Some("7"));
    }
}
