//! `http-retry` decides whether, when and how long to wait before re-attempting
//! a failed HTTP request.
//!
//! Entry points:
//! - [`retry`] runs an async operation under a [`RetryOptions`] budget
//! - [`with_retry`] turns an async function into a retrying one
//! - [`RetryingClient`] retries every request sent through an [`HttpClient`]
//! - [`QUERY_RETRY_CONFIG`] / [`MUTATION_RETRY_CONFIG`] plug into frameworks
//!   that run their own retry loop
//!
//! Failures are classified by [`is_retryable`]: network/timeout errors without
//! a response, 5xx and 429 are retried; other 4xx and unknown errors are not.

mod backoff;
mod classify;
mod client;
mod error;
mod options;
mod policy;
mod request;
mod retry;
mod wrap;

pub use backoff::{
    apply_jitter, compute_delay, exponential_delay, jittered_delay, parse_retry_after,
    rate_limit_delay, retry_hint_ms, JITTER_RATIO,
};
pub use classify::{classify, is_retryable, FailureClass, RequestFailure, TransportFailure};
pub use client::{HttpClient, RetryContext, RetryingClient};
pub use error::{FailureInfo, HttpError};
pub use options::{OnRetry, RetryCondition, RetryOptions, DEFAULT_RETRY_OPTIONS};
pub use policy::{DeclarativePolicy, MUTATION_RETRY_CONFIG, QUERY_RETRY_CONFIG};
pub use request::{HttpResponse, RequestDescriptor};
pub use retry::retry;
pub use wrap::{with_retry, RetryWrapped};

pub type Result<T> = std::result::Result<T, HttpError>;
