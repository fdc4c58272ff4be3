use std::fmt;
use std::sync::Arc;

use crate::classify::{self, RequestFailure};

/// Predicate deciding whether a failure may be retried.
pub type RetryCondition = Arc<dyn Fn(&dyn RequestFailure) -> bool + Send + Sync>;

/// Observer called before each retry with the error, the 1-indexed retry
/// number and the delay in milliseconds.
pub type OnRetry = Arc<dyn Fn(&dyn RequestFailure, usize, u64) + Send + Sync>;

/// Defaults shared by every call site: 3 retries, 1 s base, 10 s cap.
pub const DEFAULT_RETRY_OPTIONS: RetryOptions = RetryOptions {
    max_retries: 3,
    base_delay_ms: 1_000,
    max_delay_ms: 10_000,
    retry_condition: None,
    on_retry: None,
};

/// Configures retry count, backoff and hooks for one call site.
#[derive(Clone)]
pub struct RetryOptions {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Upper bound for generic delays in milliseconds.
    pub max_delay_ms: u64,
    /// Replaces the default classifier when set.
    pub retry_condition: Option<RetryCondition>,
    pub on_retry: Option<OnRetry>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        DEFAULT_RETRY_OPTIONS
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let callback = |set: bool| if set { "<fn>" } else { "None" };
        f.debug_struct("RetryOptions")
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("retry_condition", &callback(self.retry_condition.is_some()))
            .field("on_retry", &callback(self.on_retry.is_some()))
            .finish()
    }
}

impl RetryOptions {
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Overrides the default classifier.
    pub fn with_retry_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&dyn RequestFailure) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Some(Arc::new(condition));
        self
    }

    /// Registers an observer invoked before every retry sleep.
    pub fn with_on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(&dyn RequestFailure, usize, u64) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// Reads options from the environment, keeping defaults for unset
    /// variables.
    ///
    /// Reads:
    /// - `HTTP_RETRY_MAX_RETRIES`
    /// - `HTTP_RETRY_BASE_DELAY_MS`
    /// - `HTTP_RETRY_MAX_DELAY_MS`
    ///
    /// Returns an error if a variable is set but empty or not a number.
    ///
    /// **Not available on `wasm32` targets.**
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Result<Self, String> {
        let mut options = Self::default();
        if let Some(value) = read_env_number("HTTP_RETRY_MAX_RETRIES")? {
            options.max_retries = usize::try_from(value)
                .map_err(|_| "HTTP_RETRY_MAX_RETRIES is out of range".to_owned())?;
        }
        if let Some(value) = read_env_number("HTTP_RETRY_BASE_DELAY_MS")? {
            options.base_delay_ms = value;
        }
        if let Some(value) = read_env_number("HTTP_RETRY_MAX_DELAY_MS")? {
            options.max_delay_ms = value;
        }
        Ok(options)
    }

    /// Evaluates the retry condition, falling back to the default classifier.
    pub(crate) fn should_retry<E: RequestFailure>(&self, error: &E) -> bool {
        match &self.retry_condition {
            Some(condition) => condition(error as &dyn RequestFailure),
            None => classify::is_retryable(error),
        }
    }

    /// Decides whether a failure after `attempt` prior retries gets another
    /// try, and if so how long to wait first.
    pub(crate) fn next_delay<E: RequestFailure>(&self, attempt: usize, error: &E) -> Option<u64> {
        if attempt >= self.max_retries {
            #[cfg(feature = "tracing")]
            tracing::debug!(attempt, "retry budget exhausted");
            return None;
        }
        if !self.should_retry(error) {
            #[cfg(feature = "tracing")]
            tracing::debug!(status = ?error.status(), "failure is not retryable");
            return None;
        }
        Some(crate::backoff::compute_delay(attempt, error, self))
    }

    pub(crate) fn notify<E: RequestFailure>(&self, error: &E, retry: usize, delay_ms: u64) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            retry,
            max_retries = self.max_retries,
            delay_ms,
            status = ?error.status(),
            "retrying after {} ms: {}",
            delay_ms,
            error
        );

        if let Some(observer) = &self.on_retry {
            observer(error as &dyn RequestFailure, retry, delay_ms);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn read_env_number(name: &str) -> Result<Option<u64>, String> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Err(format!("{name} is set but empty"));
    }
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|err| format!("{name} is not a valid number: {err}"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::{RetryOptions, DEFAULT_RETRY_OPTIONS};
    use crate::FailureInfo;

    #[test]
    fn defaults_match_constant() {
        let options = RetryOptions::default();
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.base_delay_ms, 1_000);
        assert_eq!(options.max_delay_ms, 10_000);
        assert!(options.retry_condition.is_none());
        assert_eq!(DEFAULT_RETRY_OPTIONS.max_retries, options.max_retries);
    }

    #[test]
    fn custom_condition_replaces_classifier() {
        let options = RetryOptions::default().with_retry_condition(|err| err.status() == Some(404));
        assert!(options.should_retry(&FailureInfo::status(404)));
        assert!(!options.should_retry(&FailureInfo::status(503)));
    }

    #[test]
    fn next_delay_respects_budget() {
        let options = RetryOptions::default().with_max_retries(1);
        let err = FailureInfo::status(503);
        assert!(options.next_delay(0, &err).is_some());
        assert!(options.next_delay(1, &err).is_none());
        assert!(options.next_delay(0, &FailureInfo::status(400)).is_none());
    }

    #[test]
    fn notify_passes_retry_number_and_delay() {
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let options = RetryOptions::default().with_on_retry(move |_, retry, delay_ms| {
            assert_eq!(retry, 2);
            assert_eq!(delay_ms, 250);
            sink.fetch_add(1, Ordering::SeqCst);
        });
        options.notify(&FailureInfo::status(500), 2, 250);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_hides_callbacks() {
        let options = RetryOptions::default().with_on_retry(|_, _, _| {});
        let debug = format!("{options:?}");
        assert!(debug.contains("on_retry: \"<fn>\""));
        assert!(debug.contains("retry_condition: \"None\""));
    }
}
