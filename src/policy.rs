//! Pre-built retry settings for query/mutation frameworks that run their own
//! retry loop.
//!
//! The framework calls [`DeclarativePolicy::retry_delay`] with a zero-based
//! attempt index and the failure; nothing here drives attempts or keeps
//! per-call state, so one policy value can serve any number of concurrent
//! queries.

use crate::backoff::{exponential_delay, jittered_delay, retry_hint_ms};
use crate::classify::{self, RequestFailure};

const POLICY_BASE_DELAY_MS: u64 = 1_000;
const QUERY_MAX_DELAY_MS: u64 = 30_000;
const QUERY_RATE_LIMIT_MAX_DELAY_MS: u64 = 60_000;
const MUTATION_MAX_DELAY_MS: u64 = 10_000;

/// Retry count plus delay function, in the shape query frameworks expect.
#[derive(Clone, Copy, Debug)]
pub struct DeclarativePolicy {
    /// Number of retries after the first failure.
    pub retry: usize,
    /// Delay in milliseconds before retry `attempt_index + 1`.
    pub retry_delay: fn(attempt_index: usize, error: &dyn RequestFailure) -> u64,
}

impl DeclarativePolicy {
    pub fn delay_ms(&self, attempt_index: usize, error: &dyn RequestFailure) -> u64 {
        (self.retry_delay)(attempt_index, error)
    }
}

/// Reads: 3 retries, jittered exponential backoff up to 30 s, rate limits
/// honour `Retry-After` up to 60 s.
pub const QUERY_RETRY_CONFIG: DeclarativePolicy = DeclarativePolicy {
    retry: 3,
    retry_delay: query_retry_delay,
};

/// Writes: 2 retries, plain exponential backoff up to 10 s.
pub const MUTATION_RETRY_CONFIG: DeclarativePolicy = DeclarativePolicy {
    retry: 2,
    retry_delay: mutation_retry_delay,
};

fn query_retry_delay(attempt_index: usize, error: &dyn RequestFailure) -> u64 {
    if classify::is_rate_limited(error) {
        return retry_hint_ms(error)
            .unwrap_or_else(|| {
                jittered_delay(
                    attempt_index,
                    POLICY_BASE_DELAY_MS,
                    QUERY_RATE_LIMIT_MAX_DELAY_MS,
                )
            })
            .min(QUERY_RATE_LIMIT_MAX_DELAY_MS);
    }
    jittered_delay(attempt_index, POLICY_BASE_DELAY_MS, QUERY_MAX_DELAY_MS)
}

fn mutation_retry_delay(attempt_index: usize, _error: &dyn RequestFailure) -> u64 {
    exponential_delay(attempt_index, POLICY_BASE_DELAY_MS).min(MUTATION_MAX_DELAY_MS)
}

#[cfg(test)]
mod tests {
    use super::{MUTATION_RETRY_CONFIG, QUERY_RETRY_CONFIG};
    use crate::{classify::is_retryable, FailureInfo};

    #[test]
    fn retry_counts() {
        assert_eq!(QUERY_RETRY_CONFIG.retry, 3);
        assert_eq!(MUTATION_RETRY_CONFIG.retry, 2);
    }

    #[test]
    fn query_delay_is_jittered_and_capped() {
        let err = FailureInfo::status(503);
        for attempt in 0..3 {
            let raw = 1_000.0 * f64::from(1u32 << attempt);
            let delay = QUERY_RETRY_CONFIG.delay_ms(attempt, &err) as f64;
            assert!(delay >= 0.7 * raw && delay <= 1.3 * raw);
        }
        for attempt in 5..12 {
            assert!(QUERY_RETRY_CONFIG.delay_ms(attempt, &err) <= 30_000);
        }
    }

    #[test]
    fn query_rate_limit_uses_hint_with_sixty_second_ceiling() {
        let hinted = FailureInfo::status(429).with_header("Retry-After", "45");
        assert_eq!(QUERY_RETRY_CONFIG.delay_ms(0, &hinted), 45_000);

        let excessive = FailureInfo::status(429).with_header("Retry-After", "600");
        assert_eq!(QUERY_RETRY_CONFIG.delay_ms(1, &excessive), 60_000);

        let unhinted = FailureInfo::status(429);
        for attempt in 0..10 {
            assert!(QUERY_RETRY_CONFIG.delay_ms(attempt, &unhinted) <= 60_000);
        }
    }

    #[test]
    fn mutation_delay_is_plain_exponential() {
        let err = FailureInfo::status(429).with_header("Retry-After", "1");
        assert_eq!(MUTATION_RETRY_CONFIG.delay_ms(0, &err), 1_000);
        assert_eq!(MUTATION_RETRY_CONFIG.delay_ms(1, &err), 2_000);
        assert_eq!(MUTATION_RETRY_CONFIG.delay_ms(3, &err), 8_000);
        assert_eq!(MUTATION_RETRY_CONFIG.delay_ms(4, &err), 10_000);
    }

    /// Stand-in for a framework loop: it owns the attempts and only asks the
    /// policy for the retry count and delays.
    fn framework_run(policy: super::DeclarativePolicy, failures: &[FailureInfo]) -> Vec<u64> {
        let mut delays = Vec::new();
        for (attempt_index, err) in failures.iter().enumerate() {
            if attempt_index >= policy.retry || !is_retryable(err) {
                break;
            }
            delays.push(policy.delay_ms(attempt_index, err));
        }
        delays
    }

    #[test]
    fn framework_loop_stops_at_policy_retry_count() {
        let failures = vec![FailureInfo::status(500); 5];
        assert_eq!(framework_run(MUTATION_RETRY_CONFIG, &failures), vec![1_000, 2_000]);
        assert_eq!(framework_run(QUERY_RETRY_CONFIG, &failures).len(), 3);
    }
}
