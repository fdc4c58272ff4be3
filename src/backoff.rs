//! Backoff delay computation.
//!
//! All delays are milliseconds. Generic failures use exponential backoff with
//! ±30% jitter clamped to the configured cap; rate-limited failures (429)
//! follow the server's `Retry-After` hint when there is one.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rand::Rng;

use crate::classify::{self, RequestFailure};
use crate::RetryOptions;

/// Fraction of the exponential delay used as jitter amplitude.
pub const JITTER_RATIO: f64 = 0.3;

/// `base_delay_ms × 2^attempt`, saturating at `u64::MAX`.
pub fn exponential_delay(attempt: usize, base_delay_ms: u64) -> u64 {
    if base_delay_ms == 0 {
        return 0;
    }
    u32::try_from(attempt)
        .ok()
        .and_then(|exp| 1u64.checked_shl(exp))
        .map_or(u64::MAX, |factor| base_delay_ms.saturating_mul(factor))
}

/// Shifts `delay_ms` by `sample × 30%`, with `sample` in `[-1, 1]`.
///
/// The offset is truncated towards zero so the result never leaves
/// `[0.7 × delay_ms, 1.3 × delay_ms]`.
pub fn apply_jitter(delay_ms: u64, sample: f64) -> u64 {
    let sample = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    let offset = (delay_ms as f64 * JITTER_RATIO * sample).trunc() as i64;
    delay_ms.saturating_add_signed(offset)
}

/// Exponential backoff with random jitter, clamped to `cap_ms`.
pub fn jittered_delay(attempt: usize, base_delay_ms: u64, cap_ms: u64) -> u64 {
    // Decorrelation only, a cryptographic source is not needed.
    let sample = rand::thread_rng().gen_range(-1.0..=1.0);
    apply_jitter(exponential_delay(attempt, base_delay_ms), sample).min(cap_ms)
}

/// Parses a `Retry-After` value into milliseconds.
///
/// Accepts delta-seconds (fractions allowed) or an HTTP date in any of the
/// IMF-fixdate, RFC 850 or asctime forms. A date yields
/// the time remaining until it, rounded up to whole seconds and never less
/// than one second.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            return None;
        }
        return Some((seconds * 1_000.0).round() as u64);
    }

    let wait_ms = parse_http_date(value)?
        .signed_duration_since(now)
        .num_milliseconds();
    let seconds = wait_ms.div_euclid(1_000) + i64::from(wait_ms.rem_euclid(1_000) != 0);
    Some(seconds.max(1).unsigned_abs().saturating_mul(1_000))
}

/// Obsolete HTTP-date layouts that recipients must still accept.
const LEGACY_HTTP_DATE_FORMATS: [&str; 3] = [
    // RFC 850: Sunday, 06-Nov-94 08:49:37 GMT
    "%A, %d-%b-%y %H:%M:%S GMT",
    "%A, %d-%b-%Y %H:%M:%S GMT",
    // asctime: Sun Nov  6 08:49:37 1994
    "%a %b %e %H:%M:%S %Y",
];

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    LEGACY_HTTP_DATE_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    })
}

/// Server retry hint carried by the failure, in milliseconds.
pub fn retry_hint_ms<E: RequestFailure + ?Sized>(error: &E) -> Option<u64> {
    error
        .retry_after_header()
        .and_then(|value| parse_retry_after(value, Utc::now()))
}

/// Delay for a 429 response.
///
/// With a hint the wait may reach `3 × max_delay_ms`; without one a fixed
/// `min(4 × base_delay_ms, 2 × max_delay_ms)` is used.
pub fn rate_limit_delay(hint_ms: Option<u64>, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    match hint_ms {
        Some(hint_ms) => hint_ms.min(max_delay_ms.saturating_mul(3)),
        None => base_delay_ms
            .saturating_mul(4)
            .min(max_delay_ms.saturating_mul(2)),
    }
}

/// Delay before retry number `attempt + 1` of a failed call.
pub fn compute_delay<E: RequestFailure + ?Sized>(
    attempt: usize,
    error: &E,
    options: &RetryOptions,
) -> u64 {
    if classify::is_rate_limited(error) {
        return rate_limit_delay(
            retry_hint_ms(error),
            options.base_delay_ms,
            options.max_delay_ms,
        );
    }
    jittered_delay(attempt, options.base_delay_ms, options.max_delay_ms)
}
