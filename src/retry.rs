use std::future::Future;

use crate::{classify::RequestFailure, RetryOptions};

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the retry budget is spent.
///
/// The operation is called at most `max_retries + 1` times, strictly one
/// after another. The error returned is the one produced by the last attempt,
/// unchanged. `on_retry` sees every error that led to a retry.
///
/// # Example
///
/// ```no_run
/// use http_retry::{retry, RetryOptions};
///
/// # async fn run() -> Result<(), http_retry::HttpError> {
/// let http = &reqwest::Client::new();
/// let body = retry(
///     || async move {
///         let response = http
///             .get("https://example.com/api/cases")
///             .send()
///             .await
///             .map_err(http_retry::HttpError::Transport)?;
///         response.text().await.map_err(http_retry::HttpError::Transport)
///     },
///     &RetryOptions::default(),
/// )
/// .await?;
/// # let _ = body;
/// # Ok(())
/// # }
/// ```
pub async fn retry<F, Fut, T, E>(mut operation: F, options: &RetryOptions) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RequestFailure,
{
    let mut attempt = 0usize;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let Some(delay_ms) = options.next_delay(attempt, &err) else {
            return Err(err);
        };
        attempt += 1;
        options.notify(&err, attempt, delay_ms);
        sleep_ms(delay_ms).await;
    }
}

/// Suspends the current task for `delay_ms` without blocking the executor.
#[cfg(not(target_arch = "wasm32"))]
pub(crate) async fn sleep_ms(delay_ms: u64) {
    if delay_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
    }
}

/// Suspends via a JS `setTimeout` promise; the browser event loop keeps
/// running in the meantime.
#[cfg(target_arch = "wasm32")]
pub(crate) async fn sleep_ms(delay_ms: u64) {
    use wasm_bindgen::{JsCast, JsValue};

    if delay_ms == 0 {
        return;
    }
    let timeout = delay_ms.min(i32::MAX as u64) as i32;
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let global = js_sys::global();
        let scheduled = js_sys::Reflect::get(&global, &JsValue::from_str("setTimeout"))
            .ok()
            .and_then(|value| value.dyn_into::<js_sys::Function>().ok())
            .map(|set_timeout| set_timeout.call2(&global, &resolve, &JsValue::from(timeout)));
        if !matches!(scheduled, Some(Ok(_))) {
            let _ = resolve.call0(&JsValue::UNDEFINED);
        }
    });
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}
