use std::fmt;
use std::future::Future;

use crate::{classify::RequestFailure, retry, RetryOptions};

/// Builds a retrying version of an async function.
///
/// The wrapped function takes one argument; use a tuple for several. The
/// argument is cloned for each attempt.
///
/// # Example
///
/// ```no_run
/// use http_retry::{with_retry, FailureInfo, RetryOptions};
///
/// async fn load_case(id: u64) -> Result<String, FailureInfo> {
///     Ok(format!("case {id}"))
/// }
///
/// # async fn run() -> Result<(), FailureInfo> {
/// let load_case = with_retry(load_case, RetryOptions::default());
/// let case = load_case.call(42_u64).await?;
/// # let _ = case;
/// # Ok(())
/// # }
/// ```
pub fn with_retry<F>(operation: F, options: RetryOptions) -> RetryWrapped<F> {
    RetryWrapped { operation, options }
}

/// An async function bundled with the retry options it runs under.
#[derive(Clone)]
pub struct RetryWrapped<F> {
    operation: F,
    options: RetryOptions,
}

impl<F> fmt::Debug for RetryWrapped<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryWrapped")
            .field("operation", &"<fn>")
            .field("options", &self.options)
            .finish()
    }
}

impl<F> RetryWrapped<F> {
    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Calls the wrapped function with `args`, retrying per the options.
    pub async fn call<A, Fut, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        A: Clone,
        E: RequestFailure,
    {
        retry(|| (self.operation)(args.clone()), &self.options).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::with_retry;
    use crate::{FailureInfo, RetryOptions};

    #[tokio::test]
    async fn wrapped_function_retries_with_same_arguments() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fetch = move |(kind, id): (&'static str, u64)| {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FailureInfo::status(502))
                } else {
                    Ok(format!("{kind}/{id}"))
                }
            }
        };

        let wrapped = with_retry(fetch, RetryOptions::default().with_base_delay_ms(1));
        let value = wrapped
            .call(("cases", 12_u64))
            .await
            .expect("second attempt must succeed");

        assert_eq!(value, "cases/12");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn wrapper_can_be_reused_across_calls() {
        async fn echo(id: u64) -> Result<u64, FailureInfo> {
            Ok(id)
        }

        let wrapped = with_retry(echo, RetryOptions::default());
        assert_eq!(wrapped.call(1_u64).await, Ok(1));
        assert_eq!(wrapped.call(2_u64).await, Ok(2));
        assert!(format!("{wrapped:?}").contains("<fn>"));
    }
}
