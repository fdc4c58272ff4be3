use std::time::Duration;

use async_trait::async_trait;

use crate::{
    classify::RequestFailure, retry::sleep_ms, HttpError, HttpResponse, RequestDescriptor,
    RetryOptions,
};

/// Request-issuing side of an HTTP client.
///
/// Implementations perform the request once and report failures through an
/// error type the classifier understands.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait HttpClient {
    type Response;
    type Error: RequestFailure;

    async fn send(&self, request: &RequestDescriptor) -> Result<Self::Response, Self::Error>;
}

/// A request together with the number of retries spent on it.
///
/// The counter belongs to this one request lifecycle; unrelated requests
/// sent through the same client each get their own context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryContext {
    request: RequestDescriptor,
    retry_count: usize,
}

impl RetryContext {
    pub fn new(request: RequestDescriptor) -> Self {
        Self {
            request,
            retry_count: 0,
        }
    }

    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }

    pub fn retry_count(&self) -> usize {
        self.retry_count
    }

    pub fn into_request(self) -> RequestDescriptor {
        self.request
    }
}

impl From<RequestDescriptor> for RetryContext {
    fn from(request: RequestDescriptor) -> Self {
        Self::new(request)
    }
}

/// Client wrapper that retries every failed request it sends.
///
/// # Example
///
/// ```no_run
/// use http_retry::{RequestDescriptor, RetryOptions, RetryingClient};
///
/// # async fn run() -> http_retry::Result<()> {
/// let client = RetryingClient::new(reqwest::Client::new())
///     .with_options(RetryOptions::default().with_max_retries(2));
/// let response = client
///     .send(RequestDescriptor::get("https://example.com/api/cases").bearer_auth("token"))
///     .await?;
/// println!("{}", response.body);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct RetryingClient<C> {
    inner: C,
    options: RetryOptions,
}

impl<C> RetryingClient<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            options: RetryOptions::default(),
        }
    }

    /// Applies retry options to every request sent through this client.
    pub fn with_options(mut self, options: RetryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: HttpClient> RetryingClient<C> {
    /// Sends `request` with a fresh retry counter.
    pub async fn send(&self, request: RequestDescriptor) -> Result<C::Response, C::Error> {
        let mut context = RetryContext::new(request);
        self.dispatch(&mut context).await
    }

    /// Sends the request held by `context`, counting retries on it.
    ///
    /// The budget applies to the context's counter, so a context that already
    /// spent retries gets only the remainder. Each dispatch always makes one
    /// initial attempt: dispatching a spent context again is a new logical
    /// operation that sends once and is never retried. Use [`send`] or a fresh
    /// [`RetryContext`] for a full budget.
    ///
    /// [`send`]: RetryingClient::send
    pub async fn dispatch(&self, context: &mut RetryContext) -> Result<C::Response, C::Error> {
        loop {
            let err = match self.inner.send(&context.request).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            let Some(delay_ms) = self.on_failure(context, &err) else {
                return Err(err);
            };
            sleep_ms(delay_ms).await;
        }
    }

    /// Failure hook: bumps the request's counter and returns the delay when a
    /// retry is warranted. `None` means the rejection is passed through.
    fn on_failure(&self, context: &mut RetryContext, err: &C::Error) -> Option<u64> {
        let delay_ms = self.options.next_delay(context.retry_count, err)?;
        context.retry_count += 1;
        self.options.notify(err, context.retry_count, delay_ms);
        Some(delay_ms)
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<C> HttpClient for RetryingClient<C>
where
    C: HttpClient + Sync,
    C::Response: Send,
    C::Error: Send,
{
    type Response = C::Response;
    type Error = C::Error;

    async fn send(&self, request: &RequestDescriptor) -> Result<Self::Response, Self::Error> {
        RetryingClient::send(self, request.clone()).await
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl HttpClient for reqwest::Client {
    type Response = HttpResponse;
    type Error = HttpError;

    async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse, HttpError> {
        let mut builder = self.request(request.method.clone(), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout_ms) = request.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_builder() {
                HttpError::InvalidRequest(err.to_string())
            } else {
                HttpError::Transport(err)
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(HttpError::Transport)?;

        if !status.is_success() {
            return Err(HttpError::Http {
                status: status.as_u16(),
                headers,
                body,
            });
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}
