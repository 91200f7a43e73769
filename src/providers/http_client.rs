//! Rate-limited HTTP client for collaborator webhooks
//!
//! Calls are throttled to the configured per-minute quota. Nothing is retried:
//! a failed call surfaces immediately and the pipeline decides what to do.

use governor::{Quota, RateLimiter, state::NotKeyed, clock::DefaultClock, middleware::NoOpMiddleware};
use nonzero_ext::nonzero;
use reqwest::{Client, RequestBuilder, Response};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::providers::traits::ProviderResult;

type DirectLimiter = RateLimiter<NotKeyed, governor::state::InMemoryState, DefaultClock, NoOpMiddleware>;

/// Rate-limited HTTP client shared by all webhook collaborators
#[derive(Clone)]
pub struct RateLimitedClient {
    client: Client,
    limiter: Arc<DirectLimiter>,
    rate_limit_per_minute: u32,
}

impl RateLimitedClient {
    /// Create a new rate-limited client
    ///
    /// # Arguments
    /// * `rate_limit_per_minute` - Maximum requests allowed per minute
    /// * `timeout` - Whole-request timeout
    pub fn new(rate_limit_per_minute: u32, timeout: Duration) -> ProviderResult<Self> {
        let rate = NonZeroU32::new(rate_limit_per_minute).unwrap_or(nonzero!(1u32));
        let limiter = RateLimiter::direct(Quota::per_minute(rate));

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("twin-crew-compositor/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(RateLimitedClient {
            client,
            limiter: Arc::new(limiter),
            rate_limit_per_minute: rate.get(),
        })
    }

    pub fn rate_limit_per_minute(&self) -> u32 {
        self.rate_limit_per_minute
    }

    /// Build a POST request
    pub fn post(&self, url: &str) -> RateLimitedRequestBuilder<'_> {
        RateLimitedRequestBuilder {
            client: self,
            builder: self.client.post(url),
        }
    }

    /// Wait for a rate-limit permit and execute the request
    async fn execute(&self, builder: RequestBuilder) -> ProviderResult<Response> {
        self.limiter.until_ready().await;

        debug!("Executing rate-limited request");

        Ok(builder.send().await?)
    }
}

/// Request builder wrapper that enforces rate limiting
pub struct RateLimitedRequestBuilder<'a> {
    client: &'a RateLimitedClient,
    builder: RequestBuilder,
}

impl<'a> RateLimitedRequestBuilder<'a> {
    /// Add JSON body to the request
    pub fn json<T: serde::Serialize + ?Sized>(mut self, json: &T) -> Self {
        self.builder = self.builder.json(json);
        self
    }

    /// Add a bearer token header
    pub fn bearer_auth(mut self, token: &str) -> Self {
        self.builder = self.builder.bearer_auth(token);
        self
    }

    /// Add a bearer token header when one is configured
    pub fn maybe_bearer_auth(self, token: Option<&str>) -> Self {
        match token {
            Some(token) => self.bearer_auth(token),
            None => self,
        }
    }

    /// Send the request (waits for rate limit)
    pub async fn send(self) -> ProviderResult<Response> {
        self.client.execute(self.builder).await
    }
}
