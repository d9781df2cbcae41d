//! HTTP transport seam.
//!
//! Every retailer call goes through [`Transport::send`]. Requests carry their
//! own credentials as headers; a transport keeps no state between calls, so
//! two regions can never observe each other's session.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method};

use crate::error::ScraperError;
use crate::rate_limit::retry_with_backoff;

/// A single outbound request to the retailer.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub json_body: Option<serde_json::Value>,
}

impl TransportRequest {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            json_body: None,
        }
    }

    #[must_use]
    pub fn put_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::PUT,
            url: url.into(),
            headers: Vec::new(),
            json_body: Some(body),
        }
    }

    #[must_use]
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Value of the first header called `name` (ASCII case-insensitive).
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A successful (2xx) response. Non-success statuses surface as errors.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub url: String,
    /// Raw `Set-Cookie` header values, in arrival order.
    pub set_cookies: Vec<String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Deserializes the body as JSON, tagging failures with `context`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Deserialize`] if the body does not match `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self, context: &str) -> Result<T, ScraperError> {
        serde_json::from_slice(&self.body).map_err(|source| ScraperError::Deserialize {
            context: context.to_owned(),
            source,
        })
    }
}

/// Sends a request and returns the raw response.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, ScraperError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, ScraperError>> + Send {
        (**self).send(request)
    }
}

/// `reqwest`-backed transport with retry on transient failures.
///
/// The underlying client has no cookie store; credentials travel only in the
/// headers each request carries.
pub struct HttpTransport {
    client: Client,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_ms,
        })
    }

    async fn send_once(&self, request: &TransportRequest) -> Result<TransportResponse, ScraperError> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(5);
            return Err(ScraperError::RateLimited {
                url: request.url.clone(),
                retry_after_secs,
            });
        }

        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: request.url.clone(),
            });
        }

        let set_cookies = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_owned)
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse {
            url: request.url.clone(),
            set_cookies,
            body,
        })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, ScraperError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.send_once(&request)
        })
        .await
    }
}
