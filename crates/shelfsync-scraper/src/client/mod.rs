//! Client for the retailer's JSON storefront API.
//!
//! All region-scoped calls take a [`Session`](crate::Session) by reference
//! and present its credentials explicitly; the client itself holds no
//! per-region state and can be shared freely across concurrent region tasks.

mod categories;
mod listing;
mod regions;
mod session;

use std::time::Duration;

use serde::de::DeserializeOwned;
use shelfsync_core::AppConfig;

use crate::error::ScraperError;
use crate::transport::{HttpTransport, Transport, TransportRequest};

pub use categories::category_slug;

/// Header the storefront uses to distinguish its own XHR traffic.
const REQUESTED_WITH: &str = "OnlineShopping.WebApp";

/// Tunables for listing traversal.
#[derive(Debug, Clone)]
pub struct RetailerSettings {
    /// Scheme and host without a trailing slash, e.g. `https://www.woolworths.co.nz`.
    pub base_url: String,
    pub page_size: u32,
    /// Safety ceiling on pages per listing walk, not a business rule.
    pub max_pages: u32,
    pub inter_page_delay: Duration,
}

impl RetailerSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.retailer_base_url.clone(),
            page_size: config.scraper_page_size,
            max_pages: config.scraper_max_pages,
            inter_page_delay: Duration::from_millis(config.scraper_inter_request_delay_ms),
        }
    }
}

/// Retailer API client, generic over its [`Transport`].
pub struct RetailerClient<T = HttpTransport> {
    transport: T,
    settings: RetailerSettings,
}

impl RetailerClient<HttpTransport> {
    /// Builds a client backed by [`HttpTransport`] from application config.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be constructed.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ScraperError> {
        let transport = HttpTransport::new(
            config.scraper_request_timeout_secs,
            &config.scraper_user_agent,
            config.scraper_max_retries,
            config.scraper_retry_backoff_base_ms,
        )?;
        Ok(Self::new(transport, RetailerSettings::from_app_config(config)))
    }
}

impl<T: Transport> RetailerClient<T> {
    #[must_use]
    pub fn new(transport: T, settings: RetailerSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &RetailerSettings {
        &self.settings
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.settings.base_url)
    }

    /// Adds the headers every storefront API call carries.
    fn api_request(request: TransportRequest) -> TransportRequest {
        request
            .header("accept", "application/json")
            .header("x-requested-with", REQUESTED_WITH)
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        request: TransportRequest,
        context: &str,
    ) -> Result<R, ScraperError> {
        let response = self.transport.send(Self::api_request(request)).await?;
        response.json(context)
    }
}
