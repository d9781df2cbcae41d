use futures::Stream;
use reqwest::Url;
use shelfsync_core::Category;

use crate::error::ScraperError;
use crate::pagination::paginate;
use crate::session::Session;
use crate::transport::{Transport, TransportRequest};
use crate::types::{ListingResponse, ListingTarget, RawItem};

use super::RetailerClient;

impl<T: Transport> RetailerClient<T> {
    /// Builds the listing URL for one page of `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidUrl`] if the configured base URL is not
    /// a valid absolute URL.
    pub fn listing_url(&self, target: &ListingTarget, page: u32) -> Result<String, ScraperError> {
        let base = self.endpoint("/api/v1/products");
        let mut url = Url::parse(&base).map_err(|e| ScraperError::InvalidUrl {
            url: base.clone(),
            reason: e.to_string(),
        })?;

        {
            let mut query = url.query_pairs_mut();
            match target {
                ListingTarget::Category(slug) => {
                    query
                        .append_pair("dasFilter", &format!("Department;;{slug};false"))
                        .append_pair("target", "browse");
                }
                ListingTarget::Search(term) => {
                    query
                        .append_pair("target", "search")
                        .append_pair("search", term);
                }
            }
            query
                .append_pair("inStockProductsOnly", "false")
                .append_pair("size", &self.settings.page_size.to_string())
                .append_pair("page", &page.to_string());
        }

        Ok(url.into())
    }

    /// Fetches one listing page under `session`, keeping only product-typed
    /// entries.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] on transport failure or an unexpected body.
    pub async fn fetch_listing_page(
        &self,
        session: &Session,
        target: &ListingTarget,
        page: u32,
    ) -> Result<Vec<RawItem>, ScraperError> {
        let url = self.listing_url(target, page)?;
        let request = TransportRequest::get(url).header("cookie", session.cookie_header());
        let context = format!("{target} page {page}");
        let response: ListingResponse = self.get_json(request, &context).await?;

        let total = response.products.items.len();
        let items: Vec<RawItem> = response
            .products
            .items
            .into_iter()
            .filter_map(|entry| entry.into_raw_item())
            .collect();

        if items.len() < total {
            tracing::trace!(
                region_id = %session.region_id(),
                %target,
                page,
                dropped = total - items.len(),
                "discarded non-product listing entries"
            );
        }

        Ok(items)
    }

    /// Lazily walks every page of `target` under `session`.
    pub fn listing_items<'a>(
        &'a self,
        session: &'a Session,
        target: ListingTarget,
    ) -> impl Stream<Item = Result<RawItem, ScraperError>> + 'a {
        let context = format!("region {} {target}", session.region_id());
        paginate(
            context,
            self.settings.max_pages,
            self.settings.inter_page_delay,
            move |page| {
                let target = target.clone();
                async move { self.fetch_listing_page(session, &target, page).await }
            },
        )
    }

    /// Lazily walks every page of a department under `session`.
    pub fn category_items<'a>(
        &'a self,
        session: &'a Session,
        category: &Category,
    ) -> impl Stream<Item = Result<RawItem, ScraperError>> + 'a {
        self.listing_items(session, ListingTarget::Category(category.slug.clone()))
    }

    /// Lazily walks every page of search results for `term` under `session`.
    pub fn search_items<'a>(
        &'a self,
        session: &'a Session,
        term: &str,
    ) -> impl Stream<Item = Result<RawItem, ScraperError>> + 'a {
        self.listing_items(session, ListingTarget::Search(term.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::client::RetailerSettings;
    use crate::transport::TransportResponse;

    struct NoTransport;

    impl Transport for NoTransport {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse, ScraperError> {
            Err(ScraperError::UnexpectedStatus {
                status: 599,
                url: request.url,
            })
        }
    }

    fn client(base_url: &str) -> RetailerClient<NoTransport> {
        RetailerClient::new(
            NoTransport,
            RetailerSettings {
                base_url: base_url.to_owned(),
                page_size: 120,
                max_pages: 10,
                inter_page_delay: Duration::ZERO,
            },
        )
    }

    #[test]
    fn category_url_carries_department_filter() {
        let url = client("https://www.woolworths.co.nz")
            .listing_url(&ListingTarget::Category("fruit-veg".into()), 3)
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/api/v1/products");
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("dasFilter".into(), "Department;;fruit-veg;false".into())));
        assert!(pairs.contains(&("target".into(), "browse".into())));
        assert!(pairs.contains(&("inStockProductsOnly".into(), "false".into())));
        assert!(pairs.contains(&("size".into(), "120".into())));
        assert!(pairs.contains(&("page".into(), "3".into())));
    }

    #[test]
    fn search_url_encodes_term() {
        let url = client("https://www.woolworths.co.nz")
            .listing_url(&ListingTarget::Search("milk & eggs".into()), 1)
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        let search = parsed
            .query_pairs()
            .find(|(k, _)| k == "search")
            .map(|(_, v)| v.into_owned());
        assert_eq!(search.as_deref(), Some("milk & eggs"));
        assert!(!url.contains("dasFilter"));
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let err = client("not a url")
            .listing_url(&ListingTarget::Search("x".into()), 1)
            .unwrap_err();
        assert!(matches!(err, ScraperError::InvalidUrl { .. }));
    }
}
