use shelfsync_core::{Category, StoreType};

use crate::error::ScraperError;
use crate::transport::{Transport, TransportRequest};
use crate::types::ShellResponse;

use super::RetailerClient;

impl<T: Transport> RetailerClient<T> {
    /// Lists the browsable departments from the storefront shell.
    ///
    /// Departments are region-independent, so no session is required.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] if the request fails or the body does not parse.
    pub async fn list_categories(&self) -> Result<Vec<Category>, ScraperError> {
        let url = self.endpoint("/api/v1/shell");
        let shell: ShellResponse = self.get_json(TransportRequest::get(url), "shell").await?;

        Ok(shell
            .specials
            .into_iter()
            .filter_map(|dept| {
                let slug = category_slug(&dept.url)?;
                Some(Category {
                    id: dept.id,
                    label: dept.label,
                    slug,
                    store_type: StoreType::Woolworths,
                })
            })
            .collect())
    }
}

/// Extracts the department filter slug from a shell URL.
///
/// Accepts both a bare slug (`"fruit-veg"`) and a browse path
/// (`"/shop/browse/fruit-veg"`). Returns `None` for an empty URL.
#[must_use]
pub fn category_slug(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.trim_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_slug_is_kept() {
        assert_eq!(category_slug("fruit-veg").as_deref(), Some("fruit-veg"));
    }

    #[test]
    fn browse_path_yields_last_segment() {
        assert_eq!(
            category_slug("/shop/browse/meat-poultry/").as_deref(),
            Some("meat-poultry")
        );
    }

    #[test]
    fn query_string_is_ignored() {
        assert_eq!(
            category_slug("/shop/browse/bakery?page=2").as_deref(),
            Some("bakery")
        );
    }

    #[test]
    fn empty_url_has_no_slug() {
        assert!(category_slug("").is_none());
        assert!(category_slug("/").is_none());
    }
}
