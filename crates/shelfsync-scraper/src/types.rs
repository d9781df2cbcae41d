//! Serde models for the retailer's JSON API, plus the filtered [`RawItem`].

use rust_decimal::Decimal;
use serde::Deserialize;

/// Entry type the listing endpoints use for purchasable products. Other
/// types (promo tiles, recipe cards) are dropped.
pub const PRODUCT_ENTRY_TYPE: &str = "Product";

/// What a listing request pages through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingTarget {
    /// A department, addressed by its URL slug.
    Category(String),
    /// A free-text search term.
    Search(String),
}

impl std::fmt::Display for ListingTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingTarget::Category(slug) => write!(f, "category \"{slug}\""),
            ListingTarget::Search(term) => write!(f, "search \"{term}\""),
        }
    }
}

/// Top-level response from `GET /api/v1/products`.
#[derive(Debug, Deserialize)]
pub struct ListingResponse {
    pub products: ListingProducts,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingProducts {
    #[serde(default)]
    pub items: Vec<ListingEntry>,
    /// Reported by the retailer but not trusted for termination.
    #[serde(default)]
    pub total_items: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    #[serde(rename = "type", default)]
    pub entry_type: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub images: Option<ListingImages>,
    #[serde(default)]
    pub price: Option<PriceSignals>,
    #[serde(default)]
    pub quantity: Option<ListingQuantity>,
}

#[derive(Debug, Deserialize)]
pub struct ListingImages {
    #[serde(default)]
    pub big: Option<String>,
    #[serde(default)]
    pub small: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListingQuantity {
    #[serde(default)]
    pub max: Option<f64>,
}

/// The retailer's four price signals for a listing entry.
///
/// A missing bundle deserializes to all-zero / all-false, which resolves to
/// not sellable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSignals {
    #[serde(default, with = "rust_decimal::serde::float")]
    pub original_price: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub sale_price: Decimal,
    #[serde(default)]
    pub can_show_original_price: bool,
    #[serde(default)]
    pub can_show_sale_price: bool,
}

/// A product-typed listing entry, before price resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    pub sku: String,
    pub name: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub max_quantity: Option<f64>,
    pub price: PriceSignals,
}

impl ListingEntry {
    /// Converts a product-typed entry into a [`RawItem`].
    ///
    /// Returns `None` for non-product entries and for products without a
    /// SKU, which cannot be keyed.
    #[must_use]
    pub fn into_raw_item(self) -> Option<RawItem> {
        if self.entry_type != PRODUCT_ENTRY_TYPE {
            return None;
        }
        let sku = self.sku.filter(|s| !s.trim().is_empty())?;
        let image_url = self.images.and_then(|i| i.big.or(i.small));
        Some(RawItem {
            sku,
            name: self.name.unwrap_or_default(),
            brand: self.brand.filter(|b| !b.trim().is_empty()),
            image_url,
            max_quantity: self.quantity.and_then(|q| q.max),
            price: self.price.unwrap_or_default(),
        })
    }
}

/// Response from `GET /api/v1/shell`; departments live under `specials`.
#[derive(Debug, Deserialize)]
pub struct ShellResponse {
    #[serde(default)]
    pub specials: Vec<ShellDepartment>,
}

#[derive(Debug, Deserialize)]
pub struct ShellDepartment {
    pub id: i64,
    pub label: String,
    pub url: String,
}

/// Response from `GET /api/v1/addresses/pickup-addresses`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupAddressesResponse {
    #[serde(default)]
    pub store_areas: Vec<StoreArea>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreArea {
    #[serde(default)]
    pub store_addresses: Vec<StoreAddress>,
}

#[derive(Debug, Deserialize)]
pub struct StoreAddress {
    pub id: i64,
    pub name: String,
}

/// Response from `PUT /api/v1/fulfilment/my/pickup-addresses`.
#[derive(Debug, Default, Deserialize)]
pub struct SelectRegionResponse {
    #[serde(default)]
    pub context: Option<SelectRegionContext>,
}

#[derive(Debug, Deserialize)]
pub struct SelectRegionContext {
    #[serde(default)]
    pub fulfilment: Option<SelectRegionFulfilment>,
}

#[derive(Debug, Deserialize)]
pub struct SelectRegionFulfilment {
    #[serde(default)]
    pub address: Option<String>,
}

impl SelectRegionResponse {
    #[must_use]
    pub fn address(self) -> Option<String> {
        self.context?.fulfilment?.address
    }
}
