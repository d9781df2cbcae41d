use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Retail chain a product belongs to. Stored as a `SMALLINT` discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    Woolworths,
}

#[derive(Debug, Error)]
#[error("unknown store type discriminant: {0}")]
pub struct UnknownStoreType(pub i16);

impl StoreType {
    #[must_use]
    pub fn as_i16(self) -> i16 {
        match self {
            StoreType::Woolworths => 0,
        }
    }
}

impl TryFrom<i16> for StoreType {
    type Error = UnknownStoreType;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StoreType::Woolworths),
            other => Err(UnknownStoreType(other)),
        }
    }
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::Woolworths => write!(f, "woolworths"),
        }
    }
}

/// Identity of a persisted product. Never changes once a row exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductKey {
    pub sku: String,
    pub store_type: StoreType,
}

impl ProductKey {
    #[must_use]
    pub fn new(sku: impl Into<String>, store_type: StoreType) -> Self {
        Self {
            sku: sku.into(),
            store_type,
        }
    }
}

impl std::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.store_type, self.sku)
    }
}

/// A listing entry after price resolution: the unit handed to reconciliation.
///
/// `price` is always strictly positive; items the retailer cannot sell never
/// become a `ResolvedProduct`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedProduct {
    pub sku: String,
    pub store_type: StoreType,
    pub name: String,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub max_quantity: i32,
    pub price: Decimal,
}

impl ResolvedProduct {
    #[must_use]
    pub fn key(&self) -> ProductKey {
        ProductKey::new(self.sku.clone(), self.store_type)
    }
}

/// Product fields tracked for change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangedField {
    Name,
    Brand,
    ImageUrl,
    MaxQuantity,
}

impl std::fmt::Display for ChangedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangedField::Name => write!(f, "name"),
            ChangedField::Brand => write!(f, "brand"),
            ChangedField::ImageUrl => write!(f, "image_url"),
            ChangedField::MaxQuantity => write!(f, "max_quantity"),
        }
    }
}

/// A browsable department of the retailer's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub label: String,
    /// URL slug used in the department filter, e.g. `"fruit-veg"`.
    pub slug: String,
    pub store_type: StoreType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_type_round_trips_through_discriminant() {
        let raw = StoreType::Woolworths.as_i16();
        assert_eq!(StoreType::try_from(raw).unwrap(), StoreType::Woolworths);
    }

    #[test]
    fn unknown_discriminant_is_rejected() {
        let err = StoreType::try_from(42).unwrap_err();
        assert_eq!(err.0, 42);
    }

    #[test]
    fn product_key_ignores_everything_but_sku_and_store() {
        let a = ResolvedProduct {
            sku: "123".to_string(),
            store_type: StoreType::Woolworths,
            name: "Milk 2L".to_string(),
            brand: Some("Anchor".to_string()),
            image_url: None,
            max_quantity: 20,
            price: Decimal::new(399, 2),
        };
        let mut b = a.clone();
        b.name = "Milk 2 Litre".to_string();
        b.price = Decimal::new(450, 2);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().to_string(), "woolworths:123");
    }

    #[test]
    fn changed_field_serializes_snake_case() {
        let json = serde_json::to_string(&ChangedField::MaxQuantity).unwrap();
        assert_eq!(json, "\"max_quantity\"");
    }
}
