//! Product Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use crate::domain::value_objects::{Sku, SkuError, Slug, SlugError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus { #[default] Draft, Active, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "draft", Self::Active => "active", Self::Archived => "archived" }
    }
}

impl FromStr for ProductStatus {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            other => Err(ProductError::UnknownStatus(other.to_string())),
        }
    }
}

/// Product fields as submitted from the back-office, before persistence.
#[derive(Clone, Debug)]
pub struct ProductDraft {
    pub sku: String,
    pub name: String,
    pub slug: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    pub status: ProductStatus,
}

/// A draft that passed validation, with normalised SKU and slug.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidProduct {
    pub sku: Sku,
    pub name: String,
    pub slug: Slug,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    pub status: ProductStatus,
}

impl ProductDraft {
    pub fn validate(self) -> Result<ValidProduct, ProductError> {
        let name = self.name.trim().to_string();
        if name.is_empty() { return Err(ProductError::MissingName); }
        if self.price < Decimal::ZERO { return Err(ProductError::NegativePrice); }
        if let Some(compare_at) = self.compare_at_price {
            if compare_at < self.price { return Err(ProductError::CompareAtBelowPrice); }
        }
        if self.stock < 0 { return Err(ProductError::NegativeStock); }
        let slug = match self.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(given) => Slug::parse(given)?,
            None => Slug::from_name(&name)?,
        };
        Ok(ValidProduct {
            sku: Sku::new(self.sku)?,
            name,
            slug,
            price: self.price,
            compare_at_price: self.compare_at_price,
            stock: self.stock,
            status: self.status,
        })
    }
}

/// Object-storage prefix under which a product's images live.
pub fn image_prefix(slug: &str) -> String { format!("products/{slug}/") }

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    #[error("Missing name")]
    MissingName,
    #[error("Price cannot be negative")]
    NegativePrice,
    #[error("Compare-at price must not be below the price")]
    CompareAtBelowPrice,
    #[error("Stock cannot be negative")]
    NegativeStock,
    #[error(transparent)]
    Sku(#[from] SkuError),
    #[error("Invalid slug: {0}")]
    Slug(#[from] SlugError),
    #[error("unknown product status '{0}'")]
    UnknownStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft() -> ProductDraft {
        ProductDraft {
            sku: "tee-01".into(), name: " Linen Shirt ".into(), slug: None, price: dec!(1299),
            compare_at_price: Some(dec!(1599)), stock: 5, status: ProductStatus::Active,
        }
    }

    #[test]
    fn test_product_create() {
        let p = draft().validate().unwrap();
        assert_eq!(p.name, "Linen Shirt");
        assert_eq!(p.slug.as_str(), "linen-shirt");
        assert_eq!(p.sku.as_str(), "TEE-01");
        assert_eq!(image_prefix(p.slug.as_str()), "products/linen-shirt/");
    }

    #[test]
    fn test_explicit_slug_is_normalised() {
        let p = ProductDraft { slug: Some("Summer Sale Shirt".into()), ..draft() }.validate().unwrap();
        assert_eq!(p.slug.as_str(), "summer-sale-shirt");
    }

    #[test]
    fn test_rejections() {
        assert_eq!(ProductDraft { name: "  ".into(), ..draft() }.validate(), Err(ProductError::MissingName));
        assert_eq!(ProductDraft { stock: -1, ..draft() }.validate(), Err(ProductError::NegativeStock));
        assert_eq!(ProductDraft { compare_at_price: Some(dec!(10)), ..draft() }.validate(), Err(ProductError::CompareAtBelowPrice));
        assert_eq!(ProductDraft { price: dec!(-1), ..draft() }.validate(), Err(ProductError::NegativePrice));
    }
}
