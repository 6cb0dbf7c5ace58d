use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::db::{CouponRepository, CouponRow, CouponWrite};
use crate::domain::aggregates::{CouponDraft, DiscountType};
use crate::domain::value_objects::CouponCode;
use crate::state::AppState;
use crate::{EcommerceError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct CouponPreviewRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub code: String,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CouponPreview {
    pub code: String,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Storefront coupon check: what the code would take off `subtotal` now.
pub async fn preview(state: &AppState, code: &str, subtotal: Decimal) -> Result<CouponPreview> {
    if subtotal < Decimal::ZERO {
        return Err(EcommerceError::validation("subtotal cannot be negative"));
    }
    let code = CouponCode::new(code).map_err(|_| EcommerceError::CouponNotFound)?;
    let coupon = CouponRepository::new(state.db.clone())
        .get_by_code(code.as_str())
        .await?
        .ok_or(EcommerceError::CouponNotFound)?
        .to_domain()?;
    let outcome = coupon.apply(Utc::now(), subtotal)?;
    Ok(CouponPreview { code: coupon.code, discount: outcome.discount, total: outcome.total })
}

/// Back-office coupon definition.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CouponInput {
    pub code: String,
    #[validate(length(max = 500, message = "is too long"))]
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool { true }

impl CouponInput {
    pub fn into_write(self) -> Result<CouponWrite> {
        self.validate()?;
        let code = CouponCode::new(&self.code).map_err(|e| EcommerceError::validation(e.to_string()))?;
        CouponDraft {
            discount_type: self.discount_type,
            value: self.value,
            min_order_amount: self.min_order_amount,
            max_discount_amount: self.max_discount_amount,
            usage_limit: self.usage_limit,
            starts_at: self.starts_at,
            expires_at: self.expires_at,
        }
        .validate()?;
        Ok(CouponWrite {
            code: code.as_str().to_string(),
            description: self.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            discount_type: self.discount_type,
            value: self.value,
            min_order_amount: self.min_order_amount,
            max_discount_amount: self.max_discount_amount,
            usage_limit: self.usage_limit,
            starts_at: self.starts_at,
            expires_at: self.expires_at,
            active: self.active,
        })
    }
}

pub async fn create(state: &AppState, input: CouponInput) -> Result<CouponRow> {
    let write = input.into_write()?;
    let row = CouponRepository::new(state.db.clone()).create(&write).await?;
    info!(code = %row.code, "Coupon created");
    Ok(row)
}

pub async fn update(state: &AppState, id: Uuid, input: CouponInput) -> Result<CouponRow> {
    let write = input.into_write()?;
    CouponRepository::new(state.db.clone())
        .update(id, &write)
        .await?
        .ok_or(EcommerceError::CouponNotFound)
}

pub async fn delete(state: &AppState, id: Uuid) -> Result<()> {
    if !CouponRepository::new(state.db.clone()).delete(id).await? {
        return Err(EcommerceError::CouponNotFound);
    }
    info!(%id, "Coupon deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::CouponError;
    use rust_decimal_macros::dec;

    fn input() -> CouponInput {
        CouponInput {
            code: " summer-10 ".into(), description: Some("  ".into()), discount_type: DiscountType::Percentage,
            value: dec!(10), min_order_amount: None, max_discount_amount: Some(dec!(200)), usage_limit: Some(50),
            starts_at: None, expires_at: None, active: true,
        }
    }

    #[test]
    fn input_normalises_code_and_description() {
        let write = input().into_write().unwrap();
        assert_eq!(write.code, "SUMMER-10");
        assert_eq!(write.description, None);
        assert_eq!(write.max_discount_amount, Some(dec!(200)));
    }

    #[test]
    fn input_rejects_bad_definitions() {
        let bad_code = CouponInput { code: "x".into(), ..input() };
        assert!(matches!(bad_code.into_write(), Err(EcommerceError::Validation(_))));
        let over = CouponInput { value: dec!(150), ..input() };
        assert!(matches!(
            over.into_write(),
            Err(EcommerceError::Coupon(CouponError::InvalidDefinition(_)))
        ));
    }
}
