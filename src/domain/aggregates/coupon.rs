//! Coupon Aggregate
//!
//! Validity rules and discount arithmetic for promotional codes. A coupon is
//! usable when it is active, inside its date window, under its usage limit
//! and the order subtotal meets its minimum. The discount never exceeds the
//! subtotal.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType { Percentage, Fixed }

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Percentage => "percentage", Self::Fixed => "fixed" }
    }
}

impl FromStr for DiscountType {
    type Err = CouponError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            other => Err(CouponError::UnknownDiscountType(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiscountOutcome {
    pub discount: Decimal,
    pub total: Decimal,
}

impl Coupon {
    pub fn validate(&self, now: DateTime<Utc>, subtotal: Decimal) -> Result<(), CouponError> {
        if !self.active { return Err(CouponError::Inactive); }
        if let Some(starts_at) = self.starts_at {
            if now < starts_at { return Err(CouponError::NotYetValid); }
        }
        if let Some(expires_at) = self.expires_at {
            if now > expires_at { return Err(CouponError::Expired); }
        }
        if let Some(limit) = self.usage_limit {
            if self.used_count >= limit { return Err(CouponError::UsageLimitReached); }
        }
        if let Some(minimum) = self.min_order_amount {
            if subtotal < minimum { return Err(CouponError::MinimumNotMet { minimum }); }
        }
        Ok(())
    }

    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal <= Decimal::ZERO { return Decimal::ZERO; }
        let raw = match self.discount_type {
            DiscountType::Percentage => {
                let pct = (subtotal * self.value / Decimal::ONE_HUNDRED)
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
                match self.max_discount_amount {
                    Some(cap) => pct.min(cap),
                    None => pct,
                }
            }
            DiscountType::Fixed => self.value,
        };
        raw.max(Decimal::ZERO).min(subtotal)
    }

    pub fn apply(&self, now: DateTime<Utc>, subtotal: Decimal) -> Result<DiscountOutcome, CouponError> {
        self.validate(now, subtotal)?;
        let discount = self.discount_for(subtotal);
        Ok(DiscountOutcome { discount, total: subtotal - discount })
    }

    pub fn remaining_uses(&self) -> Option<i32> {
        self.usage_limit.map(|limit| (limit - self.used_count).max(0))
    }
}

/// Definition of a coupon as entered in the back-office.
#[derive(Clone, Debug)]
pub struct CouponDraft {
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CouponDraft {
    pub fn validate(&self) -> Result<(), CouponError> {
        if self.value <= Decimal::ZERO {
            return Err(CouponError::InvalidDefinition("value must be greater than zero"));
        }
        if self.discount_type == DiscountType::Percentage && self.value > Decimal::ONE_HUNDRED {
            return Err(CouponError::InvalidDefinition("percentage cannot exceed 100"));
        }
        if matches!(self.min_order_amount, Some(m) if m < Decimal::ZERO) {
            return Err(CouponError::InvalidDefinition("minimum order amount cannot be negative"));
        }
        if matches!(self.max_discount_amount, Some(m) if m <= Decimal::ZERO) {
            return Err(CouponError::InvalidDefinition("maximum discount must be greater than zero"));
        }
        if matches!(self.usage_limit, Some(l) if l < 1) {
            return Err(CouponError::InvalidDefinition("usage limit must be at least 1"));
        }
        if let (Some(start), Some(end)) = (self.starts_at, self.expires_at) {
            if end <= start {
                return Err(CouponError::InvalidDefinition("expiry must be after start"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponError {
    #[error("coupon is not active")]
    Inactive,
    #[error("coupon is not valid yet")]
    NotYetValid,
    #[error("coupon has expired")]
    Expired,
    #[error("coupon usage limit reached")]
    UsageLimitReached,
    #[error("order subtotal is below the coupon minimum of {minimum}")]
    MinimumNotMet { minimum: Decimal },
    #[error("invalid coupon: {0}")]
    InvalidDefinition(&'static str),
    #[error("unknown discount type '{0}'")]
    UnknownDiscountType(String),
}
