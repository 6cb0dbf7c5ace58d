use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Page, PageParams};
use crate::domain::aggregates::{Coupon, CouponError, DiscountType};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CouponRow {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: String,
    pub value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CouponRow {
    pub fn to_domain(&self) -> Result<Coupon, CouponError> {
        Ok(Coupon {
            id: self.id,
            code: self.code.clone(),
            discount_type: self.discount_type.parse()?,
            value: self.value,
            min_order_amount: self.min_order_amount,
            max_discount_amount: self.max_discount_amount,
            usage_limit: self.usage_limit,
            used_count: self.used_count,
            starts_at: self.starts_at,
            expires_at: self.expires_at,
            active: self.active,
        })
    }
}

/// Column values for creating or replacing a coupon definition.
#[derive(Debug, Clone)]
pub struct CouponWrite {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: PgPool,
}

impl CouponRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn list(&self, params: PageParams) -> Result<Page<CouponRow>, sqlx::Error> {
        let rows = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(params.limit()).bind(params.offset())
            .fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM coupons").fetch_one(&self.pool).await?;
        Ok(Page::new(rows, total.0, params))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<CouponRow>, sqlx::Error> {
        sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await
    }

    /// Codes are stored upper-cased.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<CouponRow>, sqlx::Error> {
        sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1")
            .bind(code).fetch_optional(&self.pool).await
    }

    pub async fn create(&self, coupon: &CouponWrite) -> Result<CouponRow, sqlx::Error> {
        sqlx::query_as::<_, CouponRow>(
            "INSERT INTO coupons (id, code, description, discount_type, value, min_order_amount, max_discount_amount,
                                  usage_limit, used_count, starts_at, expires_at, active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, $10, $11, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7()).bind(&coupon.code).bind(&coupon.description).bind(coupon.discount_type.as_str())
        .bind(coupon.value).bind(coupon.min_order_amount).bind(coupon.max_discount_amount)
        .bind(coupon.usage_limit).bind(coupon.starts_at).bind(coupon.expires_at).bind(coupon.active)
        .fetch_one(&self.pool).await
    }

    pub async fn update(&self, id: Uuid, coupon: &CouponWrite) -> Result<Option<CouponRow>, sqlx::Error> {
        sqlx::query_as::<_, CouponRow>(
            "UPDATE coupons SET code = $2, description = $3, discount_type = $4, value = $5, min_order_amount = $6,
                    max_discount_amount = $7, usage_limit = $8, starts_at = $9, expires_at = $10, active = $11,
                    updated_at = NOW()
             WHERE id = $1 RETURNING *",
        )
        .bind(id).bind(&coupon.code).bind(&coupon.description).bind(coupon.discount_type.as_str())
        .bind(coupon.value).bind(coupon.min_order_amount).bind(coupon.max_discount_amount)
        .bind(coupon.usage_limit).bind(coupon.starts_at).bind(coupon.expires_at).bind(coupon.active)
        .fetch_optional(&self.pool).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    /// Counts one redemption unless the limit has been reached meanwhile.
    pub async fn increment_usage(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE coupons SET used_count = used_count + 1, updated_at = NOW()
             WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)",
        )
        .bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }
}
