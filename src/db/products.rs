//! Product persistence, including the guarded stock updates used at checkout.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{like_pattern, Page, PageParams};
use crate::domain::aggregates::{ProductStatus, ValidProduct};
use crate::services::checkout::InventoryStore;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    pub status: String,
    pub category_id: Option<Uuid>,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    pub fn status(&self) -> ProductStatus { self.status.parse().unwrap_or_default() }
    pub fn is_active(&self) -> bool { self.status() == ProductStatus::Active }
}

/// Fields stored alongside a validated product that carry no business rules.
#[derive(Debug, Clone, Default)]
pub struct ProductExtras {
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub status: Option<ProductStatus>,
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn list(&self, filter: &ProductFilter, params: PageParams) -> Result<Page<ProductRow>, sqlx::Error> {
        let status = filter.status.map(|s| s.as_str());
        let pattern = like_pattern(filter.search.as_deref());
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT * FROM products
             WHERE ($1::text IS NULL OR status = $1)
               AND ($2::uuid IS NULL OR category_id = $2)
               AND ($3::text IS NULL OR name ILIKE $3 OR sku ILIKE $3)
             ORDER BY created_at DESC LIMIT $4 OFFSET $5",
        )
        .bind(status).bind(filter.category_id).bind(&pattern)
        .bind(params.limit()).bind(params.offset())
        .fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM products
             WHERE ($1::text IS NULL OR status = $1)
               AND ($2::uuid IS NULL OR category_id = $2)
               AND ($3::text IS NULL OR name ILIKE $3 OR sku ILIKE $3)",
        )
        .bind(status).bind(filter.category_id).bind(&pattern)
        .fetch_one(&self.pool).await?;
        Ok(Page::new(rows, total.0, params))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ProductRow>, sqlx::Error> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<ProductRow>, sqlx::Error> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE slug = $1")
            .bind(slug).fetch_optional(&self.pool).await
    }

    pub async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<ProductRow>, sqlx::Error> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ANY($1)")
            .bind(ids).fetch_all(&self.pool).await
    }

    pub async fn create(&self, product: &ValidProduct, extras: &ProductExtras) -> Result<ProductRow, sqlx::Error> {
        sqlx::query_as::<_, ProductRow>(
            "INSERT INTO products (id, sku, name, slug, description, price, compare_at_price, stock, status, category_id, images, tags, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, '{}', $11, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7()).bind(product.sku.as_str()).bind(&product.name).bind(product.slug.as_str())
        .bind(&extras.description).bind(product.price).bind(product.compare_at_price).bind(product.stock)
        .bind(product.status.as_str()).bind(extras.category_id).bind(&extras.tags)
        .fetch_one(&self.pool).await
    }

    pub async fn update(&self, id: Uuid, product: &ValidProduct, extras: &ProductExtras) -> Result<Option<ProductRow>, sqlx::Error> {
        sqlx::query_as::<_, ProductRow>(
            "UPDATE products SET sku = $2, name = $3, slug = $4, description = $5, price = $6, compare_at_price = $7,
                    stock = $8, status = $9, category_id = $10, tags = $11, updated_at = NOW()
             WHERE id = $1 RETURNING *",
        )
        .bind(id).bind(product.sku.as_str()).bind(&product.name).bind(product.slug.as_str())
        .bind(&extras.description).bind(product.price).bind(product.compare_at_price).bind(product.stock)
        .bind(product.status.as_str()).bind(extras.category_id).bind(&extras.tags)
        .fetch_optional(&self.pool).await
    }

    pub async fn set_images(&self, id: Uuid, images: &[String]) -> Result<Option<ProductRow>, sqlx::Error> {
        sqlx::query_as::<_, ProductRow>("UPDATE products SET images = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(id).bind(images).fetch_optional(&self.pool).await
    }

    /// Soft delete; order history keeps referencing the row.
    pub async fn archive(&self, id: Uuid) -> Result<Option<ProductRow>, sqlx::Error> {
        sqlx::query_as::<_, ProductRow>(
            "UPDATE products SET status = 'archived', images = '{}', updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id).fetch_optional(&self.pool).await
    }

    pub async fn low_stock_count(&self, threshold: i32) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE status = 'active' AND stock <= $1")
            .bind(threshold).fetch_one(&self.pool).await?;
        Ok(row.0)
    }
}

#[async_trait]
impl InventoryStore for ProductRepository {
    async fn try_decrement(&self, product_id: Uuid, quantity: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2",
        )
        .bind(product_id).bind(quantity)
        .execute(&self.pool).await?;
        debug!(%product_id, quantity, applied = result.rows_affected() == 1, "Stock decrement");
        Ok(result.rows_affected() == 1)
    }

    async fn restore(&self, product_id: Uuid, quantity: i32) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
            .bind(product_id).bind(quantity)
            .execute(&self.pool).await?;
        Ok(())
    }
}
