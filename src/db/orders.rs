use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::{like_pattern, Page, PageParams};
use crate::domain::aggregates::{CartItem, Order, OrderPricing, OrderStatus, PaymentStatus};
use crate::services::orders::OrderStore;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub customer_email: String,
    pub customer_name: String,
    pub status: String,
    pub payment_status: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub coupon_code: Option<String>,
    pub shipping_address: serde_json::Value,
    pub notes: Option<String>,
    pub payment_order_id: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    /// Rebuilds the aggregate so lifecycle rules can be applied to a stored order.
    pub fn to_aggregate(&self) -> Result<Order, crate::domain::aggregates::OrderError> {
        Ok(Order::restore(
            self.id,
            self.order_number.clone(),
            self.status.parse()?,
            self.payment_status.parse()?,
            self.total,
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub customer_email: String,
    pub customer_name: String,
    pub pricing: OrderPricing,
    pub currency: String,
    pub coupon_code: Option<String>,
    pub shipping_address: serde_json::Value,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DashboardSummary {
    pub order_count: i64,
    pub pending_count: i64,
    pub paid_count: i64,
    pub revenue: Decimal,
    #[sqlx(default)]
    pub low_stock_count: i64,
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn get_by_number(&self, order_number: &str) -> Result<Option<OrderRow>, sqlx::Error> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE order_number = $1")
            .bind(order_number).fetch_optional(&self.pool).await
    }

    pub async fn list(&self, filter: &OrderFilter, params: PageParams) -> Result<Page<OrderRow>, sqlx::Error> {
        let pattern = like_pattern(filter.search.as_deref());
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders
             WHERE ($1::text IS NULL OR status = $1)
               AND ($2::text IS NULL OR order_number ILIKE $2 OR customer_email ILIKE $2 OR customer_name ILIKE $2)
             ORDER BY created_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(&filter.status).bind(&pattern).bind(params.limit()).bind(params.offset())
        .fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM orders
             WHERE ($1::text IS NULL OR status = $1)
               AND ($2::text IS NULL OR order_number ILIKE $2 OR customer_email ILIKE $2 OR customer_name ILIKE $2)",
        )
        .bind(&filter.status).bind(&pattern)
        .fetch_one(&self.pool).await?;
        Ok(Page::new(rows, total.0, params))
    }

    pub async fn set_payment_order(&self, id: Uuid, payment_order_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE orders SET payment_order_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id).bind(payment_order_id).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn dashboard_summary(&self) -> Result<DashboardSummary, sqlx::Error> {
        sqlx::query_as::<_, DashboardSummary>(
            "SELECT COUNT(*) AS order_count,
                    COUNT(*) FILTER (WHERE status = 'pending') AS pending_count,
                    COUNT(*) FILTER (WHERE payment_status = 'paid') AS paid_count,
                    COALESCE(SUM(total) FILTER (WHERE payment_status = 'paid'), 0) AS revenue
             FROM orders",
        )
        .fetch_one(&self.pool).await
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    /// Writes the order and its lines in one transaction.
    async fn insert(&self, order: &NewOrder, items: &[CartItem]) -> Result<OrderRow, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, OrderRow>(
            "INSERT INTO orders (id, order_number, customer_id, customer_email, customer_name, status, payment_status,
                                 subtotal, discount, shipping, total, currency, coupon_code, shipping_address, notes,
                                 created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, 'pending', 'pending', $6, $7, $8, $9, $10, $11, $12, $13, NOW(), NOW())
             RETURNING *",
        )
        .bind(order.id).bind(&order.order_number).bind(order.customer_id).bind(&order.customer_email)
        .bind(&order.customer_name).bind(order.pricing.subtotal).bind(order.pricing.discount)
        .bind(order.pricing.shipping).bind(order.pricing.total).bind(&order.currency)
        .bind(&order.coupon_code).bind(&order.shipping_address).bind(&order.notes)
        .fetch_one(&mut *tx).await?;

        for item in items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, sku, name, quantity, unit_price, total)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(Uuid::now_v7()).bind(order.id).bind(item.product_id).bind(&item.sku).bind(&item.name)
            .bind(item.quantity as i32).bind(item.unit_price.amount()).bind(item.line_total().amount())
            .execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<OrderRow>, sqlx::Error> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await
    }

    async fn get_by_payment_order(&self, payment_order_id: &str) -> Result<Option<OrderRow>, sqlx::Error> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE payment_order_id = $1")
            .bind(payment_order_id).fetch_optional(&self.pool).await
    }

    async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItemRow>, sqlx::Error> {
        sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE order_id = $1 ORDER BY name")
            .bind(order_id).fetch_all(&self.pool).await
    }

    async fn update_state(
        &self,
        id: Uuid,
        expected: (OrderStatus, PaymentStatus),
        next: (OrderStatus, PaymentStatus),
        payment_id: Option<&str>,
    ) -> Result<Option<OrderRow>, sqlx::Error> {
        sqlx::query_as::<_, OrderRow>(
            "UPDATE orders SET status = $2, payment_status = $3, payment_id = COALESCE($4, payment_id), updated_at = NOW()
             WHERE id = $1 AND status = $5 AND payment_status = $6 RETURNING *",
        )
        .bind(id).bind(next.0.as_str()).bind(next.1.as_str()).bind(payment_id)
        .bind(expected.0.as_str()).bind(expected.1.as_str())
        .fetch_optional(&self.pool).await
    }
}
