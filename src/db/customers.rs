use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::{like_pattern, Page, PageParams};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Customer with aggregates over their orders.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CustomerSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub customer: CustomerRow,
    pub order_count: i64,
    /// Sum of paid order totals
    pub total_spent: Decimal,
}

const SUMMARY_SELECT: &str = "
    SELECT c.*, COUNT(o.id) AS order_count,
           COALESCE(SUM(o.total) FILTER (WHERE o.payment_status = 'paid'), 0) AS total_spent
    FROM customers c LEFT JOIN orders o ON o.customer_id = c.id";

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Inserts a customer or refreshes the details of the one with this email.
    pub async fn upsert_by_email(
        &self,
        email: &str,
        name: &str,
        phone: Option<&str>,
        address: &serde_json::Value,
    ) -> Result<CustomerRow, sqlx::Error> {
        sqlx::query_as::<_, CustomerRow>(
            "INSERT INTO customers (id, email, name, phone, address, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
             ON CONFLICT (email) DO UPDATE
                SET name = EXCLUDED.name,
                    phone = COALESCE(EXCLUDED.phone, customers.phone),
                    address = EXCLUDED.address,
                    updated_at = NOW()
             RETURNING *",
        )
        .bind(Uuid::now_v7()).bind(email).bind(name).bind(phone).bind(address)
        .fetch_one(&self.pool).await
    }

    pub async fn list(&self, search: Option<&str>, params: PageParams) -> Result<Page<CustomerSummary>, sqlx::Error> {
        let pattern = like_pattern(search);
        let rows = sqlx::query_as::<_, CustomerSummary>(&format!(
            "{SUMMARY_SELECT}
             WHERE ($1::text IS NULL OR c.name ILIKE $1 OR c.email ILIKE $1)
             GROUP BY c.id ORDER BY c.created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern).bind(params.limit()).bind(params.offset())
        .fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM customers WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)",
        )
        .bind(&pattern).fetch_one(&self.pool).await?;
        Ok(Page::new(rows, total.0, params))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<CustomerSummary>, sqlx::Error> {
        sqlx::query_as::<_, CustomerSummary>(&format!("{SUMMARY_SELECT} WHERE c.id = $1 GROUP BY c.id"))
            .bind(id).fetch_optional(&self.pool).await
    }
}
