//! Data access layer.
//!
//! One repository per table family, each holding a cloned [`PgPool`]. Queries
//! are plain SQL bound at runtime; rows map onto `sqlx::FromRow` structs that
//! double as API response bodies.

pub mod categories;
pub mod coupons;
pub mod customers;
pub mod orders;
pub mod products;
pub mod users;

pub use categories::{CategoryRepository, CategoryRow};
pub use coupons::{CouponRepository, CouponRow, CouponWrite};
pub use customers::{CustomerRepository, CustomerRow, CustomerSummary};
pub use orders::{DashboardSummary, NewOrder, OrderFilter, OrderItemRow, OrderRepository, OrderRow};
pub use products::{ProductExtras, ProductFilter, ProductRepository, ProductRow};
pub use users::{UserRepository, UserRow};

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::AppConfig;

pub async fn connect(config: &AppConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    info!(max_connections = config.database_max_connections, "Database pool ready");
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    pub fn page(&self) -> u32 { self.page.unwrap_or(1).max(1) }
    pub fn per_page(&self) -> u32 { self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE) }
    pub fn limit(&self) -> i64 { self.per_page() as i64 }
    pub fn offset(&self) -> i64 { (self.page() as i64 - 1) * self.per_page() as i64 }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, params: PageParams) -> Self {
        Self { data, total, page: params.page(), per_page: params.per_page() }
    }
}

/// `%term%` for ILIKE, with the pattern metacharacters escaped.
pub(crate) fn like_pattern(term: Option<&str>) -> Option<String> {
    term.map(str::trim).filter(|t| !t.is_empty()).map(|t| {
        let escaped = t.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        format!("%{escaped}%")
    })
}
