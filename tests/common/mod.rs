//! Fakes shared by the integration tests. The Postgres pool in
//! [`test_state`] is lazy and never connects; paths that touch orders or
//! stock go through [`FakeOrders`] and [`FakeInventory`] instead.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Mutex;
use uuid::Uuid;

use opensase_storefront::auth::JwtManager;
use opensase_storefront::config::AppConfig;
use opensase_storefront::db::{NewOrder, OrderItemRow, OrderRow};
use opensase_storefront::domain::aggregates::{CartItem, OrderStatus, PaymentStatus};
use opensase_storefront::mail::LogMailer;
use opensase_storefront::payments::{GatewayOrder, PaymentGateway, PaymentResult};
use opensase_storefront::publisher::EventPublisher;
use opensase_storefront::services::checkout::InventoryStore;
use opensase_storefront::services::orders::OrderStore;
use opensase_storefront::state::AppState;
use opensase_storefront::storage::MemoryObjectStore;

pub struct FakeGateway;

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, amount_minor: i64, currency: &str, _receipt: &str) -> PaymentResult<GatewayOrder> {
        Ok(GatewayOrder { id: "order_fake".into(), amount: amount_minor, currency: currency.into() })
    }

    fn key_id(&self) -> &str { "key_test" }
}

pub fn test_state() -> AppState {
    let config = AppConfig::for_tests();
    let db = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy(&config.database_url)
        .unwrap();
    AppState {
        db,
        storage: Arc::new(MemoryObjectStore::new(config.storage.public_url.clone())),
        payments: Arc::new(FakeGateway),
        mailer: Arc::new(LogMailer),
        events: EventPublisher::disabled(),
        jwt: Arc::new(JwtManager::new(&config.jwt_secret, config.jwt_ttl_secs)),
        config: Arc::new(config),
    }
}

/// Inventory with the same guard as the SQL update: a decrement applies only
/// when enough units remain.
#[derive(Default)]
pub struct FakeInventory {
    stock: Mutex<HashMap<Uuid, i32>>,
    pub broken: HashSet<Uuid>,
}

impl FakeInventory {
    pub fn with(levels: &[(Uuid, i32)]) -> Self {
        Self { stock: Mutex::new(levels.iter().copied().collect()), broken: HashSet::new() }
    }

    pub async fn level(&self, id: Uuid) -> i32 {
        self.stock.lock().await.get(&id).copied().unwrap_or_default()
    }
}

#[async_trait]
impl InventoryStore for FakeInventory {
    async fn try_decrement(&self, product_id: Uuid, quantity: i32) -> Result<bool, sqlx::Error> {
        if self.broken.contains(&product_id) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let mut stock = self.stock.lock().await;
        match stock.get_mut(&product_id) {
            Some(level) if *level >= quantity => {
                *level -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore(&self, product_id: Uuid, quantity: i32) -> Result<(), sqlx::Error> {
        if self.broken.contains(&product_id) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        *self.stock.lock().await.entry(product_id).or_default() += quantity;
        Ok(())
    }
}

/// Orders table with the same conditional state write as the SQL update.
#[derive(Default)]
pub struct FakeOrders {
    rows: Mutex<HashMap<Uuid, OrderRow>>,
    items: Mutex<HashMap<Uuid, Vec<OrderItemRow>>>,
    fail_insert: bool,
    /// Written to the row just before the next state update, as if another
    /// request had changed the order in between.
    interleaved: Mutex<Option<(OrderStatus, PaymentStatus)>>,
}

impl FakeOrders {
    pub async fn with(row: OrderRow, items: Vec<OrderItemRow>) -> Self {
        let orders = Self::default();
        orders.items.lock().await.insert(row.id, items);
        orders.rows.lock().await.insert(row.id, row);
        orders
    }

    pub fn failing_inserts() -> Self {
        Self { fail_insert: true, ..Default::default() }
    }

    pub async fn interleave(&self, status: OrderStatus, payment: PaymentStatus) {
        *self.interleaved.lock().await = Some((status, payment));
    }

    pub async fn row(&self, id: Uuid) -> Option<OrderRow> {
        self.rows.lock().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait]
impl OrderStore for FakeOrders {
    async fn insert(&self, order: &NewOrder, items: &[CartItem]) -> Result<OrderRow, sqlx::Error> {
        if self.fail_insert {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let row = OrderRow {
            id: order.id,
            order_number: order.order_number.clone(),
            customer_id: order.customer_id,
            customer_email: order.customer_email.clone(),
            customer_name: order.customer_name.clone(),
            status: "pending".into(),
            payment_status: "pending".into(),
            subtotal: order.pricing.subtotal,
            discount: order.pricing.discount,
            shipping: order.pricing.shipping,
            total: order.pricing.total,
            currency: order.currency.clone(),
            coupon_code: order.coupon_code.clone(),
            shipping_address: order.shipping_address.clone(),
            notes: order.notes.clone(),
            payment_order_id: None,
            payment_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let lines = items
            .iter()
            .map(|item| item_row(order.id, item.product_id, item.quantity as i32, item.unit_price.amount()))
            .collect();
        self.items.lock().await.insert(order.id, lines);
        self.rows.lock().await.insert(order.id, row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<OrderRow>, sqlx::Error> {
        Ok(self.row(id).await)
    }

    async fn get_by_payment_order(&self, payment_order_id: &str) -> Result<Option<OrderRow>, sqlx::Error> {
        Ok(self
            .rows
            .lock()
            .await
            .values()
            .find(|r| r.payment_order_id.as_deref() == Some(payment_order_id))
            .cloned())
    }

    async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItemRow>, sqlx::Error> {
        Ok(self.items.lock().await.get(&order_id).cloned().unwrap_or_default())
    }

    async fn update_state(
        &self,
        id: Uuid,
        expected: (OrderStatus, PaymentStatus),
        next: (OrderStatus, PaymentStatus),
        payment_id: Option<&str>,
    ) -> Result<Option<OrderRow>, sqlx::Error> {
        let mut rows = self.rows.lock().await;
        let Some(row) = rows.get_mut(&id) else { return Ok(None) };
        if let Some((status, payment)) = self.interleaved.lock().await.take() {
            row.status = status.as_str().into();
            row.payment_status = payment.as_str().into();
        }
        if row.status != expected.0.as_str() || row.payment_status != expected.1.as_str() {
            return Ok(None);
        }
        row.status = next.0.as_str().into();
        row.payment_status = next.1.as_str().into();
        if let Some(payment_id) = payment_id {
            row.payment_id = Some(payment_id.to_string());
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }
}

pub fn order_row(status: OrderStatus, payment: PaymentStatus, payment_order_id: Option<&str>) -> OrderRow {
    OrderRow {
        id: Uuid::now_v7(),
        order_number: "ORD-20260101-TEST01".into(),
        customer_id: Uuid::now_v7(),
        customer_email: "buyer@example.com".into(),
        customer_name: "Buyer".into(),
        status: status.as_str().into(),
        payment_status: payment.as_str().into(),
        subtotal: Decimal::new(900, 0),
        discount: Decimal::ZERO,
        shipping: Decimal::ZERO,
        total: Decimal::new(900, 0),
        currency: "INR".into(),
        coupon_code: None,
        shipping_address: serde_json::json!({}),
        notes: None,
        payment_order_id: payment_order_id.map(str::to_string),
        payment_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn item_row(order_id: Uuid, product_id: Uuid, quantity: i32, unit_price: Decimal) -> OrderItemRow {
    OrderItemRow {
        id: Uuid::now_v7(),
        order_id,
        product_id,
        sku: "SKU".into(),
        name: "Item".into(),
        quantity,
        unit_price,
        total: unit_price * Decimal::from(quantity),
    }
}
