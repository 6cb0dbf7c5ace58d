//! Order lifecycle in the back-office: status changes and cancellation.
//!
//! Status writes are conditional on the status pair the order was read with,
//! so two requests racing on one order cannot overwrite each other: the loser
//! sees a conflict and nothing it would have done afterwards (restocking,
//! events, email) happens.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{NewOrder, OrderItemRow, OrderRepository, OrderRow, ProductRepository};
use crate::domain::aggregates::{CartItem, Order, OrderStatus, PaymentStatus};
use crate::mail;
use crate::services::checkout::{restore_stock, InventoryStore, StockLine};
use crate::state::AppState;
use crate::{EcommerceError, Result};

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Writes the order and its lines in one transaction.
    async fn insert(&self, order: &NewOrder, items: &[CartItem]) -> std::result::Result<OrderRow, sqlx::Error>;

    async fn get(&self, id: Uuid) -> std::result::Result<Option<OrderRow>, sqlx::Error>;

    async fn get_by_payment_order(&self, payment_order_id: &str) -> std::result::Result<Option<OrderRow>, sqlx::Error>;

    async fn items(&self, order_id: Uuid) -> std::result::Result<Vec<OrderItemRow>, sqlx::Error>;

    /// Sets the status pair to `next` only while the row still holds
    /// `expected`. `None` when it does not, or the order is gone.
    async fn update_state(
        &self,
        id: Uuid,
        expected: (OrderStatus, PaymentStatus),
        next: (OrderStatus, PaymentStatus),
        payment_id: Option<&str>,
    ) -> std::result::Result<Option<OrderRow>, sqlx::Error>;
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderRow,
    pub items: Vec<OrderItemRow>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: OrderStatus,
}

/// Writes the aggregate's status pair back to its row.
pub async fn persist_state(orders: &dyn OrderStore, order: &Order, payment_id: Option<&str>) -> Result<OrderRow> {
    let next = (order.status(), order.payment());
    if let Some(row) = orders.update_state(order.id(), order.loaded_state(), next, payment_id).await? {
        return Ok(row);
    }
    match orders.get(order.id()).await? {
        Some(_) => Err(EcommerceError::Conflict("order was changed by another request; reload and retry".into())),
        None => Err(EcommerceError::OrderNotFound),
    }
}

pub async fn get_detail(state: &AppState, id: Uuid) -> Result<OrderDetail> {
    let orders = OrderRepository::new(state.db.clone());
    let order = orders.get(id).await?.ok_or(EcommerceError::OrderNotFound)?;
    let items = orders.items(order.id).await?;
    Ok(OrderDetail { order, items })
}

/// Storefront order tracking; the email must match the order's.
pub async fn lookup(state: &AppState, order_number: &str, email: &str) -> Result<OrderDetail> {
    let orders = OrderRepository::new(state.db.clone());
    let order = orders
        .get_by_number(order_number.trim())
        .await?
        .filter(|o| o.customer_email.eq_ignore_ascii_case(email.trim()))
        .ok_or(EcommerceError::OrderNotFound)?;
    let items = orders.items(order.id).await?;
    Ok(OrderDetail { order, items })
}

pub async fn change_status(state: &AppState, id: Uuid, next: OrderStatus) -> Result<OrderRow> {
    if next == OrderStatus::Cancelled {
        return cancel_order(state, id).await;
    }
    let orders = OrderRepository::new(state.db.clone());
    let row = orders.get(id).await?.ok_or(EcommerceError::OrderNotFound)?;
    let mut order = row.to_aggregate()?;
    order.change_status(next)?;
    let row = persist_state(&orders, &order, None).await?;
    info!(order_number = %row.order_number, status = next.as_str(), "Order status changed");

    state.events.publish(order.take_events()).await;
    mail::send_best_effort(
        state.mailer.as_ref(),
        mail::status_changed(&row.customer_email, &row.order_number, next.as_str()),
    )
    .await;
    Ok(row)
}

pub async fn cancel_order(state: &AppState, id: Uuid) -> Result<OrderRow> {
    let orders = OrderRepository::new(state.db.clone());
    let inventory = ProductRepository::new(state.db.clone());
    let (row, mut order) = cancel_and_restock(&orders, &inventory, id).await?;

    state.events.publish(order.take_events()).await;
    mail::send_best_effort(
        state.mailer.as_ref(),
        mail::status_changed(&row.customer_email, &row.order_number, OrderStatus::Cancelled.as_str()),
    )
    .await;
    Ok(row)
}

/// Cancels the order and puts its quantities back in stock. A paid order is
/// marked refunded; the refund itself is issued from the gateway dashboard.
/// Stock is only returned once the cancellation is written.
pub async fn cancel_and_restock(
    orders: &dyn OrderStore,
    inventory: &dyn InventoryStore,
    id: Uuid,
) -> Result<(OrderRow, Order)> {
    let row = orders.get(id).await?.ok_or(EcommerceError::OrderNotFound)?;
    let mut order = row.to_aggregate()?;
    let held_stock = order.status().holds_stock();
    order.cancel()?;
    let row = persist_state(orders, &order, None).await?;

    if held_stock {
        let lines: Vec<StockLine> = orders
            .items(id)
            .await?
            .iter()
            .map(|item| StockLine { product_id: item.product_id, quantity: item.quantity })
            .collect();
        let failures = restore_stock(inventory, &lines).await;
        if failures > 0 {
            warn!(order_number = %row.order_number, failures, "Cancelled order left stock unrestored");
        }
    }
    info!(order_number = %row.order_number, payment_status = %row.payment_status, "Order cancelled");
    Ok((row, order))
}
