//! # Checkout
//!
//! Turns a storefront cart into an order.
//!
//! ```text
//! validate request ─► load products ─► build cart ─► apply coupon ─► price
//!        │
//!        ▼
//! upsert customer ─► deduct stock (guarded UPDATE per line)
//!        │                 │ refused / error
//!        │                 └─► restore lines already deducted, fail
//!        ▼
//! insert order + items ─► (error) restore every deducted line, fail
//!        │
//!        ▼
//! count coupon use ─► create gateway order ─► events + email
//! ```
//!
//! Stock is taken with `UPDATE ... WHERE stock >= qty`, which cannot oversell
//! a single product. The steps are not one transaction: a failure after stock
//! was taken is compensated by adding the quantities back, best effort.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::{
    CouponRepository, CustomerRepository, NewOrder, OrderRepository, OrderRow, ProductRepository, ProductRow,
};
use crate::domain::aggregates::{generate_order_number, Capture, Cart, CartItem, Order, OrderPricing};
use crate::domain::value_objects::{CouponCode, Money};
use crate::mail;
use crate::services::orders::{persist_state, OrderDetail, OrderStore};
use crate::state::AppState;
use crate::{EcommerceError, Result};

/// Upper bound on a single line's quantity.
pub const MAX_LINE_QUANTITY: u32 = 1000;

/// Payment id recorded on orders with nothing to collect.
pub const NO_CHARGE_PAYMENT_ID: &str = "no-charge";

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Takes `quantity` units if at least that many are in stock.
    async fn try_decrement(&self, product_id: Uuid, quantity: i32) -> std::result::Result<bool, sqlx::Error>;

    async fn restore(&self, product_id: Uuid, quantity: i32) -> std::result::Result<(), sqlx::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl From<&CartItem> for StockLine {
    fn from(item: &CartItem) -> Self {
        Self { product_id: item.product_id, quantity: item.quantity as i32 }
    }
}

/// Deducts every line or none: on the first refusal or error, lines already
/// taken are put back before the error is returned.
pub async fn deduct_stock(inventory: &dyn InventoryStore, lines: &[StockLine]) -> Result<Vec<StockLine>> {
    let mut deducted = Vec::with_capacity(lines.len());
    for line in lines {
        match inventory.try_decrement(line.product_id, line.quantity).await {
            Ok(true) => deducted.push(*line),
            Ok(false) => {
                restore_stock(inventory, &deducted).await;
                return Err(EcommerceError::InsufficientStock { product_id: line.product_id });
            }
            Err(e) => {
                restore_stock(inventory, &deducted).await;
                return Err(e.into());
            }
        }
    }
    Ok(deducted)
}

/// Adds quantities back. Each line is attempted independently; returns how
/// many could not be restored.
pub async fn restore_stock(inventory: &dyn InventoryStore, lines: &[StockLine]) -> usize {
    let mut failures = 0;
    for line in lines {
        if let Err(e) = inventory.restore(line.product_id, line.quantity).await {
            failures += 1;
            error!(product_id = %line.product_id, quantity = line.quantity, error = %e, "Stock restoration failed");
        }
    }
    if !lines.is_empty() {
        info!(lines = lines.len(), failures, "Stock restored");
    }
    failures
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub name: String,
    #[validate(length(max = 32, message = "is too long"))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 100, message = "must contain between 1 and 100 items"))]
    pub items: Vec<CheckoutItem>,
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub shipping_address: serde_json::Value,
    #[validate(length(max = 1000, message = "is too long"))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

impl CheckoutRequest {
    /// Checks that need no database access.
    pub fn check(&self) -> Result<Option<CouponCode>> {
        self.validate()?;
        if self.name.trim().is_empty() {
            return Err(EcommerceError::validation("name must not be blank"));
        }
        if self.items.iter().any(|i| i.quantity == 0 || i.quantity > MAX_LINE_QUANTITY) {
            return Err(EcommerceError::InvalidQuantity);
        }
        // A malformed code cannot match any stored coupon.
        self.coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| CouponCode::new(c).map_err(|_| EcommerceError::CouponNotFound))
            .transpose()
    }
}

/// What the storefront needs to open the gateway's payment widget.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentHandoff {
    pub key_id: String,
    pub gateway_order_id: String,
    /// Minor units
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order: OrderDetail,
    pub payment: Option<PaymentHandoff>,
}

/// Prices the requested lines from current catalog data. Only active
/// products can be bought.
pub fn build_cart(currency: &str, items: &[CheckoutItem], products: &HashMap<Uuid, ProductRow>) -> Result<Cart> {
    let mut cart = Cart::new(currency);
    for item in items {
        let product = products
            .get(&item.product_id)
            .filter(|p| p.is_active())
            .ok_or(EcommerceError::ProductNotFound)?;
        cart.add_item(CartItem {
            product_id: product.id,
            name: product.name.clone(),
            sku: product.sku.clone(),
            quantity: item.quantity,
            unit_price: Money::new(product.price, currency),
        })?;
    }
    for item in cart.items() {
        if item.quantity > MAX_LINE_QUANTITY { return Err(EcommerceError::InvalidQuantity); }
    }
    Ok(cart)
}

pub async fn place_order(state: &AppState, request: CheckoutRequest) -> Result<CheckoutResponse> {
    let coupon_code = request.check()?;
    let currency = state.config.currency.as_str();

    let products = ProductRepository::new(state.db.clone());
    let coupons = CouponRepository::new(state.db.clone());
    let orders = OrderRepository::new(state.db.clone());

    let ids: Vec<Uuid> = request.items.iter().map(|i| i.product_id).collect();
    let catalog: HashMap<Uuid, ProductRow> = products.get_many(&ids).await?.into_iter().map(|p| (p.id, p)).collect();
    let cart = build_cart(currency, &request.items, &catalog)?;
    let subtotal = cart.subtotal_amount();

    let coupon = match &coupon_code {
        Some(code) => {
            let row = coupons.get_by_code(code.as_str()).await?.ok_or(EcommerceError::CouponNotFound)?;
            Some(row.to_domain()?)
        }
        None => None,
    };
    let discount = match &coupon {
        Some(c) => c.apply(Utc::now(), subtotal)?.discount,
        None => Decimal::ZERO,
    };
    let pricing = OrderPricing::compute(subtotal, discount, &state.config.shipping);

    let email = request.email.trim().to_lowercase();
    let name = request.name.trim().to_string();
    let customer = CustomerRepository::new(state.db.clone())
        .upsert_by_email(&email, &name, request.phone.as_deref(), &request.shipping_address)
        .await?;

    let mut order = Order::place(Uuid::now_v7(), generate_order_number(Utc::now()), pricing.total);
    let new_order = NewOrder {
        id: order.id(),
        order_number: order.order_number().to_string(),
        customer_id: customer.id,
        customer_email: email,
        customer_name: name,
        pricing: pricing.clone(),
        currency: currency.to_string(),
        coupon_code: coupon.as_ref().map(|c| c.code.clone()),
        shipping_address: request.shipping_address.clone(),
        notes: request.notes.clone(),
    };
    let mut row = commit_order(&products, &orders, &new_order, cart.items()).await?;
    info!(order_number = %row.order_number, total = %row.total, lines = cart.item_count(), "Order placed");

    if let Some(c) = &coupon {
        match coupons.increment_usage(c.id).await {
            Ok(true) => {}
            Ok(false) => warn!(code = %c.code, order_number = %row.order_number, "Coupon limit reached during checkout; order kept"),
            Err(e) => warn!(code = %c.code, error = %e, "Failed to count coupon use"),
        }
    }

    let mut payment = None;
    if pricing.total > Decimal::ZERO {
        payment = open_payment(state, &orders, &mut row).await;
    } else {
        row = settle_without_charge(&orders, &mut order, row).await;
    }

    state.events.publish(order.take_events()).await;
    mail::send_best_effort(
        state.mailer.as_ref(),
        mail::order_received(&row.customer_email, &row.customer_name, &row.order_number, row.total, &row.currency),
    )
    .await;

    let items = orders.items(row.id).await?;
    Ok(CheckoutResponse { order: OrderDetail { order: row, items }, payment })
}

/// Takes stock for every line, then writes the order. If the write fails the
/// stock is put back before the error is returned.
pub async fn commit_order(
    inventory: &dyn InventoryStore,
    orders: &dyn OrderStore,
    new_order: &NewOrder,
    items: &[CartItem],
) -> Result<OrderRow> {
    let lines: Vec<StockLine> = items.iter().map(StockLine::from).collect();
    let deducted = deduct_stock(inventory, &lines).await?;
    match orders.insert(new_order, items).await {
        Ok(row) => Ok(row),
        Err(e) => {
            error!(order_number = %new_order.order_number, error = %e, "Order insert failed; restoring stock");
            restore_stock(inventory, &deducted).await;
            Err(e.into())
        }
    }
}

/// Marks a fully discounted order paid. The order is already committed, so a
/// failed write is logged and the pending row is returned unchanged, with no
/// `Paid` event left on `order`.
pub async fn settle_without_charge(orders: &dyn OrderStore, order: &mut Order, row: OrderRow) -> OrderRow {
    let mut paid = order.clone();
    if paid.mark_paid(NO_CHARGE_PAYMENT_ID) != Capture::Recorded {
        return row;
    }
    match persist_state(orders, &paid, Some(NO_CHARGE_PAYMENT_ID)).await {
        Ok(paid_row) => {
            *order = paid;
            paid_row
        }
        Err(e) => {
            error!(order_number = %row.order_number, error = %e, "Failed to mark zero-total order paid");
            row
        }
    }
}

/// Creates the gateway order and links it to `row`. On failure the order
/// stays pending without a gateway id.
async fn open_payment(state: &AppState, orders: &OrderRepository, row: &mut OrderRow) -> Option<PaymentHandoff> {
    let amount = match Money::new(row.total, &row.currency).to_minor_units() {
        Ok(amount) => amount,
        Err(e) => {
            error!(order_number = %row.order_number, error = %e, "Order total cannot be charged");
            return None;
        }
    };
    let gateway_order = match state.payments.create_order(amount, &row.currency, &row.order_number).await {
        Ok(g) => g,
        Err(e) => {
            warn!(order_number = %row.order_number, error = %e, "Gateway order creation failed");
            return None;
        }
    };
    if let Err(e) = orders.set_payment_order(row.id, &gateway_order.id).await {
        error!(order_number = %row.order_number, error = %e, "Failed to link gateway order");
        return None;
    }
    row.payment_order_id = Some(gateway_order.id.clone());
    Some(PaymentHandoff {
        key_id: state.payments.key_id().to_string(),
        gateway_order_id: gateway_order.id,
        amount: gateway_order.amount,
        currency: gateway_order.currency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(price: Decimal, status: &str) -> ProductRow {
        ProductRow {
            id: Uuid::now_v7(), sku: "SKU".into(), name: "Mug".into(), slug: "mug".into(), description: None,
            price, compare_at_price: None, stock: 10, status: status.into(), category_id: None,
            images: vec![], tags: vec![], created_at: Utc::now(), updated_at: Utc::now(),
        }
    }

    fn request(items: Vec<CheckoutItem>) -> CheckoutRequest {
        CheckoutRequest {
            email: "buyer@example.com".into(), name: "Buyer".into(), phone: None, items,
            coupon_code: None, shipping_address: serde_json::json!({}), notes: None,
        }
    }

    #[test]
    fn checkout_item_serializes_in_request_shape() {
        let id = Uuid::now_v7();
        let item = CheckoutItem { product_id: id, quantity: 3 };
        let json = serde_json::to_value(item).unwrap();
        assert_eq!(json, serde_json::json!({ "product_id": id, "quantity": 3 }));

        let back: CheckoutItem = serde_json::from_value(json).unwrap();
        assert_eq!((back.product_id, back.quantity), (id, 3));
    }

    #[test]
    fn cart_merges_duplicate_lines() {
        let p = product(dec!(250), "active");
        let catalog = HashMap::from([(p.id, p.clone())]);
        let items = [
            CheckoutItem { product_id: p.id, quantity: 2 },
            CheckoutItem { product_id: p.id, quantity: 1 },
        ];
        let cart = build_cart("INR", &items, &catalog).unwrap();
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.subtotal_amount(), dec!(750));
    }

    #[test]
    fn inactive_or_missing_products_are_rejected() {
        let draft = product(dec!(10), "draft");
        let catalog = HashMap::from([(draft.id, draft.clone())]);
        let items = [CheckoutItem { product_id: draft.id, quantity: 1 }];
        assert!(matches!(build_cart("INR", &items, &catalog), Err(EcommerceError::ProductNotFound)));
        let missing = [CheckoutItem { product_id: Uuid::now_v7(), quantity: 1 }];
        assert!(matches!(build_cart("INR", &missing, &catalog), Err(EcommerceError::ProductNotFound)));
    }

    #[test]
    fn request_checks() {
        let id = Uuid::now_v7();
        assert!(matches!(request(vec![]).check(), Err(EcommerceError::Validation(_))));
        assert!(matches!(
            request(vec![CheckoutItem { product_id: id, quantity: 0 }]).check(),
            Err(EcommerceError::InvalidQuantity)
        ));
        let mut bad_code = request(vec![CheckoutItem { product_id: id, quantity: 1 }]);
        bad_code.coupon_code = Some("no spaces allowed".into());
        assert!(matches!(bad_code.check(), Err(EcommerceError::CouponNotFound)));
        let mut ok = request(vec![CheckoutItem { product_id: id, quantity: 1 }]);
        ok.coupon_code = Some(" save10 ".into());
        assert_eq!(ok.check().unwrap().unwrap().as_str(), "SAVE10");
        ok.coupon_code = Some("  ".into());
        assert!(ok.check().unwrap().is_none());
    }
}
