//! Order writes and their stock side effects, driven through in-memory
//! order and inventory stores.

mod common;

use rstest::rstest;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use common::{item_row, order_row, test_state, FakeInventory, FakeOrders};
use opensase_storefront::db::{NewOrder, OrderRow};
use opensase_storefront::domain::aggregates::{CartItem, Order, OrderPricing, OrderStatus, PaymentStatus};
use opensase_storefront::domain::events::{DomainEvent, OrderEvent};
use opensase_storefront::domain::value_objects::Money;
use opensase_storefront::payments::signature_for;
use opensase_storefront::services::checkout::{commit_order, settle_without_charge, NO_CHARGE_PAYMENT_ID};
use opensase_storefront::services::orders::{cancel_and_restock, OrderStore};
use opensase_storefront::services::payments::{handle_webhook_with, WebhookOutcome};
use opensase_storefront::state::AppState;
use opensase_storefront::EcommerceError;

fn cart_item(product_id: Uuid, quantity: u32) -> CartItem {
    CartItem {
        product_id,
        name: "Item".into(),
        sku: "SKU".into(),
        quantity,
        unit_price: Money::new(Decimal::new(300, 0), "INR"),
    }
}

fn new_order(total: Decimal) -> NewOrder {
    NewOrder {
        id: Uuid::now_v7(),
        order_number: "ORD-20260101-NEW001".into(),
        customer_id: Uuid::now_v7(),
        customer_email: "buyer@example.com".into(),
        customer_name: "Buyer".into(),
        pricing: OrderPricing { subtotal: total, discount: Decimal::ZERO, shipping: Decimal::ZERO, total },
        currency: "INR".into(),
        coupon_code: None,
        shipping_address: json!({}),
        notes: None,
    }
}

mod commit {
    use super::*;

    #[rstest]
    #[tokio::test]
    async fn takes_stock_and_writes_the_order() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let inventory = FakeInventory::with(&[(a, 5), (b, 3)]);
        let orders = FakeOrders::default();

        let row = commit_order(&inventory, &orders, &new_order(Decimal::new(1500, 0)), &[cart_item(a, 2), cart_item(b, 3)])
            .await
            .unwrap();

        assert_eq!(row.status, "pending");
        assert_eq!(orders.len().await, 1);
        assert_eq!(inventory.level(a).await, 3);
        assert_eq!(inventory.level(b).await, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_insert_puts_every_line_back() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let inventory = FakeInventory::with(&[(a, 5), (b, 3)]);
        let orders = FakeOrders::failing_inserts();

        let err = commit_order(&inventory, &orders, &new_order(Decimal::new(1500, 0)), &[cart_item(a, 2), cart_item(b, 3)])
            .await
            .unwrap_err();

        assert!(matches!(err, EcommerceError::Database(_)));
        assert_eq!(orders.len().await, 0);
        assert_eq!(inventory.level(a).await, 5);
        assert_eq!(inventory.level(b).await, 3);
    }

    #[rstest]
    #[tokio::test]
    async fn refused_stock_writes_nothing() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let inventory = FakeInventory::with(&[(a, 5), (b, 1)]);
        let orders = FakeOrders::default();

        let err = commit_order(&inventory, &orders, &new_order(Decimal::new(900, 0)), &[cart_item(a, 1), cart_item(b, 2)])
            .await
            .unwrap_err();

        assert!(matches!(err, EcommerceError::InsufficientStock { product_id } if product_id == b));
        assert_eq!(orders.len().await, 0);
        assert_eq!(inventory.level(a).await, 5);
    }
}

mod zero_total {
    use super::*;

    async fn committed() -> (Order, OrderRow, FakeOrders) {
        let new_order = new_order(Decimal::ZERO);
        let order = Order::place(new_order.id, new_order.order_number.clone(), Decimal::ZERO);
        let orders = FakeOrders::default();
        let row = orders.insert(&new_order, &[]).await.unwrap();
        (order, row, orders)
    }

    fn paid_events(order: &mut Order) -> usize {
        order
            .take_events()
            .iter()
            .filter(|e| matches!(e, DomainEvent::Order(OrderEvent::Paid { .. })))
            .count()
    }

    #[rstest]
    #[tokio::test]
    async fn is_marked_paid_without_a_gateway() {
        let (mut order, row, orders) = committed().await;

        let row = settle_without_charge(&orders, &mut order, row).await;

        assert_eq!((row.status.as_str(), row.payment_status.as_str()), ("confirmed", "paid"));
        assert_eq!(row.payment_id.as_deref(), Some(NO_CHARGE_PAYMENT_ID));
        assert_eq!(paid_events(&mut order), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_write_keeps_the_committed_order() {
        let (mut order, row, orders) = committed().await;
        orders.interleave(OrderStatus::Cancelled, PaymentStatus::Pending).await;

        let row = settle_without_charge(&orders, &mut order, row).await;

        assert_eq!((row.status.as_str(), row.payment_status.as_str()), ("pending", "pending"));
        assert_eq!(order.payment(), PaymentStatus::Pending);
        assert_eq!(paid_events(&mut order), 0);
    }
}

mod cancel {
    use super::*;

    async fn placed(status: OrderStatus, payment: PaymentStatus, product: Uuid, quantity: i32) -> (Uuid, FakeOrders) {
        let row = order_row(status, payment, None);
        let id = row.id;
        let items = vec![item_row(id, product, quantity, Decimal::new(300, 0))];
        (id, FakeOrders::with(row, items).await)
    }

    #[rstest]
    #[tokio::test]
    async fn returns_held_stock() {
        let product = Uuid::now_v7();
        let inventory = FakeInventory::with(&[(product, 3)]);
        let (id, orders) = placed(OrderStatus::Pending, PaymentStatus::Pending, product, 2).await;

        let (row, _) = cancel_and_restock(&orders, &inventory, id).await.unwrap();

        assert_eq!(row.status, "cancelled");
        assert_eq!(row.payment_status, "pending");
        assert_eq!(inventory.level(product).await, 5);
    }

    #[rstest]
    #[tokio::test]
    async fn paid_order_is_marked_refunded() {
        let product = Uuid::now_v7();
        let inventory = FakeInventory::with(&[(product, 0)]);
        let (id, orders) = placed(OrderStatus::Confirmed, PaymentStatus::Paid, product, 1).await;

        let (row, _) = cancel_and_restock(&orders, &inventory, id).await.unwrap();

        assert_eq!(row.payment_status, "refunded");
        assert_eq!(inventory.level(product).await, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn shipped_order_cannot_be_cancelled() {
        let product = Uuid::now_v7();
        let inventory = FakeInventory::with(&[(product, 0)]);
        let (id, orders) = placed(OrderStatus::Shipped, PaymentStatus::Paid, product, 1).await;

        let err = cancel_and_restock(&orders, &inventory, id).await.unwrap_err();

        assert!(matches!(err, EcommerceError::Order(_)));
        assert_eq!(inventory.level(product).await, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn losing_a_race_restores_nothing() {
        let product = Uuid::now_v7();
        let inventory = FakeInventory::with(&[(product, 3)]);
        let (id, orders) = placed(OrderStatus::Pending, PaymentStatus::Pending, product, 2).await;
        orders.interleave(OrderStatus::Cancelled, PaymentStatus::Pending).await;

        let err = cancel_and_restock(&orders, &inventory, id).await.unwrap_err();

        assert!(matches!(err, EcommerceError::Conflict(_)));
        assert_eq!(inventory.level(product).await, 3);
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let inventory = FakeInventory::default();
        let orders = FakeOrders::default();
        let err = cancel_and_restock(&orders, &inventory, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, EcommerceError::OrderNotFound));
    }
}

mod webhook {
    use super::*;

    const GATEWAY_ORDER: &str = "order_gw_1";

    fn payment_event(event: &str, payment_id: &str) -> Vec<u8> {
        json!({
            "event": event,
            "payload": { "payment": { "entity": { "id": payment_id, "order_id": GATEWAY_ORDER } } }
        })
        .to_string()
        .into_bytes()
    }

    async fn deliver(state: &AppState, orders: &FakeOrders, body: &[u8]) -> WebhookOutcome {
        let signature = signature_for(&state.config.payment.webhook_secret, body).unwrap();
        handle_webhook_with(state, orders, body, &signature).await.unwrap()
    }

    async fn with_order(status: OrderStatus, payment: PaymentStatus) -> (Uuid, String, FakeOrders) {
        let row = order_row(status, payment, Some(GATEWAY_ORDER));
        let (id, number) = (row.id, row.order_number.clone());
        (id, number, FakeOrders::with(row, vec![]).await)
    }

    #[rstest]
    #[tokio::test]
    async fn capture_confirms_a_pending_order() {
        let state = test_state();
        let (id, order_number, orders) = with_order(OrderStatus::Pending, PaymentStatus::Pending).await;

        let outcome = deliver(&state, &orders, &payment_event("payment.captured", "pay_1")).await;

        assert_eq!(outcome, WebhookOutcome::Paid { order_number });
        let row = orders.row(id).await.unwrap();
        assert_eq!((row.status.as_str(), row.payment_status.as_str()), ("confirmed", "paid"));
        assert_eq!(row.payment_id.as_deref(), Some("pay_1"));
    }

    #[rstest]
    #[tokio::test]
    async fn repeated_capture_is_acknowledged_once() {
        let state = test_state();
        let (_, order_number, orders) = with_order(OrderStatus::Pending, PaymentStatus::Pending).await;
        let body = payment_event("payment.captured", "pay_1");

        deliver(&state, &orders, &body).await;
        let outcome = deliver(&state, &orders, &body).await;

        assert_eq!(outcome, WebhookOutcome::AlreadyPaid { order_number });
    }

    #[rstest]
    #[tokio::test]
    async fn capture_on_cancelled_order_is_recorded_for_refund() {
        let state = test_state();
        let (id, order_number, orders) = with_order(OrderStatus::Cancelled, PaymentStatus::Pending).await;

        let outcome = deliver(&state, &orders, &payment_event("payment.captured", "pay_late")).await;

        assert_eq!(outcome, WebhookOutcome::CapturedAfterCancel { order_number });
        let row = orders.row(id).await.unwrap();
        assert_eq!((row.status.as_str(), row.payment_status.as_str()), ("cancelled", "refunded"));
        assert_eq!(row.payment_id.as_deref(), Some("pay_late"));
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({ "outcome": "captured_after_cancel", "order_number": "ORD-20260101-TEST01" })
        );
    }

    #[rstest]
    #[tokio::test]
    async fn capture_racing_a_cancel_never_reopens_the_order() {
        let state = test_state();
        let (id, order_number, orders) = with_order(OrderStatus::Pending, PaymentStatus::Pending).await;
        orders.interleave(OrderStatus::Cancelled, PaymentStatus::Pending).await;

        let outcome = deliver(&state, &orders, &payment_event("payment.captured", "pay_1")).await;

        assert_eq!(outcome, WebhookOutcome::CapturedAfterCancel { order_number });
        let row = orders.row(id).await.unwrap();
        assert_eq!((row.status.as_str(), row.payment_status.as_str()), ("cancelled", "refunded"));
    }

    #[rstest]
    #[tokio::test]
    async fn capture_racing_the_callback_is_a_duplicate() {
        let state = test_state();
        let (_, order_number, orders) = with_order(OrderStatus::Pending, PaymentStatus::Pending).await;
        orders.interleave(OrderStatus::Confirmed, PaymentStatus::Paid).await;

        let outcome = deliver(&state, &orders, &payment_event("payment.captured", "pay_1")).await;

        assert_eq!(outcome, WebhookOutcome::AlreadyPaid { order_number });
    }

    #[rstest]
    #[tokio::test]
    async fn failed_payment_is_recorded() {
        let state = test_state();
        let (id, order_number, orders) = with_order(OrderStatus::Pending, PaymentStatus::Pending).await;

        let outcome = deliver(&state, &orders, &payment_event("payment.failed", "pay_2")).await;

        assert_eq!(outcome, WebhookOutcome::PaymentFailed { order_number });
        let row = orders.row(id).await.unwrap();
        assert_eq!((row.status.as_str(), row.payment_status.as_str()), ("pending", "failed"));
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_gateway_order_is_acknowledged() {
        let state = test_state();
        let orders = FakeOrders::default();

        let outcome = deliver(&state, &orders, &payment_event("payment.captured", "pay_1")).await;

        assert_eq!(outcome, WebhookOutcome::UnknownOrder);
    }
}
