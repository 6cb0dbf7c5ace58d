//! Order Aggregate

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled, Refunded }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed, Refunded }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Confirmed => "confirmed", Self::Processing => "processing",
            Self::Shipped => "shipped", Self::Delivered => "delivered", Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending | Confirmed | Processing, Cancelled)
                | (Confirmed | Processing | Shipped | Delivered, Refunded)
        )
    }

    /// Orders in these states still hold stock taken at checkout.
    pub fn holds_stock(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Processing)
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending, "confirmed" => Self::Confirmed, "processing" => Self::Processing,
            "shipped" => Self::Shipped, "delivered" => Self::Delivered, "cancelled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            other => return Err(OrderError::UnknownStatus(other.to_string())),
        })
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Paid => "paid", Self::Failed => "failed", Self::Refunded => "refunded" }
    }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending, "paid" => Self::Paid, "failed" => Self::Failed, "refunded" => Self::Refunded,
            other => return Err(OrderError::UnknownStatus(other.to_string())),
        })
    }
}

/// Flat-fee shipping with an optional free-shipping threshold.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShippingPolicy {
    pub flat_fee: Decimal,
    pub free_threshold: Option<Decimal>,
}

impl ShippingPolicy {
    pub fn fee_for(&self, discounted_subtotal: Decimal) -> Decimal {
        match self.free_threshold {
            Some(threshold) if discounted_subtotal >= threshold => Decimal::ZERO,
            _ => self.flat_fee,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderPricing {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl OrderPricing {
    pub fn compute(subtotal: Decimal, discount: Decimal, shipping: &ShippingPolicy) -> Self {
        let discount = discount.max(Decimal::ZERO).min(subtotal);
        let shipping = shipping.fee_for(subtotal - discount);
        Self { subtotal, discount, shipping, total: subtotal - discount + shipping }
    }
}

/// `ORD-YYYYMMDD-XXXXXX`
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}

/// Result of recording a captured payment against an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capture {
    /// The order is now paid.
    Recorded,
    /// The payment was already on record.
    Duplicate,
    /// The order was cancelled or refunded before the money arrived. The
    /// payment is flagged refunded and must be returned from the gateway.
    AfterCancel,
}

#[derive(Clone, Debug)]
pub struct Order {
    id: Uuid,
    order_number: String,
    status: OrderStatus,
    payment: PaymentStatus,
    /// Status pair as last read from storage; writes are conditional on it.
    loaded: (OrderStatus, PaymentStatus),
    total: Decimal,
    events: Vec<DomainEvent>,
}

impl Order {
    pub fn place(id: Uuid, order_number: impl Into<String>, total: Decimal) -> Self {
        let mut order = Self::restore(id, order_number, OrderStatus::Pending, PaymentStatus::Pending, total);
        order.raise_event(DomainEvent::Order(OrderEvent::Created {
            order_id: id, order_number: order.order_number.clone(), total,
        }));
        order
    }

    pub fn restore(id: Uuid, order_number: impl Into<String>, status: OrderStatus, payment: PaymentStatus, total: Decimal) -> Self {
        Self { id, order_number: order_number.into(), status, payment, loaded: (status, payment), total, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment(&self) -> PaymentStatus { self.payment }
    pub fn total(&self) -> Decimal { self.total }
    pub fn loaded_state(&self) -> (OrderStatus, PaymentStatus) { self.loaded }
    pub fn is_changed(&self) -> bool { (self.status, self.payment) != self.loaded }

    /// Records a captured payment. Capturing twice is a no-op; a capture on a
    /// cancelled or refunded order never reopens it.
    pub fn mark_paid(&mut self, payment_id: &str) -> Capture {
        if matches!(self.payment, PaymentStatus::Paid | PaymentStatus::Refunded) { return Capture::Duplicate; }
        if matches!(self.status, OrderStatus::Cancelled | OrderStatus::Refunded) {
            self.payment = PaymentStatus::Refunded;
            self.raise_event(DomainEvent::Order(OrderEvent::CapturedAfterCancel {
                order_id: self.id, payment_id: payment_id.to_string(),
            }));
            return Capture::AfterCancel;
        }
        self.payment = PaymentStatus::Paid;
        if self.status == OrderStatus::Pending { self.status = OrderStatus::Confirmed; }
        self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_id: self.id, payment_id: payment_id.to_string() }));
        Capture::Recorded
    }

    pub fn mark_payment_failed(&mut self) {
        if self.payment == PaymentStatus::Pending { self.payment = PaymentStatus::Failed; }
    }

    pub fn change_status(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        let from = self.status;
        self.status = next;
        if next == OrderStatus::Refunded && self.payment == PaymentStatus::Paid {
            self.payment = PaymentStatus::Refunded;
        }
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged {
            order_id: self.id, from: from.as_str().into(), to: next.as_str().into(),
        }));
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if !self.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(OrderError::InvalidTransition { from: self.status, to: OrderStatus::Cancelled });
        }
        self.status = OrderStatus::Cancelled;
        if self.payment == PaymentStatus::Paid { self.payment = PaymentStatus::Refunded; }
        self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("cannot move order from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("unknown status '{0}'")]
    UnknownStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_workflow() {
        let mut order = Order::place(Uuid::now_v7(), "ORD-1", dec!(20));
        assert_eq!(order.take_events().len(), 1);
        assert_eq!(order.mark_paid("pay_1"), Capture::Recorded);
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert!(order.is_changed());
        assert_eq!(order.loaded_state(), (OrderStatus::Pending, PaymentStatus::Pending));
        assert_eq!(order.mark_paid("pay_1"), Capture::Duplicate);
        order.change_status(OrderStatus::Processing).unwrap();
        order.change_status(OrderStatus::Shipped).unwrap();
        assert!(order.cancel().is_err());
        order.change_status(OrderStatus::Delivered).unwrap();
        assert_eq!(order.status(), OrderStatus::Delivered);
        order.change_status(OrderStatus::Refunded).unwrap();
        assert_eq!(order.payment(), PaymentStatus::Refunded);
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Refunded));
    }

    #[test]
    fn test_capture_after_cancel_flags_refund() {
        let mut order = Order::restore(Uuid::nil(), "ORD-2", OrderStatus::Cancelled, PaymentStatus::Pending, dec!(1));
        assert_eq!(order.mark_paid("pay_9"), Capture::AfterCancel);
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.payment(), PaymentStatus::Refunded);
        assert_eq!(order.take_events(), vec![DomainEvent::Order(OrderEvent::CapturedAfterCancel {
            order_id: Uuid::nil(), payment_id: "pay_9".into(),
        })]);
        assert_eq!(order.mark_paid("pay_9"), Capture::Duplicate);

        let mut paid_then_cancelled = Order::restore(Uuid::nil(), "ORD-4", OrderStatus::Cancelled, PaymentStatus::Refunded, dec!(1));
        assert_eq!(paid_then_cancelled.mark_paid("pay_1"), Capture::Duplicate);
        assert!(!paid_then_cancelled.is_changed());
    }

    #[test]
    fn test_cancel_paid_order_refunds_record() {
        let mut order = Order::restore(Uuid::nil(), "ORD-3", OrderStatus::Confirmed, PaymentStatus::Paid, dec!(1));
        order.cancel().unwrap();
        assert_eq!(order.payment(), PaymentStatus::Refunded);
        assert_eq!(order.take_events(), vec![DomainEvent::Order(OrderEvent::Cancelled { order_id: Uuid::nil() })]);
    }

    #[test]
    fn test_pricing_with_shipping_threshold() {
        let policy = ShippingPolicy { flat_fee: dec!(49), free_threshold: Some(dec!(500)) };
        let p = OrderPricing::compute(dec!(520), dec!(30), &policy);
        assert_eq!(p.shipping, dec!(49));
        assert_eq!(p.total, dec!(539));
        let p = OrderPricing::compute(dec!(600), dec!(50), &policy);
        assert_eq!(p.shipping, Decimal::ZERO);
        assert_eq!(p.total, dec!(550));
    }

    #[test]
    fn test_order_number_shape() {
        let n = generate_order_number(Utc::now());
        assert!(n.starts_with("ORD-"));
        assert_eq!(n.len(), "ORD-20260101-ABCDEF".len());
        assert!(n.rsplit('-').next().unwrap().chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
    }
}
