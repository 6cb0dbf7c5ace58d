//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, sku: String },
    SlugChanged { product_id: Uuid, from: String, to: String },
    Archived { product_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, order_number: String, total: Decimal },
    Paid { order_id: Uuid, payment_id: String },
    CapturedAfterCancel { order_id: Uuid, payment_id: String },
    StatusChanged { order_id: Uuid, from: String, to: String },
    Cancelled { order_id: Uuid },
}

impl DomainEvent {
    /// NATS subject the event is published on, e.g. `ecommerce.order.created`.
    pub fn subject(&self) -> String {
        let (aggregate, name) = match self {
            DomainEvent::Product(e) => ("product", match e {
                ProductEvent::Created { .. } => "created",
                ProductEvent::SlugChanged { .. } => "slug_changed",
                ProductEvent::Archived { .. } => "archived",
            }),
            DomainEvent::Order(e) => ("order", match e {
                OrderEvent::Created { .. } => "created",
                OrderEvent::Paid { .. } => "paid",
                OrderEvent::CapturedAfterCancel { .. } => "captured_after_cancel",
                OrderEvent::StatusChanged { .. } => "status_changed",
                OrderEvent::Cancelled { .. } => "cancelled",
            }),
        };
        format!("ecommerce.{aggregate}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_and_payload() {
        let id = Uuid::nil();
        let event = DomainEvent::Order(OrderEvent::Cancelled { order_id: id });
        assert_eq!(event.subject(), "ecommerce.order.cancelled");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["aggregate"], "order");
        assert_eq!(json["event"], "cancelled");
    }
}
