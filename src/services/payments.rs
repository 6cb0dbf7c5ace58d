//! Payment confirmation from the storefront callback and the gateway webhook.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::{OrderRepository, OrderRow};
use crate::domain::aggregates::Capture;
use crate::mail;
use crate::payments::{verify_payment_signature, verify_webhook_signature, PaymentError, WebhookEvent};
use crate::services::orders::{persist_state, OrderStore};
use crate::state::AppState;
use crate::{EcommerceError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    pub order_id: Uuid,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub gateway_order_id: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub payment_id: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub signature: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Paid { order_number: String },
    AlreadyPaid { order_number: String },
    /// Money arrived for an order that was already cancelled; it is recorded
    /// and flagged for a manual refund.
    CapturedAfterCancel { order_number: String },
    PaymentFailed { order_number: String },
    UnknownOrder,
    Ignored { event: String },
}

pub async fn confirm_payment(state: &AppState, request: VerifyPaymentRequest) -> Result<OrderRow> {
    request.validate()?;
    verify_payment_signature(
        &request.gateway_order_id,
        &request.payment_id,
        &request.signature,
        &state.config.payment.key_secret,
    )?;

    let orders = OrderRepository::new(state.db.clone());
    let row = orders.get(request.order_id).await?.ok_or(EcommerceError::OrderNotFound)?;
    if row.payment_order_id.as_deref() != Some(request.gateway_order_id.as_str()) {
        warn!(order_number = %row.order_number, "Payment signed for a different gateway order");
        return Err(PaymentError::InvalidSignature.into());
    }
    let (row, _) = record_payment(state, &orders, row, &request.payment_id).await?;
    Ok(row)
}

pub async fn handle_webhook(state: &AppState, body: &[u8], signature: &str) -> Result<WebhookOutcome> {
    handle_webhook_with(state, &OrderRepository::new(state.db.clone()), body, signature).await
}

/// Webhook handling against an explicit order store. Nothing is read before
/// the signature checks out.
pub async fn handle_webhook_with(
    state: &AppState,
    orders: &dyn OrderStore,
    body: &[u8],
    signature: &str,
) -> Result<WebhookOutcome> {
    verify_webhook_signature(body, signature, &state.config.payment.webhook_secret)?;

    match WebhookEvent::parse(body)? {
        WebhookEvent::PaymentCaptured { gateway_order_id, payment_id } => {
            let Some(row) = orders.get_by_payment_order(&gateway_order_id).await? else {
                warn!(%gateway_order_id, "Captured payment for unknown order");
                return Ok(WebhookOutcome::UnknownOrder);
            };
            let (row, capture) = record_payment(state, orders, row, &payment_id).await?;
            let order_number = row.order_number;
            Ok(match capture {
                Capture::Recorded => WebhookOutcome::Paid { order_number },
                Capture::Duplicate => WebhookOutcome::AlreadyPaid { order_number },
                Capture::AfterCancel => WebhookOutcome::CapturedAfterCancel { order_number },
            })
        }
        WebhookEvent::PaymentFailed { gateway_order_id, payment_id } => {
            let Some(row) = orders.get_by_payment_order(&gateway_order_id).await? else {
                warn!(%gateway_order_id, "Failed payment for unknown order");
                return Ok(WebhookOutcome::UnknownOrder);
            };
            let mut order = row.to_aggregate()?;
            order.mark_payment_failed();
            let row = if order.is_changed() { persist_state(orders, &order, None).await? } else { row };
            info!(order_number = %row.order_number, %payment_id, "Payment failed");
            Ok(WebhookOutcome::PaymentFailed { order_number: row.order_number })
        }
        WebhookEvent::Ignored(event) => Ok(WebhookOutcome::Ignored { event }),
    }
}

/// Attempts at writing a capture before giving up on a busy order.
const CAPTURE_WRITE_ATTEMPTS: usize = 3;

/// Records the captured payment on the order. The callback and the webhook
/// both arrive for the same payment; whichever writes second sees
/// [`Capture::Duplicate`] and does nothing. A lost write race is retried
/// against the re-read row.
async fn record_payment(
    state: &AppState,
    orders: &dyn OrderStore,
    mut row: OrderRow,
    payment_id: &str,
) -> Result<(OrderRow, Capture)> {
    for _ in 0..CAPTURE_WRITE_ATTEMPTS {
        let mut order = row.to_aggregate()?;
        let capture = order.mark_paid(payment_id);
        if capture == Capture::Duplicate {
            return Ok((row, capture));
        }
        let next = (order.status(), order.payment());
        let Some(updated) = orders.update_state(order.id(), order.loaded_state(), next, Some(payment_id)).await? else {
            row = orders.get(order.id()).await?.ok_or(EcommerceError::OrderNotFound)?;
            continue;
        };

        state.events.publish(order.take_events()).await;
        match capture {
            Capture::AfterCancel => {
                error!(order_number = %updated.order_number, %payment_id, "Payment captured for a cancelled order; refund it from the gateway");
            }
            _ => {
                info!(order_number = %updated.order_number, %payment_id, "Payment captured");
                mail::send_best_effort(
                    state.mailer.as_ref(),
                    mail::payment_confirmed(&updated.customer_email, &updated.order_number, updated.total, &updated.currency),
                )
                .await;
            }
        }
        return Ok((updated, capture));
    }
    warn!(order_number = %row.order_number, %payment_id, "Order kept changing while recording payment");
    Err(EcommerceError::Conflict("order was changed by another request; retry".into()))
}
