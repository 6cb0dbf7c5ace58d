use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use tracing::info;

use crate::api::{ApiResult, AppJson};
use crate::db::OrderRow;
use crate::payments::PaymentError;
use crate::services::payments::{self, VerifyPaymentRequest, WebhookOutcome};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

pub async fn verify(State(s): State<AppState>, AppJson(r): AppJson<VerifyPaymentRequest>) -> ApiResult<Json<OrderRow>> {
    Ok(Json(payments::confirm_payment(&s, r).await?))
}

/// Takes the raw body; the signature covers the exact bytes sent.
pub async fn webhook(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<Json<WebhookOutcome>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(PaymentError::InvalidSignature)?;
    let outcome = payments::handle_webhook(&s, &body, signature).await?;
    info!(?outcome, "Webhook handled");
    Ok(Json(outcome))
}
