//! Payment gateway integration.
//!
//! Checkout creates a gateway order for the amount due; the browser completes
//! payment with the gateway and posts back `(order_id, payment_id, signature)`,
//! which is verified here with HMAC-SHA256 over `"{order_id}|{payment_id}"`.
//! The gateway also calls the webhook endpoint, signing the raw request body
//! with the webhook secret.

mod razorpay;

pub use razorpay::RazorpayGateway;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment signature is invalid")]
    InvalidSignature,

    #[error("gateway request failed: {0}")]
    Gateway(String),

    #[error("gateway is not configured")]
    NotConfigured,

    #[error("unreadable webhook payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Minor units
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> PaymentResult<GatewayOrder>;

    /// Public key id the storefront passes to the gateway's checkout widget.
    fn key_id(&self) -> &str;
}

fn sign(secret: &str, message: &[u8]) -> PaymentResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| PaymentError::NotConfigured)?;
    mac.update(message);
    Ok(mac)
}

fn verify_hex(secret: &str, message: &[u8], signature_hex: &str) -> PaymentResult<()> {
    if secret.is_empty() { return Err(PaymentError::NotConfigured); }
    let expected = hex::decode(signature_hex.trim()).map_err(|_| PaymentError::InvalidSignature)?;
    sign(secret, message)?
        .verify_slice(&expected)
        .map_err(|_| PaymentError::InvalidSignature)
}

/// Hex HMAC-SHA256 of `message`; the form the gateway signs with.
pub fn signature_for(secret: &str, message: &[u8]) -> PaymentResult<String> {
    Ok(hex::encode(sign(secret, message)?.finalize().into_bytes()))
}

pub fn verify_payment_signature(gateway_order_id: &str, payment_id: &str, signature: &str, secret: &str) -> PaymentResult<()> {
    let message = format!("{gateway_order_id}|{payment_id}");
    verify_hex(secret, message.as_bytes(), signature)
}

pub fn verify_webhook_signature(body: &[u8], signature: &str, secret: &str) -> PaymentResult<()> {
    verify_hex(secret, body, signature)
}

/// The parts of a gateway webhook this service acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentCaptured { gateway_order_id: String, payment_id: String },
    PaymentFailed { gateway_order_id: String, payment_id: String },
    Ignored(String),
}

#[derive(Deserialize)]
struct WebhookEnvelope {
    event: String,
    #[serde(default)]
    payload: Option<WebhookPayload>,
}

#[derive(Deserialize)]
struct WebhookPayload {
    payment: Option<PaymentWrapper>,
}

#[derive(Deserialize)]
struct PaymentWrapper {
    entity: PaymentEntity,
}

#[derive(Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: Option<String>,
}

impl WebhookEvent {
    pub fn parse(body: &[u8]) -> PaymentResult<Self> {
        let envelope: WebhookEnvelope = serde_json::from_slice(body)?;
        let payment = envelope
            .payload
            .and_then(|p| p.payment)
            .map(|p| p.entity)
            .and_then(|e| e.order_id.map(|order_id| (order_id, e.id)));
        Ok(match (envelope.event.as_str(), payment) {
            ("payment.captured", Some((gateway_order_id, payment_id))) => Self::PaymentCaptured { gateway_order_id, payment_id },
            ("payment.failed", Some((gateway_order_id, payment_id))) => Self::PaymentFailed { gateway_order_id, payment_id },
            _ => Self::Ignored(envelope.event),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_signature_round_trip() {
        let sig = signature_for("secret", b"order_1|pay_1").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify_payment_signature("order_1", "pay_1", &sig, "secret").is_ok());
        assert!(matches!(
            verify_payment_signature("order_1", "pay_2", &sig, "secret"),
            Err(PaymentError::InvalidSignature)
        ));
        assert!(matches!(
            verify_payment_signature("order_1", "pay_1", "zz-not-hex", "secret"),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn empty_secret_is_not_configured() {
        assert!(matches!(verify_webhook_signature(b"{}", "00", ""), Err(PaymentError::NotConfigured)));
    }

    #[test]
    fn known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            signature_for("Jefe", b"what do ya want for nothing?").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn webhook_parsing() {
        let body = br#"{"event":"payment.captured","payload":{"payment":{"entity":{"id":"pay_9","order_id":"order_7","amount":5000}}}}"#;
        assert_eq!(WebhookEvent::parse(body).unwrap(), WebhookEvent::PaymentCaptured {
            gateway_order_id: "order_7".into(), payment_id: "pay_9".into(),
        });
        let other = br#"{"event":"refund.created","payload":{}}"#;
        assert_eq!(WebhookEvent::parse(other).unwrap(), WebhookEvent::Ignored("refund.created".into()));
        assert!(WebhookEvent::parse(b"not json").is_err());
    }
}
