//! Transactional email.

mod http;

pub use http::HttpMailer;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail provider request failed: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "Email not sent (no mail provider configured)");
        Ok(())
    }
}

/// Sends inline and logs failures; an order never fails because of email.
pub async fn send_best_effort(mailer: &dyn Mailer, email: OutgoingEmail) {
    let to = email.to.clone();
    let subject = email.subject.clone();
    if let Err(e) = mailer.send(email).await {
        warn!(%to, %subject, error = %e, "Failed to send email");
    }
}

pub fn order_received(to: &str, customer_name: &str, order_number: &str, total: Decimal, currency: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("We received your order {order_number}"),
        text: format!(
            "Hi {customer_name},\n\nThanks for shopping with us. Your order {order_number} \
             for {currency} {total:.2} has been received and is awaiting payment.\n"
        ),
    }
}

pub fn payment_confirmed(to: &str, order_number: &str, total: Decimal, currency: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Payment confirmed for order {order_number}"),
        text: format!(
            "Your payment of {currency} {total:.2} for order {order_number} was successful. \
             We will let you know when it ships.\n"
        ),
    }
}

pub fn status_changed(to: &str, order_number: &str, status: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Order {order_number} is now {status}"),
        text: format!("The status of your order {order_number} changed to: {status}.\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_order_number_and_total() {
        let email = order_received("a@b.co", "Asha", "ORD-1", Decimal::new(149950, 2), "INR");
        assert_eq!(email.subject, "We received your order ORD-1");
        assert!(email.text.contains("INR 1499.50"));
        assert!(payment_confirmed("a@b.co", "ORD-1", Decimal::new(5, 0), "INR").text.contains("INR 5.00"));
        assert_eq!(status_changed("a@b.co", "ORD-1", "shipped").subject, "Order ORD-1 is now shipped");
    }
}
