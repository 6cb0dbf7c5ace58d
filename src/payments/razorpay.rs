//! Razorpay orders API client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use super::{GatewayOrder, PaymentError, PaymentGateway, PaymentResult};
use crate::config::PaymentConfig;

pub struct RazorpayGateway {
    http: reqwest::Client,
    config: PaymentConfig,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

impl RazorpayGateway {
    pub fn new(config: PaymentConfig) -> PaymentResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> PaymentResult<GatewayOrder> {
        if self.config.key_id.is_empty() || self.config.key_secret.is_empty() {
            return Err(PaymentError::NotConfigured);
        }
        debug!(amount_minor, currency, receipt, "Creating gateway order");

        let response = self.http
            .post(format!("{}/orders", self.config.api_base.trim_end_matches('/')))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&CreateOrderBody { amount: amount_minor, currency, receipt })
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Gateway rejected order creation");
            return Err(PaymentError::Gateway(format!("gateway returned {status}")));
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Gateway(format!("unexpected gateway response: {e}")))?;

        Ok(GatewayOrder { id: order.id, amount: order.amount, currency: order.currency })
    }

    fn key_id(&self) -> &str { &self.config.key_id }
}
