use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{MailError, Mailer, OutgoingEmail};
use crate::config::MailConfig;

/// Sends through an HTTP email API (`POST {base}/emails`, bearer key).
pub struct HttpMailer {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct SendBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(config: &MailConfig, api_key: &str) -> Result<Self, MailError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MailError::Provider(e.to_string()))?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        debug!(to = %email.to, subject = %email.subject, "Sending email");
        let response = self.http
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&SendBody { from: &self.from, to: [&email.to], subject: &email.subject, text: &email.text })
            .send()
            .await
            .map_err(|e| MailError::Provider(e.to_string()))?;
        if !response.status().is_success() {
            return Err(MailError::Provider(format!("provider returned {}", response.status())));
        }
        Ok(())
    }
}
