//! Shared application state handed to every handler.

use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::JwtManager;
use crate::config::AppConfig;
use crate::mail::{HttpMailer, LogMailer, Mailer};
use crate::payments::{PaymentGateway, RazorpayGateway};
use crate::publisher::EventPublisher;
use crate::storage::{MemoryObjectStore, ObjectStore, S3ObjectStore};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn ObjectStore>,
    pub payments: Arc<dyn PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
    pub events: EventPublisher,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    /// Wires the external integrations named in `config`, falling back to
    /// in-process implementations for storage and mail when they are unset.
    pub async fn build(config: AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let storage: Arc<dyn ObjectStore> = match &config.storage.bucket {
            Some(bucket) => Arc::new(S3ObjectStore::connect(&config.storage, bucket).await?),
            None => {
                warn!("R2_BUCKET not set; images are kept in memory");
                Arc::new(MemoryObjectStore::new(config.storage.public_url.clone()))
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.mail.api_key {
            Some(key) => Arc::new(HttpMailer::new(&config.mail, key)?),
            None => Arc::new(LogMailer),
        };

        let events = match &config.nats_url {
            Some(url) => match async_nats::connect(url).await {
                Ok(client) => {
                    info!(%url, "Connected to NATS");
                    EventPublisher::new(Some(client))
                }
                Err(e) => {
                    warn!(%url, error = %e, "NATS unavailable; events will only be logged");
                    EventPublisher::disabled()
                }
            },
            None => EventPublisher::disabled(),
        };

        let payments: Arc<dyn PaymentGateway> = Arc::new(RazorpayGateway::new(config.payment.clone())?);
        let jwt = Arc::new(JwtManager::new(&config.jwt_secret, config.jwt_ttl_secs));

        Ok(Self { db, config: Arc::new(config), storage, payments, mailer, events, jwt })
    }
}
