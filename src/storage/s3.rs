//! S3-compatible storage backend (Cloudflare R2)

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info};

use super::{ObjectStore, StorageError, StorageResult};
use crate::config::StorageConfig;

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    public_base: String,
}

impl S3ObjectStore {
    /// Builds a client from the ambient AWS credentials (`AWS_ACCESS_KEY_ID`,
    /// `AWS_SECRET_ACCESS_KEY`), pointed at the configured endpoint.
    pub async fn connect(config: &StorageConfig, bucket: &str) -> StorageResult<Self> {
        info!(bucket, endpoint = ?config.endpoint, "Initializing object storage");

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(endpoint) = &config.endpoint {
            // R2 ignores regions but the SDK requires one.
            loader = loader.endpoint_url(endpoint).region(Region::new("auto"));
        }
        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();
        let client = Client::from_conf(s3_config);

        client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| StorageError::backend(format!("Failed to access bucket {bucket}: {e}")))?;

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            public_base: config.public_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StorageResult<()> {
        debug!(key, size = body.len(), "Uploading object");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::backend(format!("Failed to upload {key}: {e}")))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self.client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StorageError::backend(format!("Failed to list {prefix}: {e}")))?;

            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_string)));

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => continuation = Some(token.to_string()),
                _ => break,
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        debug!(from, to, "Copying object");
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, from))
            .key(to)
            .send()
            .await
            .map_err(|e| StorageError::backend(format!("Failed to copy {from} to {to}: {e}")))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!(key, "Deleting object");
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::backend(format!("Failed to delete {key}: {e}")))?;
        Ok(())
    }

    fn public_base(&self) -> &str { &self.public_base }
}
