//! Object storage for product and avatar images.
//!
//! Production uses an S3-compatible bucket (Cloudflare R2); tests and local
//! development use [`MemoryObjectStore`]. Keys are laid out as
//! `products/<slug>/<uuid>.<ext>` and `avatars/<user_id>/<uuid>.<ext>`. A
//! product's images follow it to the new prefix when its slug changes.

mod memory;
mod migrate;
mod s3;

pub use memory::MemoryObjectStore;
pub use migrate::{move_objects, rewrite_image_urls, MigrationReport};
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::domain::aggregates::image_prefix;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unsupported content type '{0}'")]
    UnsupportedMediaType(String),

    #[error("file exceeds the {limit} byte upload limit")]
    TooLarge { limit: usize },

    #[error("file is empty")]
    Empty,

    #[error("object '{0}' not found")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn backend(msg: impl Into<String>) -> Self { Self::Backend(msg.into()) }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StorageResult<()>;

    /// All keys starting with `prefix`, in lexical order.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Base URL objects are publicly served from, without a trailing slash.
    fn public_base(&self) -> &str;

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base().trim_end_matches('/'), key)
    }

    /// Inverse of [`ObjectStore::public_url`]; `None` for URLs served elsewhere.
    fn key_for_url(&self, url: &str) -> Option<String> {
        let base = self.public_base().trim_end_matches('/');
        url.strip_prefix(base)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

const ALLOWED_IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

/// Checks an uploaded image and returns the file extension to store it under.
pub fn validate_image(content_type: &str, len: usize, max_bytes: usize) -> StorageResult<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let ext = ALLOWED_IMAGE_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| StorageError::UnsupportedMediaType(content_type.to_string()))?;
    if len == 0 { return Err(StorageError::Empty); }
    if len > max_bytes { return Err(StorageError::TooLarge { limit: max_bytes }); }
    Ok(ext)
}

pub fn product_image_key(slug: &str, ext: &str) -> String {
    format!("{}{}.{}", image_prefix(slug), Uuid::new_v4(), ext)
}

pub fn avatar_key(user_id: Uuid, ext: &str) -> String {
    format!("avatars/{}/{}.{}", user_id, Uuid::new_v4(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_validation() {
        assert_eq!(validate_image("image/PNG", 10, 100).unwrap(), "png");
        assert_eq!(validate_image("image/jpeg; charset=binary", 10, 100).unwrap(), "jpg");
        assert!(matches!(validate_image("text/plain", 10, 100), Err(StorageError::UnsupportedMediaType(_))));
        assert!(matches!(validate_image("image/webp", 0, 100), Err(StorageError::Empty)));
        assert!(matches!(validate_image("image/gif", 101, 100), Err(StorageError::TooLarge { limit: 100 })));
    }

    #[test]
    fn key_layout() {
        let key = product_image_key("linen-shirt", "png");
        assert!(key.starts_with("products/linen-shirt/"));
        assert!(key.ends_with(".png"));
        let id = Uuid::nil();
        assert!(avatar_key(id, "jpg").starts_with("avatars/00000000-0000-0000-0000-000000000000/"));
    }

    #[test]
    fn url_round_trip() {
        let store = MemoryObjectStore::new("https://cdn.example.com/");
        let url = store.public_url("products/a/b.png");
        assert_eq!(url, "https://cdn.example.com/products/a/b.png");
        assert_eq!(store.key_for_url(&url).as_deref(), Some("products/a/b.png"));
        assert_eq!(store.key_for_url("https://elsewhere.com/x.png"), None);
    }
}
