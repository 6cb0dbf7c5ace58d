//! In-process object store

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use super::{ObjectStore, StorageError, StorageResult};

#[derive(Clone, Debug)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryObjectStore {
    public_base: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    failing_copies: RwLock<HashSet<String>>,
}

impl MemoryObjectStore {
    pub fn new(public_base: impl Into<String>) -> Self {
        Self { public_base: public_base.into(), ..Default::default() }
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize { self.objects.read().await.len() }

    pub async fn is_empty(&self) -> bool { self.objects.read().await.is_empty() }

    /// Makes every later `copy` from `key` fail, to exercise partial migrations.
    pub async fn fail_copies_from(&self, key: &str) {
        self.failing_copies.write().await.insert(key.to_string());
    }

    pub async fn clear_copy_failures(&self) {
        self.failing_copies.write().await.clear();
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StorageResult<()> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject { body, content_type: content_type.to_string() },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self.objects.read().await
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        if self.failing_copies.read().await.contains(from) {
            return Err(StorageError::backend(format!("injected copy failure for {from}")));
        }
        let mut objects = self.objects.write().await;
        let object = objects.get(from).cloned().ok_or_else(|| StorageError::NotFound(from.to_string()))?;
        objects.insert(to.to_string(), object);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    fn public_base(&self) -> &str { &self.public_base }
}
