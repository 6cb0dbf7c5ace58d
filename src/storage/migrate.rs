//! Moving a product's images when its slug changes.
//!
//! Object stores have no rename, so each object is copied under the new
//! prefix and the original deleted. Objects are moved one at a time; a failed
//! copy leaves the original in place and is reported, so the product keeps a
//! working URL for it. The caller passes the keys to move, so an object left
//! behind by an earlier rename is picked up again on the next one.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

use super::ObjectStore;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// `(old_key, new_key)` for every object now living under the new prefix
    pub moved: Vec<(String, String)>,
    /// Keys that could not be copied and stay where they were
    pub failed: Vec<String>,
}

impl MigrationReport {
    pub fn is_complete(&self) -> bool { self.failed.is_empty() }
}

/// Moves each key to `to_prefix`, keeping its file name. Keys already under
/// `to_prefix` are left alone.
pub async fn move_objects(store: &dyn ObjectStore, keys: &[String], to_prefix: &str) -> MigrationReport {
    let mut report = MigrationReport::default();
    for old_key in keys {
        if old_key.starts_with(to_prefix) { continue; }
        let file_name = old_key.rsplit('/').next().unwrap_or(old_key);
        let new_key = format!("{to_prefix}{file_name}");
        if let Err(e) = store.copy(old_key, &new_key).await {
            warn!(key = %old_key, error = %e, "Image copy failed; keeping original");
            report.failed.push(old_key.clone());
            continue;
        }
        // The copy exists, so the image is reachable under its new key even if
        // the old object lingers.
        if let Err(e) = store.delete(old_key).await {
            warn!(key = %old_key, error = %e, "Failed to delete migrated image");
        }
        report.moved.push((old_key.clone(), new_key));
    }

    info!(to = to_prefix, moved = report.moved.len(), failed = report.failed.len(), "Images moved");
    report
}

/// Points stored image URLs at their migrated keys. URLs for keys that were
/// not moved, or that are hosted elsewhere, are returned unchanged.
pub fn rewrite_image_urls(store: &dyn ObjectStore, urls: &[String], report: &MigrationReport) -> Vec<String> {
    let moved: HashMap<&str, &str> = report.moved.iter().map(|(o, n)| (o.as_str(), n.as_str())).collect();
    urls.iter()
        .map(|url| {
            store
                .key_for_url(url)
                .and_then(|key| moved.get(key.as_str()).map(|new_key| store.public_url(new_key)))
                .unwrap_or_else(|| url.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryObjectStore;
    use bytes::Bytes;

    async fn seeded() -> MemoryObjectStore {
        let store = MemoryObjectStore::new("https://cdn.test");
        for key in ["products/old/a.png", "products/old/b.jpg", "products/older/c.png"] {
            store.put(key, Bytes::from_static(b"img"), "image/png").await.unwrap();
        }
        store
    }

    fn keys(list: &[&str]) -> Vec<String> { list.iter().map(|k| k.to_string()).collect() }

    #[tokio::test]
    async fn moves_only_the_given_keys() {
        let store = seeded().await;
        let report = move_objects(&store, &keys(&["products/old/a.png", "products/old/b.jpg"]), "products/new/").await;
        assert!(report.is_complete());
        assert_eq!(report.moved.len(), 2);
        assert_eq!(store.list("products/new/").await.unwrap(), vec!["products/new/a.png", "products/new/b.jpg"]);
        assert!(store.list("products/old/").await.unwrap().is_empty());
        assert!(store.get("products/older/c.png").await.is_some());
    }

    #[tokio::test]
    async fn failed_copy_keeps_original_and_url() {
        let store = seeded().await;
        store.fail_copies_from("products/old/b.jpg").await;
        let report = move_objects(&store, &keys(&["products/old/a.png", "products/old/b.jpg"]), "products/new/").await;
        assert_eq!(report.failed, vec!["products/old/b.jpg".to_string()]);
        assert!(store.get("products/old/b.jpg").await.is_some());

        let urls = vec![
            "https://cdn.test/products/old/a.png".to_string(),
            "https://cdn.test/products/old/b.jpg".to_string(),
            "https://elsewhere.test/x.png".to_string(),
        ];
        assert_eq!(rewrite_image_urls(&store, &urls, &report), vec![
            "https://cdn.test/products/new/a.png".to_string(),
            "https://cdn.test/products/old/b.jpg".to_string(),
            "https://elsewhere.test/x.png".to_string(),
        ]);
    }

    #[tokio::test]
    async fn key_left_behind_moves_on_the_next_rename() {
        let store = seeded().await;
        store.fail_copies_from("products/old/b.jpg").await;
        let first = move_objects(&store, &keys(&["products/old/a.png", "products/old/b.jpg"]), "products/new/").await;
        assert_eq!(first.failed.len(), 1);

        store.clear_copy_failures().await;
        let second = move_objects(&store, &keys(&["products/new/a.png", "products/old/b.jpg"]), "products/newer/").await;
        assert!(second.is_complete());
        assert_eq!(store.list("products/newer/").await.unwrap(), vec!["products/newer/a.png", "products/newer/b.jpg"]);
        assert!(store.get("products/old/b.jpg").await.is_none());
    }

    #[tokio::test]
    async fn keys_already_in_place_are_skipped() {
        let store = seeded().await;
        let report = move_objects(&store, &keys(&["products/old/a.png"]), "products/old/").await;
        assert_eq!(report, MigrationReport::default());
        assert_eq!(store.len().await, 3);
    }
}
