//! Catalog maintenance: products, their images and categories.
//!
//! A product's images live under `products/<slug>/`. Renaming the slug moves
//! the objects and rewrites the stored URLs, in that order, after the row
//! update has succeeded (a duplicate slug must fail before anything moves).
//! Objects are found through the product's stored URLs as well as its current
//! prefix, so an image a previous rename failed to move is still tracked.

use bytes::Bytes;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::{
    CategoryRepository, CategoryRow, Page, PageParams, ProductExtras, ProductFilter, ProductRepository, ProductRow,
};
use crate::domain::aggregates::{image_prefix, ProductDraft, ProductStatus};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::Slug;
use crate::state::AppState;
use crate::storage::{self, move_objects, rewrite_image_urls, MigrationReport, ObjectStore, StorageError};
use crate::{EcommerceError, Result};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductInput {
    pub sku: String,
    #[validate(length(max = 200, message = "is too long"))]
    pub name: String,
    pub slug: Option<String>,
    #[validate(length(max = 10000, message = "is too long"))]
    pub description: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub status: ProductStatus,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    #[validate(length(max = 20, message = "may hold at most 20 tags"))]
    pub tags: Vec<String>,
}

impl ProductInput {
    pub fn split(self) -> Result<(ProductDraft, ProductExtras)> {
        self.validate()?;
        let mut tags: Vec<String> = self.tags.iter().map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty()).collect();
        tags.sort();
        tags.dedup();
        let draft = ProductDraft {
            sku: self.sku,
            name: self.name,
            slug: self.slug,
            price: self.price,
            compare_at_price: self.compare_at_price,
            stock: self.stock,
            status: self.status,
        };
        let extras = ProductExtras {
            description: self.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            category_id: self.category_id,
            tags,
        };
        Ok((draft, extras))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<ProductStatus>,
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
}

impl ProductQuery {
    fn page_params(&self) -> PageParams { PageParams { page: self.page, per_page: self.per_page } }
}

/// Storefront listing; only active products are visible.
pub async fn list_public(state: &AppState, query: ProductQuery) -> Result<Page<ProductRow>> {
    let params = query.page_params();
    let filter = ProductFilter { status: Some(ProductStatus::Active), category_id: query.category_id, search: query.search };
    Ok(ProductRepository::new(state.db.clone()).list(&filter, params).await?)
}

pub async fn list_admin(state: &AppState, query: ProductQuery) -> Result<Page<ProductRow>> {
    let params = query.page_params();
    let filter = ProductFilter { status: query.status, category_id: query.category_id, search: query.search };
    Ok(ProductRepository::new(state.db.clone()).list(&filter, params).await?)
}

pub async fn get_public_by_slug(state: &AppState, slug: &str) -> Result<ProductRow> {
    ProductRepository::new(state.db.clone())
        .get_by_slug(slug)
        .await?
        .filter(ProductRow::is_active)
        .ok_or(EcommerceError::ProductNotFound)
}

pub async fn get_product(state: &AppState, id: Uuid) -> Result<ProductRow> {
    ProductRepository::new(state.db.clone()).get(id).await?.ok_or(EcommerceError::ProductNotFound)
}

pub async fn create_product(state: &AppState, input: ProductInput) -> Result<ProductRow> {
    let (draft, extras) = input.split()?;
    let product = draft.validate()?;
    let row = ProductRepository::new(state.db.clone()).create(&product, &extras).await?;
    info!(product_id = %row.id, sku = %row.sku, "Product created");
    state
        .events
        .publish(vec![DomainEvent::Product(ProductEvent::Created { product_id: row.id, sku: row.sku.clone() })])
        .await;
    Ok(row)
}

pub async fn update_product(state: &AppState, id: Uuid, input: ProductInput) -> Result<ProductRow> {
    let (draft, extras) = input.split()?;
    let product = draft.validate()?;
    let products = ProductRepository::new(state.db.clone());
    let current = products.get(id).await?.ok_or(EcommerceError::ProductNotFound)?;

    let mut row = products.update(id, &product, &extras).await?.ok_or(EcommerceError::ProductNotFound)?;
    if current.slug != row.slug {
        let (images, report) =
            relocate_images(state.storage.as_ref(), &row.images, &image_prefix(&current.slug), &image_prefix(&row.slug)).await;
        if !report.is_complete() {
            warn!(product_id = %id, failed = report.failed.len(), "Some images stayed under their old keys");
        }
        if images != row.images {
            row = products.set_images(id, &images).await?.ok_or(EcommerceError::ProductNotFound)?;
        }
        state
            .events
            .publish(vec![DomainEvent::Product(ProductEvent::SlugChanged {
                product_id: id,
                from: current.slug,
                to: row.slug.clone(),
            })])
            .await;
    }
    info!(product_id = %id, "Product updated");
    Ok(row)
}

/// Archives the product and removes its stored images, best effort.
pub async fn archive_product(state: &AppState, id: Uuid) -> Result<()> {
    let products = ProductRepository::new(state.db.clone());
    let current = products.get(id).await?.ok_or(EcommerceError::ProductNotFound)?;
    products.archive(id).await?.ok_or(EcommerceError::ProductNotFound)?;

    let keys = image_keys(state.storage.as_ref(), &current.images, &image_prefix(&current.slug)).await;
    let results = join_all(keys.iter().map(|key| state.storage.delete(key))).await;
    for (key, result) in keys.iter().zip(results) {
        if let Err(e) = result {
            warn!(%key, error = %e, "Failed to delete product image");
        }
    }
    info!(product_id = %id, "Product archived");
    state.events.publish(vec![DomainEvent::Product(ProductEvent::Archived { product_id: id })]).await;
    Ok(())
}

/// Keys of a product's stored objects: those its image URLs point at, then
/// anything else under `prefix`. A failed listing is logged and skipped.
pub async fn image_keys(store: &dyn ObjectStore, images: &[String], prefix: &str) -> Vec<String> {
    let mut keys: Vec<String> = images.iter().filter_map(|url| store.key_for_url(url)).collect();
    match store.list(prefix).await {
        Ok(listed) => {
            for key in listed {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        Err(e) => warn!(%prefix, error = %e, "Failed to list product images"),
    }
    keys
}

/// Moves a product's objects from `old_prefix` to `new_prefix`, best effort,
/// and returns its image URLs pointed at the keys that moved.
pub async fn relocate_images(
    store: &dyn ObjectStore,
    images: &[String],
    old_prefix: &str,
    new_prefix: &str,
) -> (Vec<String>, MigrationReport) {
    let keys = image_keys(store, images, old_prefix).await;
    let report = move_objects(store, &keys, new_prefix).await;
    (rewrite_image_urls(store, images, &report), report)
}

pub async fn upload_product_image(state: &AppState, id: Uuid, content_type: &str, body: Bytes) -> Result<ProductRow> {
    let ext = storage::validate_image(content_type, body.len(), state.config.storage.max_upload_bytes)?;
    let products = ProductRepository::new(state.db.clone());
    let product = products.get(id).await?.ok_or(EcommerceError::ProductNotFound)?;

    let key = storage::product_image_key(&product.slug, ext);
    state.storage.put(&key, body, content_type).await?;
    let mut images = product.images;
    images.push(state.storage.public_url(&key));
    let row = products.set_images(id, &images).await?.ok_or(EcommerceError::ProductNotFound)?;
    info!(product_id = %id, %key, "Product image uploaded");
    Ok(row)
}

pub async fn remove_product_image(state: &AppState, id: Uuid, key: &str) -> Result<ProductRow> {
    let products = ProductRepository::new(state.db.clone());
    let product = products.get(id).await?.ok_or(EcommerceError::ProductNotFound)?;
    let url = state.storage.public_url(key);
    if !product.images.contains(&url) {
        return Err(StorageError::NotFound(key.to_string()).into());
    }
    state.storage.delete(key).await?;
    let images: Vec<String> = product.images.into_iter().filter(|u| *u != url).collect();
    let row = products.set_images(id, &images).await?.ok_or(EcommerceError::ProductNotFound)?;
    info!(product_id = %id, %key, "Product image removed");
    Ok(row)
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: String,
    pub slug: Option<String>,
    #[validate(length(max = 1000, message = "is too long"))]
    pub description: Option<String>,
}

impl CategoryInput {
    fn normalise(&self) -> Result<(String, Slug)> {
        self.validate()?;
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(EcommerceError::validation("name must not be blank"));
        }
        let slug = match self.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(given) => Slug::parse(given),
            None => Slug::from_name(&name),
        }
        .map_err(|e| EcommerceError::validation(e.to_string()))?;
        Ok((name, slug))
    }
}

pub async fn list_categories(state: &AppState) -> Result<Vec<CategoryRow>> {
    Ok(CategoryRepository::new(state.db.clone()).list().await?)
}

pub async fn create_category(state: &AppState, input: CategoryInput) -> Result<CategoryRow> {
    let (name, slug) = input.normalise()?;
    let row = CategoryRepository::new(state.db.clone())
        .create(&name, slug.as_str(), input.description.as_deref())
        .await?;
    info!(category_id = %row.id, slug = %row.slug, "Category created");
    Ok(row)
}

pub async fn update_category(state: &AppState, id: Uuid, input: CategoryInput) -> Result<CategoryRow> {
    let (name, slug) = input.normalise()?;
    CategoryRepository::new(state.db.clone())
        .update(id, &name, slug.as_str(), input.description.as_deref())
        .await?
        .ok_or(EcommerceError::CategoryNotFound)
}

pub async fn delete_category(state: &AppState, id: Uuid) -> Result<()> {
    if !CategoryRepository::new(state.db.clone()).delete(id).await? {
        return Err(EcommerceError::CategoryNotFound);
    }
    Ok(())
}
