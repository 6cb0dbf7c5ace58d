//! OpenSASE Storefront
//!
//! Storefront and admin back-office service.
//!
//! ## Features
//! - Product catalog management with images in S3-compatible object storage
//! - Checkout with guarded stock deduction and coupon discounts
//! - Order management and payment-gateway confirmation
//! - Customer and back-office user management
//! - Transactional email and optional NATS domain events

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod mail;
pub mod payments;
pub mod publisher;
pub mod services;
pub mod state;
pub mod storage;

use thiserror::Error;
use uuid::Uuid;

use crate::auth::AuthError;
use crate::domain::aggregates::{CartError, CouponError, OrderError, ProductError};
use crate::mail::MailError;
use crate::payments::PaymentError;
use crate::storage::StorageError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Category not found")]
    CategoryNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Customer not found")]
    CustomerNotFound,

    #[error("Coupon not found")]
    CouponNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock { product_id: Uuid },

    #[error("Invalid quantity")]
    InvalidQuantity,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EcommerceError {
    pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }
}

impl From<validator::ValidationErrors> for EcommerceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reason = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{field} {reason}")
            })
            .collect();
        fields.sort();
        Self::Validation(fields.join("; "))
    }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
