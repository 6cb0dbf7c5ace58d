//! HTTP surface.
//!
//! Public storefront routes live under `/api/v1`; back-office routes under
//! `/api/v1/admin` authenticate with a bearer token through the
//! [`AuthUser`](crate::auth::AuthUser) / [`AdminUser`](crate::auth::AdminUser)
//! extractors.

mod error;
mod extract;
pub mod handlers;

pub use error::{ApiError, ErrorBody};
pub use extract::AppJson;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::{auth, categories, checkout, coupons, customers, dashboard, health, orders, payments, products, users};

pub type ApiResult<T> = Result<T, ApiError>;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.storage.max_upload_bytes + MULTIPART_OVERHEAD);

    let admin = Router::new()
        .route("/me", get(auth::me))
        .route("/dashboard", get(dashboard::summary))
        .route("/products", get(products::list).post(products::create))
        .route("/products/:id", get(products::get).put(products::update).delete(products::delete))
        .route(
            "/products/:id/images",
            post(products::upload_image).delete(products::delete_image).layer(upload_limit.clone()),
        )
        .route("/categories", post(categories::create))
        .route("/categories/:id", put(categories::update).delete(categories::delete))
        .route("/orders", get(orders::list))
        .route("/orders/:id", get(orders::get))
        .route("/orders/:id/status", patch(orders::change_status))
        .route("/orders/:id/cancel", post(orders::cancel))
        .route("/customers", get(customers::list))
        .route("/customers/:id", get(customers::get))
        .route("/coupons", get(coupons::list).post(coupons::create))
        .route("/coupons/:id", get(coupons::get).put(coupons::update).delete(coupons::delete))
        .route("/users", get(users::list).post(users::create))
        .route("/users/:id", get(users::get).put(users::update).delete(users::delete))
        .route("/users/:id/avatar", post(users::upload_avatar).layer(upload_limit));

    Router::new()
        .route("/health", get(health::health))
        .route("/api/v1/products", get(products::list_public))
        .route("/api/v1/products/slug/:slug", get(products::get_by_slug))
        .route("/api/v1/categories", get(categories::list))
        .route("/api/v1/coupons/validate", post(coupons::validate))
        .route("/api/v1/checkout", post(checkout::checkout))
        .route("/api/v1/orders/lookup/:order_number", get(orders::lookup))
        .route("/api/v1/payments/verify", post(payments::verify))
        .route("/api/v1/payments/webhook", post(payments::webhook))
        .route("/api/v1/auth/login", post(auth::login))
        .nest("/api/v1/admin", admin)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
