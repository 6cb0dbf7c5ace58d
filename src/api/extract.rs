use axum::extract::FromRequest;

use super::ApiError;

/// `axum::Json` whose rejections use the service's error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);
