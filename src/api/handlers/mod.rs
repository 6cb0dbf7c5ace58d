pub mod auth;
pub mod categories;
pub mod checkout;
pub mod coupons;
pub mod customers;
pub mod dashboard;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;

use axum::body::Bytes;
use axum::extract::Multipart;

use super::ApiError;

/// Reads the `file` part of an upload form as `(content_type, bytes)`.
pub(crate) async fn read_file_field(mut multipart: Multipart) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        let body = field.bytes().await?;
        return Ok((content_type, body));
    }
    Err(ApiError::validation("missing 'file' field"))
}
