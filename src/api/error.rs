use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::auth::AuthError;
use crate::domain::aggregates::{CartError, CouponError, OrderError, ProductError};
use crate::payments::PaymentError;
use crate::storage::StorageError;
use crate::EcommerceError;

// =============================================================================
// ApiError
// =============================================================================

/// Error response body: `{ "error": <code>, "message": <text> }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, body: ErrorBody { error: code, message: message.into() } }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// Logs `detail` and returns a 500 that reveals nothing about it.
    fn internal(detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "Request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<EcommerceError> for ApiError {
    fn from(err: EcommerceError) -> Self {
        use EcommerceError as E;
        let message = err.to_string();
        match err {
            E::ProductNotFound
            | E::CategoryNotFound
            | E::OrderNotFound
            | E::CustomerNotFound
            | E::CouponNotFound
            | E::UserNotFound => Self::not_found(message),
            E::InsufficientStock { .. } => Self::new(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock", message),
            E::InvalidQuantity | E::Validation(_) => Self::validation(message),
            E::Conflict(_) => Self::new(StatusCode::CONFLICT, "conflict", message),
            E::Coupon(e) => e.into(),
            E::Product(e) => e.into(),
            E::Order(e) => e.into(),
            E::Cart(CartError::CurrencyMismatch) => Self::validation(message),
            E::Auth(e) => e.into(),
            E::Payment(e) => e.into(),
            E::Storage(e) => e.into(),
            E::Mail(e) => Self::internal(e),
            E::Database(e) => e.into(),
        }
    }
}

impl From<CouponError> for ApiError {
    fn from(err: CouponError) -> Self {
        match err {
            CouponError::InvalidDefinition(_) => Self::validation(err.to_string()),
            CouponError::UnknownDiscountType(_) => Self::internal(err),
            _ => Self::new(StatusCode::UNPROCESSABLE_ENTITY, "coupon_invalid", err.to_string()),
        }
    }
}

impl From<ProductError> for ApiError {
    fn from(err: ProductError) -> Self {
        match err {
            // Only stored rows carry a status string.
            ProductError::UnknownStatus(_) => Self::internal(err),
            _ => Self::validation(err.to_string()),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidTransition { .. } => Self::new(StatusCode::CONFLICT, "invalid_transition", err.to_string()),
            OrderError::UnknownStatus(_) => Self::internal(err),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken(_) | AuthError::InvalidCredentials => {
                Self::new(StatusCode::UNAUTHORIZED, "unauthorized", err.to_string())
            }
            AuthError::Forbidden(_) => Self::new(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
            AuthError::Hashing(_) => Self::internal(err),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidSignature => Self::new(StatusCode::BAD_REQUEST, "invalid_signature", err.to_string()),
            PaymentError::Payload(_) => Self::validation(err.to_string()),
            PaymentError::Gateway(_) | PaymentError::NotConfigured => {
                error!(error = %err, "Payment gateway failure");
                Self::new(StatusCode::BAD_GATEWAY, "payment_gateway", "Payment provider unavailable")
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnsupportedMediaType(_) => {
                Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type", err.to_string())
            }
            StorageError::TooLarge { .. } => Self::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", err.to_string()),
            StorageError::Empty => Self::validation(err.to_string()),
            StorageError::NotFound(_) => Self::not_found(err.to_string()),
            StorageError::Backend(_) => Self::internal(err),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return Self::not_found("Resource not found");
        }
        if let Some(db) = err.as_database_error() {
            if db.is_unique_violation() {
                let what = db.constraint().unwrap_or("unique value");
                return Self::new(StatusCode::CONFLICT, "conflict", format!("Duplicate value violates {what}"));
            }
            if db.is_foreign_key_violation() {
                return Self::new(StatusCode::CONFLICT, "conflict", "Referenced record does not exist or is still in use");
            }
            if db.is_check_violation() {
                return Self::validation("Value violates a database constraint");
            }
        }
        Self::internal(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type", rejection.body_text())
            }
            _ => Self::validation(rejection.body_text()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        let code = if status == StatusCode::PAYLOAD_TOO_LARGE { "payload_too_large" } else { "validation_error" };
        Self::new(status, code, err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn status_mapping() {
        let cases: Vec<(EcommerceError, StatusCode)> = vec![
            (EcommerceError::OrderNotFound, StatusCode::NOT_FOUND),
            (EcommerceError::validation("bad"), StatusCode::BAD_REQUEST),
            (EcommerceError::InsufficientStock { product_id: Uuid::nil() }, StatusCode::UNPROCESSABLE_ENTITY),
            (CouponError::Expired.into(), StatusCode::UNPROCESSABLE_ENTITY),
            (CouponError::MinimumNotMet { minimum: Decimal::TEN }.into(), StatusCode::UNPROCESSABLE_ENTITY),
            (CouponError::InvalidDefinition("x").into(), StatusCode::BAD_REQUEST),
            (AuthError::MissingToken.into(), StatusCode::UNAUTHORIZED),
            (AuthError::Forbidden("admin").into(), StatusCode::FORBIDDEN),
            (PaymentError::InvalidSignature.into(), StatusCode::BAD_REQUEST),
            (PaymentError::Gateway("down".into()).into(), StatusCode::BAD_GATEWAY),
            (StorageError::UnsupportedMediaType("text/plain".into()).into(), StatusCode::UNSUPPORTED_MEDIA_TYPE),
            (StorageError::TooLarge { limit: 1 }.into(), StatusCode::PAYLOAD_TOO_LARGE),
            (EcommerceError::Conflict("dup".into()), StatusCode::CONFLICT),
            (sqlx::Error::PoolTimedOut.into(), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let label = err.to_string();
            assert_eq!(ApiError::from(err).status, expected, "{label}");
        }
    }

    #[test]
    fn invalid_transition_is_a_conflict() {
        use crate::domain::aggregates::OrderStatus;
        let err = EcommerceError::Order(OrderError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Pending,
        });
        let api = ApiError::from(err);
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.body.error, "invalid_transition");
    }

    #[test]
    fn internal_errors_hide_details() {
        let api = ApiError::from(EcommerceError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(api.body.message, "Internal server error");
    }
}
