//! Request extractors guarding the back-office routes.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};

use super::{extract_bearer_token, AuthError, Claims, Role};
use crate::api::ApiError;
use crate::state::AppState;

/// Any signed-in back-office user (admin or staff).
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

/// A signed-in user with the `admin` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(extract_bearer_token)
            .ok_or(AuthError::MissingToken)?;
        Ok(AuthUser(state.jwt.validate(token)?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if claims.role != Role::Admin {
            return Err(AuthError::Forbidden("admin").into());
        }
        Ok(AdminUser(claims))
    }
}
