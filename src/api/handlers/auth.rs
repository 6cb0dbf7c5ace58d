use axum::extract::State;
use axum::Json;

use crate::api::{ApiResult, AppJson};
use crate::auth::AuthUser;
use crate::db::UserRow;
use crate::services::users::{self, LoginRequest, LoginResponse};
use crate::state::AppState;

pub async fn login(State(s): State<AppState>, AppJson(r): AppJson<LoginRequest>) -> ApiResult<Json<LoginResponse>> {
    Ok(Json(users::login(&s, r).await?))
}

pub async fn me(AuthUser(claims): AuthUser, State(s): State<AppState>) -> ApiResult<Json<UserRow>> {
    Ok(Json(users::get(&s, claims.sub).await?))
}
