use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::{ApiResult, AppJson};
use crate::services::checkout::{self, CheckoutRequest, CheckoutResponse};
use crate::state::AppState;

pub async fn checkout(
    State(s): State<AppState>,
    AppJson(r): AppJson<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<CheckoutResponse>)> {
    Ok((StatusCode::CREATED, Json(checkout::place_order(&s, r).await?)))
}
