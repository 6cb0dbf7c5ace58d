use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::{ApiResult, AppJson};
use crate::auth::AuthUser;
use crate::db::CategoryRow;
use crate::services::catalog::{self, CategoryInput};
use crate::state::AppState;

pub async fn list(State(s): State<AppState>) -> ApiResult<Json<Vec<CategoryRow>>> {
    Ok(Json(catalog::list_categories(&s).await?))
}

pub async fn create(
    _: AuthUser,
    State(s): State<AppState>,
    AppJson(r): AppJson<CategoryInput>,
) -> ApiResult<(StatusCode, Json<CategoryRow>)> {
    Ok((StatusCode::CREATED, Json(catalog::create_category(&s, r).await?)))
}

pub async fn update(
    _: AuthUser,
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(r): AppJson<CategoryInput>,
) -> ApiResult<Json<CategoryRow>> {
    Ok(Json(catalog::update_category(&s, id, r).await?))
}

pub async fn delete(_: AuthUser, State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    catalog::delete_category(&s, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
