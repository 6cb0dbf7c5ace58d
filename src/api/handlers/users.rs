//! User administration; every route requires the admin role.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::{ApiResult, AppJson};
use crate::auth::AdminUser;
use crate::db::{Page, PageParams, UserRow};
use crate::services::users::{self, CreateUserRequest, UpdateUserRequest};
use crate::state::AppState;

pub async fn list(_: AdminUser, State(s): State<AppState>, Query(p): Query<PageParams>) -> ApiResult<Json<Page<UserRow>>> {
    Ok(Json(users::list(&s, p).await?))
}

pub async fn get(_: AdminUser, State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<UserRow>> {
    Ok(Json(users::get(&s, id).await?))
}

pub async fn create(
    _: AdminUser,
    State(s): State<AppState>,
    AppJson(r): AppJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserRow>)> {
    Ok((StatusCode::CREATED, Json(users::create(&s, r).await?)))
}

pub async fn update(
    AdminUser(actor): AdminUser,
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(r): AppJson<UpdateUserRequest>,
) -> ApiResult<Json<UserRow>> {
    Ok(Json(users::update(&s, actor.sub, id, r).await?))
}

pub async fn delete(AdminUser(actor): AdminUser, State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    users::delete(&s, actor.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_avatar(
    _: AdminUser,
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<Json<UserRow>> {
    let (content_type, body) = super::read_file_field(multipart).await?;
    Ok(Json(users::upload_avatar(&s, id, &content_type, body).await?))
}
