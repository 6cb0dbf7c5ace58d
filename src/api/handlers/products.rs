use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{ApiResult, AppJson};
use crate::auth::AuthUser;
use crate::db::{Page, ProductRow};
use crate::services::catalog::{self, ProductInput, ProductQuery};
use crate::state::AppState;

pub async fn list_public(State(s): State<AppState>, Query(q): Query<ProductQuery>) -> ApiResult<Json<Page<ProductRow>>> {
    Ok(Json(catalog::list_public(&s, q).await?))
}

pub async fn get_by_slug(State(s): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<ProductRow>> {
    Ok(Json(catalog::get_public_by_slug(&s, &slug).await?))
}

pub async fn list(_: AuthUser, State(s): State<AppState>, Query(q): Query<ProductQuery>) -> ApiResult<Json<Page<ProductRow>>> {
    Ok(Json(catalog::list_admin(&s, q).await?))
}

pub async fn get(_: AuthUser, State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<ProductRow>> {
    Ok(Json(catalog::get_product(&s, id).await?))
}

pub async fn create(
    _: AuthUser,
    State(s): State<AppState>,
    AppJson(r): AppJson<ProductInput>,
) -> ApiResult<(StatusCode, Json<ProductRow>)> {
    Ok((StatusCode::CREATED, Json(catalog::create_product(&s, r).await?)))
}

pub async fn update(
    _: AuthUser,
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(r): AppJson<ProductInput>,
) -> ApiResult<Json<ProductRow>> {
    Ok(Json(catalog::update_product(&s, id, r).await?))
}

pub async fn delete(_: AuthUser, State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    catalog::archive_product(&s, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_image(
    _: AuthUser,
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ProductRow>)> {
    let (content_type, body) = super::read_file_field(multipart).await?;
    Ok((StatusCode::CREATED, Json(catalog::upload_product_image(&s, id, &content_type, body).await?)))
}

#[derive(Debug, Deserialize)]
pub struct ImageKey {
    pub key: String,
}

pub async fn delete_image(
    _: AuthUser,
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<ImageKey>,
) -> ApiResult<Json<ProductRow>> {
    Ok(Json(catalog::remove_product_image(&s, id, &q.key).await?))
}
