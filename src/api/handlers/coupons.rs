use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::api::{ApiResult, AppJson};
use crate::auth::AuthUser;
use crate::db::{CouponRepository, CouponRow, Page, PageParams};
use crate::services::coupons::{self, CouponInput, CouponPreview, CouponPreviewRequest};
use crate::state::AppState;
use crate::EcommerceError;

pub async fn validate(
    State(s): State<AppState>,
    AppJson(r): AppJson<CouponPreviewRequest>,
) -> ApiResult<Json<CouponPreview>> {
    r.validate().map_err(EcommerceError::from)?;
    Ok(Json(coupons::preview(&s, &r.code, r.subtotal).await?))
}

pub async fn list(
    _: AuthUser,
    State(s): State<AppState>,
    Query(p): Query<PageParams>,
) -> ApiResult<Json<Page<CouponRow>>> {
    Ok(Json(CouponRepository::new(s.db.clone()).list(p).await?))
}

pub async fn get(_: AuthUser, State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<CouponRow>> {
    let row = CouponRepository::new(s.db.clone()).get(id).await?.ok_or(EcommerceError::CouponNotFound)?;
    Ok(Json(row))
}

pub async fn create(
    _: AuthUser,
    State(s): State<AppState>,
    AppJson(r): AppJson<CouponInput>,
) -> ApiResult<(StatusCode, Json<CouponRow>)> {
    Ok((StatusCode::CREATED, Json(coupons::create(&s, r).await?)))
}

pub async fn update(
    _: AuthUser,
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(r): AppJson<CouponInput>,
) -> ApiResult<Json<CouponRow>> {
    Ok(Json(coupons::update(&s, id, r).await?))
}

pub async fn delete(_: AuthUser, State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    coupons::delete(&s, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
