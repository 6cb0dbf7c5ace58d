use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{ApiResult, AppJson};
use crate::auth::AuthUser;
use crate::db::{OrderFilter, OrderRepository, OrderRow, Page, PageParams};
use crate::domain::aggregates::OrderStatus;
use crate::services::orders::{self, OrderDetail, StatusChangeRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub email: String,
}

/// Storefront order tracking by number and email.
pub async fn lookup(
    State(s): State<AppState>,
    Path(order_number): Path<String>,
    Query(q): Query<LookupQuery>,
) -> ApiResult<Json<OrderDetail>> {
    Ok(Json(orders::lookup(&s, &order_number, &q.email).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
}

pub async fn list(_: AuthUser, State(s): State<AppState>, Query(q): Query<OrderQuery>) -> ApiResult<Json<Page<OrderRow>>> {
    let filter = OrderFilter { status: q.status.map(|st| st.as_str().to_string()), search: q.search };
    let params = PageParams { page: q.page, per_page: q.per_page };
    Ok(Json(OrderRepository::new(s.db.clone()).list(&filter, params).await?))
}

pub async fn get(_: AuthUser, State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<OrderDetail>> {
    Ok(Json(orders::get_detail(&s, id).await?))
}

pub async fn change_status(
    _: AuthUser,
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(r): AppJson<StatusChangeRequest>,
) -> ApiResult<Json<OrderRow>> {
    Ok(Json(orders::change_status(&s, id, r.status).await?))
}

pub async fn cancel(_: AuthUser, State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<OrderRow>> {
    Ok(Json(orders::cancel_order(&s, id).await?))
}
