use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::ApiResult;
use crate::auth::AuthUser;
use crate::db::{CustomerRepository, CustomerSummary, Page, PageParams};
use crate::state::AppState;
use crate::EcommerceError;

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
}

pub async fn list(
    _: AuthUser,
    State(s): State<AppState>,
    Query(q): Query<CustomerQuery>,
) -> ApiResult<Json<Page<CustomerSummary>>> {
    let params = PageParams { page: q.page, per_page: q.per_page };
    Ok(Json(CustomerRepository::new(s.db.clone()).list(q.search.as_deref(), params).await?))
}

pub async fn get(_: AuthUser, State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<CustomerSummary>> {
    let customer = CustomerRepository::new(s.db.clone()).get(id).await?.ok_or(EcommerceError::CustomerNotFound)?;
    Ok(Json(customer))
}
