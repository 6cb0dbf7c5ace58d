use axum::extract::State;
use axum::Json;

use crate::api::ApiResult;
use crate::auth::AuthUser;
use crate::db::{DashboardSummary, OrderRepository, ProductRepository};
use crate::state::AppState;

/// Active products at or below this many units count as low stock.
const LOW_STOCK_THRESHOLD: i32 = 5;

pub async fn summary(_: AuthUser, State(s): State<AppState>) -> ApiResult<Json<DashboardSummary>> {
    let mut summary = OrderRepository::new(s.db.clone()).dashboard_summary().await?;
    summary.low_stock_count = ProductRepository::new(s.db.clone()).low_stock_count(LOW_STOCK_THRESHOLD).await?;
    Ok(Json(summary))
}
