/// 运营统计接口
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

use super::ApiError;
use crate::app_state::AppState;
use crate::services::AnalyticsService;

/// 创建路由
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
}

/// GET /api/analytics/dashboard
async fn dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let analytics = AnalyticsService::new(state).dashboard().await?;
    Ok(Json(analytics))
}
