/// 聊天中继状态接口

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json,
    Router,
};
use serde::Serialize;

use super::ApiError;
use crate::app_state::AppState;

/// 聊天路由
pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
}

/// 中继统计
#[derive(Debug, Serialize)]
pub struct ChatStatsResponse {
    pub connections: usize,
}

/// 获取当前存活连接数
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<ChatStatsResponse>, ApiError> {
    let connections = state
        .relay()
        .count()
        .await
        .map_err(|e| ApiError::ServiceUnavailable(format!("获取连接统计失败: {}", e)))?;
    Ok(Json(ChatStatsResponse { connections }))
}

/// Prometheus 指标导出
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics().render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("导出指标失败: {}", e),
        ),
    }
}
