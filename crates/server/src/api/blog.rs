/// 博客接口
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

use super::ApiError;
use crate::app_state::AppState;
use crate::services::BlogService;

/// 创建路由
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
}

/// GET /api/posts
async fn list_posts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let posts = BlogService::new(state).list_posts().await?;
    Ok(Json(posts))
}
