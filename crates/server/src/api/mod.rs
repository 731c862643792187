pub mod analytics;
pub mod auth;
pub mod blog;
pub mod chat;
pub mod error;
pub mod payments;

pub use error::ApiError;

use axum::Router;

use crate::app_state::AppState;

/// 所有 API 路由（统一入口）
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::routes())
        .nest("/payments", payments::routes())
        .nest("/analytics", analytics::routes())
        .nest("/chat", chat::chat_routes())
        .merge(blog::routes())
}
