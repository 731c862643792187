/// 用户认证接口
use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use serde_json::json;

use super::ApiError;
use crate::app_state::AppState;
use crate::auth::MaybeAuthUser;
use crate::db::models::user::{LoginDto, RegisterDto};
use crate::services::AuthService;

/// 创建路由
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    Json(dto): Json<RegisterDto>,
) -> Result<impl IntoResponse, ApiError> {
    let user = AuthService::new(state).register(dto).await?;
    Ok(Json(user))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(dto): Json<LoginDto>,
) -> Result<impl IntoResponse, ApiError> {
    let response = AuthService::new(state).login(dto).await?;
    Ok(Json(response))
}

/// POST /api/auth/logout，未登录时同样返回成功
async fn logout(
    State(state): State<AppState>,
    MaybeAuthUser(claims): MaybeAuthUser,
) -> impl IntoResponse {
    if let Some(claims) = claims {
        state.sessions().revoke(&claims).await;
    }
    Json(json!({ "message": "Logged out successfully" }))
}
