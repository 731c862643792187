/// 支付接口
use axum::{
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::warn;

use super::ApiError;
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::db::models::payment::{CreateSessionDto, WebhookEvent};
use crate::services::PaymentService;

/// 创建路由
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/create-session", post(create_session))
        .route("/webhook/:provider", post(webhook))
        .route("/history", get(history))
}

/// POST /api/payments/create-session
async fn create_session(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(dto): Json<CreateSessionDto>,
) -> Result<impl IntoResponse, ApiError> {
    let session = PaymentService::new(state).create_session(claims.sub, dto).await?;
    Ok(Json(session))
}

/// POST /api/payments/webhook/:provider
///
/// 渠道回调的格式各不相同，无法识别的负载只确认收到
async fn webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let event = if body.is_empty() {
        WebhookEvent::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|e| {
            warn!("无法识别的 {} 回调负载: {}", provider, e);
            WebhookEvent::default()
        })
    };

    PaymentService::new(state).handle_webhook(&provider, event).await?;
    Ok(Json(json!({ "received": true })))
}

/// GET /api/payments/history
async fn history(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let payments = PaymentService::new(state).history(claims.sub).await?;
    Ok(Json(payments))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::call_json;
    use crate::app_state::{test_state, AppState};
    use crate::services::test_support::create_user;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    async fn login_token(state: &AppState, username: &str) -> String {
        let user = create_user(state, username).await;
        state.sessions().issue(&user).unwrap()
    }

    #[tokio::test]
    async fn test_payment_routes_require_login() {
        let state = test_state().await;

        let (status, body) = call_json(
            &state,
            Method::POST,
            "/api/payments/create-session",
            None,
            Some(json!({"provider": "stripe", "amount": 100, "currency": "usd"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Authentication required");

        let (status, _) =
            call_json(&state, Method::GET, "/api/payments/history", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_session_webhook_and_history() {
        let state = test_state().await;
        let token = login_token(&state, "kim").await;

        let (status, session) = call_json(
            &state,
            Method::POST,
            "/api/payments/create-session",
            Some(&token),
            Some(json!({"provider": "wechat", "amount": 2500, "currency": "cny"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["provider"], "wechat");
        let payment_id = session["paymentId"].as_i64().unwrap();

        let (status, body) = call_json(
            &state,
            Method::POST,
            "/api/payments/webhook/wechat",
            None,
            Some(json!({"paymentId": payment_id, "status": "completed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], true);

        let (status, history) =
            call_json(&state, Method::GET, "/api/payments/history", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["status"], "completed");
        assert_eq!(history[0]["currency"], "CNY");
    }

    #[tokio::test]
    async fn test_unsupported_provider() {
        let state = test_state().await;
        let token = login_token(&state, "lee").await;

        let (status, _) = call_json(
            &state,
            Method::POST,
            "/api/payments/create-session",
            Some(&token),
            Some(json!({"provider": "cash", "amount": 100, "currency": "usd"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            call_json(&state, Method::POST, "/api/payments/webhook/cash", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid payment provider");
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_unknown_payload() {
        let state = test_state().await;
        let (status, body) = call_json(
            &state,
            Method::POST,
            "/api/payments/webhook/alipay",
            None,
            Some(json!({"trade_no": "2024", "sign": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], true);
    }
}
