/// 登录会话
///
/// 会话令牌是带 `jti` 的 JWT，注销时把 `jti` 记入吊销表直到令牌自然过期

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::ApiError;
use crate::app_state::AppState;
use crate::db::models::user::Model as User;

/// 令牌载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户 ID
    pub sub: i32,
    pub username: String,
    pub is_admin: bool,
    /// 令牌 ID，注销时按它吊销
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// 会话管理器
#[derive(Clone)]
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    /// jti -> 过期时间（秒）
    revoked: Arc<RwLock<HashMap<String, i64>>>,
}

impl SessionManager {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            revoked: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 为用户签发令牌
    pub fn issue(&self, user: &User) -> anyhow::Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// 校验令牌，已吊销的令牌视为无效
    pub async fn verify(&self, token: &str) -> Option<Claims> {
        let claims = match decode::<Claims>(token, &self.decoding_key, &Validation::default()) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!("令牌校验失败: {}", e);
                return None;
            }
        };

        if self.revoked.read().await.contains_key(&claims.jti) {
            debug!("令牌已注销: {}", claims.jti);
            return None;
        }

        Some(claims)
    }

    /// 注销令牌，顺带清理已过期的吊销记录
    pub async fn revoke(&self, claims: &Claims) {
        let now = Utc::now().timestamp();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(claims.jti.clone(), claims.exp);
        info!("用户 {} 已注销", claims.username);
    }
}

/// 从 `Authorization: Bearer <token>` 取出令牌
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// 已登录用户
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

        state
            .sessions()
            .verify(token)
            .await
            .map(AuthUser)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}

/// 可选的登录用户，令牌缺失或无效时为 None
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<Claims>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = match bearer_token(parts) {
            Some(token) => state.sessions().verify(token).await,
            None => None,
        };
        Ok(MaybeAuthUser(claims))
    }
}
