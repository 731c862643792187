/// 用户注册与登录服务
use anyhow::anyhow;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{info, warn};

use super::{ServiceError, ServiceResult};
use crate::app_state::AppState;
use crate::db::models::user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as UserEntity, LoginDto,
    LoginResponse, RegisterDto, UserResponse,
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub struct AuthService {
    state: AppState,
}

impl AuthService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// 注册新用户，新用户既不是管理员也不是专属会员
    pub async fn register(&self, dto: RegisterDto) -> ServiceResult<UserResponse> {
        let db = &self.state.sea_db();

        let username = dto.username.trim().to_string();
        let email = dto.email.trim().to_string();
        if username.is_empty() || email.is_empty() || dto.password.is_empty() {
            return Err(ServiceError::BadRequest(
                "Username, email and password are required".to_string(),
            ));
        }

        let existing = UserEntity::find()
            .filter(UserColumn::Username.eq(username.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::BadRequest("Username already exists".to_string()));
        }

        let existing = UserEntity::find()
            .filter(UserColumn::Email.eq(email.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::BadRequest("Email already exists".to_string()));
        }

        let password = hash_password(dto.password, self.state.auth_config().bcrypt_cost).await?;

        let user = UserActiveModel {
            username: Set(username),
            email: Set(email),
            password: Set(password),
            is_admin: Set(false),
            is_exclusive: Set(false),
            is_premium: Set(false),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!("新用户注册: id={}, username={}", user.id, user.username);
        Ok(UserResponse::from(user))
    }

    /// 校验用户名和密码，成功后签发会话令牌
    pub async fn login(&self, dto: LoginDto) -> ServiceResult<LoginResponse> {
        let db = &self.state.sea_db();

        let user = UserEntity::find()
            .filter(UserColumn::Username.eq(dto.username.trim()))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password(dto.password, user.password.clone()).await? {
            warn!("登录失败，密码错误: username={}", user.username);
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let token = self.state.sessions().issue(&user)?;
        info!("用户登录: id={}, username={}", user.id, user.username);

        Ok(LoginResponse {
            user: UserResponse::from(user),
            token,
        })
    }
}

/// bcrypt 计算较慢，放到阻塞线程池
async fn hash_password(password: String, cost: u32) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| anyhow!("密码哈希任务失败: {}", e))?
        .map_err(|e| anyhow!("密码哈希失败: {}", e))
}

async fn verify_password(password: String, hashed: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed))
        .await
        .map_err(|e| anyhow!("密码校验任务失败: {}", e))?
        .map_err(|e| anyhow!("密码校验失败: {}", e))
}
