pub mod analytics_service;
pub mod auth_service;
pub mod blog_service;
pub mod notification_service;
pub mod payment_service;

pub use analytics_service::AnalyticsService;
pub use auth_service::AuthService;
pub use blog_service::BlogService;
pub use notification_service::ChatNotifier;
pub use payment_service::PaymentService;

use thiserror::Error;

/// 服务层错误
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
