/// 应用全局状态

use sea_orm::DatabaseConnection;

use crate::auth::SessionManager;
use crate::config::AuthConfig;
use crate::metrics::RelayMetrics;
use crate::services::ChatNotifier;
use crate::ws::ChatRelay;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// SeaORM 数据库连接
    pub sea_db: DatabaseConnection,
    /// 聊天广播中继
    pub relay: ChatRelay,
    /// 中继指标
    pub metrics: RelayMetrics,
    /// 登录会话
    pub sessions: SessionManager,
    pub auth_config: AuthConfig,
    /// 聊天邮件通知
    pub notifier: ChatNotifier,
}

impl AppState {
    pub fn new(
        sea_db: DatabaseConnection,
        relay: ChatRelay,
        metrics: RelayMetrics,
        sessions: SessionManager,
        auth_config: AuthConfig,
    ) -> Self {
        Self {
            sea_db,
            relay,
            metrics,
            sessions,
            auth_config,
            notifier: ChatNotifier::disabled(),
        }
    }

    /// 设置聊天通知器
    pub fn with_notifier(mut self, notifier: ChatNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// 获取 SeaORM 数据库连接（克隆）
    pub fn sea_db(&self) -> DatabaseConnection {
        self.sea_db.clone()
    }

    /// 获取中继句柄（克隆）
    pub fn relay(&self) -> ChatRelay {
        self.relay.clone()
    }

    /// 获取指标（克隆）
    pub fn metrics(&self) -> RelayMetrics {
        self.metrics.clone()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn auth_config(&self) -> &AuthConfig {
        &self.auth_config
    }

    pub fn notifier(&self) -> ChatNotifier {
        self.notifier.clone()
    }
}

/// 测试用状态：内存数据库、低成本 bcrypt、关闭邮件通知
#[cfg(test)]
pub async fn test_state() -> AppState {
    use crate::config::RelayConfig;
    use std::time::Duration;

    let metrics = RelayMetrics::new().unwrap();
    let relay = ChatRelay::spawn(RelayConfig::default(), metrics.clone());
    let auth_config = AuthConfig {
        session_ttl: Duration::from_secs(3600),
        bcrypt_cost: 4,
    };
    let sessions = SessionManager::new("test-secret", auth_config.session_ttl);

    AppState::new(
        crate::db::test_support::memory_db().await,
        relay,
        metrics,
        sessions,
        auth_config,
    )
}
