/// 配置管理

use common::constants::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_DELAY_MS, DEFAULT_SERVER_PORT,
};
use std::time::Duration;

use crate::ws::ReconnectPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_url: String,
    pub reconnect_base_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub connect_timeout_secs: u64,
    pub greeting: Option<String>,
    pub log_level: String,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> anyhow::Result<Self> {
        let server_url = std::env::var("CHAT_SERVER_URL")
            .unwrap_or_else(|_| format!("ws://localhost:{}/ws/chat", DEFAULT_SERVER_PORT));

        let reconnect_base_delay_ms = std::env::var("RECONNECT_BASE_DELAY_MS")
            .unwrap_or_else(|_| DEFAULT_RECONNECT_BASE_DELAY_MS.to_string())
            .parse()?;

        let max_reconnect_attempts = std::env::var("MAX_RECONNECT_ATTEMPTS")
            .unwrap_or_else(|_| DEFAULT_MAX_RECONNECT_ATTEMPTS.to_string())
            .parse()?;

        let connect_timeout_secs = std::env::var("CONNECT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;

        let greeting = std::env::var("CHAT_GREETING")
            .ok()
            .filter(|g| !g.trim().is_empty());

        let log_level = std::env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            server_url,
            reconnect_base_delay_ms,
            max_reconnect_attempts,
            connect_timeout_secs,
            greeting,
            log_level,
        })
    }

    /// 重连策略
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
            max_attempts: self.max_reconnect_attempts,
            ..ReconnectPolicy::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
