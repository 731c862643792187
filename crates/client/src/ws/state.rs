/// 聊天连接状态机
///
/// 不持有任何 socket 或定时器，只根据事件更新状态并返回需要执行的副作用，
/// 由驱动任务负责真正的网络和定时操作

use common::constants::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_DELAY_MS, DEGRADED_GRACE_MS,
    RECONNECT_MULTIPLIER_CAP, RESTORED_NOTICE_THRESHOLD,
};
use common::utils::backoff_multiplier;
use common::ChatMessage;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::message_log::MessageLog;

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// 尚未连接
    Idle,
    /// 正在建立连接
    Connecting,
    /// 已连接
    Open,
    /// 第 `attempt` 次失败后等待重连
    Backoff { attempt: u32 },
    /// 重连次数耗尽，需要用户手动刷新
    Failed,
    /// 已拆除，不再响应任何事件
    Closed,
}

/// 面向用户的连接提示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// 连续失败后重新连上
    Restored,
    /// 断线一段时间仍未恢复
    Degraded,
    /// 放弃重连
    Failed,
}

impl Notice {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Restored => "Connected",
            Self::Degraded => "Connection Issue",
            Self::Failed => "Connection Failed",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Restored => "Chat service restored",
            Self::Degraded => "Chat service is experiencing difficulties",
            Self::Failed => {
                "Unable to establish connection. Please refresh the page to try again."
            }
        }
    }

    /// 是否为需要用户处理的错误提示
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// 状态机要求驱动任务执行的副作用
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// 建立新连接
    OpenSocket,
    /// 发送一帧文本
    Transmit(String),
    /// 关闭当前连接
    CloseSocket,
    /// 在延迟后触发重连
    ScheduleReconnect(Duration),
    /// 在延迟后检查是否仍未恢复
    ScheduleDegradedCheck(Duration),
    /// 取消所有待触发的定时器
    CancelTimers,
    /// 新消息加入列表
    Render(ChatMessage),
    /// 列表滚动到底部
    ScrollToBottom,
    /// 弹出提示
    Notify(Notice),
}

/// 重连策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
    pub multiplier_cap: u32,
    /// 连续失败超过该次数时，恢复后提示并在断线时检查服务异常
    pub notice_threshold: u32,
    pub degraded_grace: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DEFAULT_RECONNECT_BASE_DELAY_MS),
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            multiplier_cap: RECONNECT_MULTIPLIER_CAP,
            notice_threshold: RESTORED_NOTICE_THRESHOLD,
            degraded_grace: Duration::from_millis(DEGRADED_GRACE_MS),
        }
    }
}

impl ReconnectPolicy {
    /// 第 `attempt` 次失败后的重连延迟：`base * min(attempt + 1, cap)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * backoff_multiplier(attempt, self.multiplier_cap)
    }
}

/// 聊天连接管理器
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    policy: ReconnectPolicy,
    state: ConnectionState,
    attempts: u32,
    log: MessageLog,
}

impl ConnectionManager {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Idle,
            attempts: 0,
            log: MessageLog::new(),
        }
    }

    /// 创建时在本地列表放入一条系统欢迎语
    pub fn with_greeting(policy: ReconnectPolicy, greeting: impl Into<String>) -> Self {
        let mut manager = Self::new(policy);
        manager.log.append(ChatMessage::system(greeting));
        manager
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// 当前连续失败次数
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.log.messages()
    }

    /// 发起连接，正在连接或已连接时不做任何事
    pub fn connect(&mut self) -> Vec<Effect> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => Vec::new(),
            ConnectionState::Failed | ConnectionState::Closed => {
                debug!("连接已终止，忽略连接请求: {:?}", self.state);
                Vec::new()
            }
            ConnectionState::Idle | ConnectionState::Backoff { .. } => {
                self.state = ConnectionState::Connecting;
                vec![Effect::OpenSocket]
            }
        }
    }

    /// 连接建立
    pub fn on_open(&mut self) -> Vec<Effect> {
        match self.state {
            ConnectionState::Connecting => {}
            ConnectionState::Closed => return vec![Effect::CloseSocket],
            other => {
                debug!("非连接中状态收到 open 事件，忽略: {:?}", other);
                return Vec::new();
            }
        }

        info!("✅ 聊天连接已建立");
        let was_disconnected = self.attempts > self.policy.notice_threshold;
        self.attempts = 0;
        self.state = ConnectionState::Open;

        if was_disconnected {
            vec![Effect::Notify(Notice::Restored)]
        } else {
            Vec::new()
        }
    }

    /// 收到文本帧
    pub fn on_message(&mut self, text: &str) -> Vec<Effect> {
        if self.state == ConnectionState::Closed {
            return Vec::new();
        }

        let message = match ChatMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("解析聊天消息失败: {}", e);
                return Vec::new();
            }
        };

        if !self.log.append(message.clone()) {
            debug!("丢弃重复消息: {:?}", message.id);
            return Vec::new();
        }

        vec![Effect::Render(message), Effect::ScrollToBottom]
    }

    /// 连接错误只记录日志，重连由随后的 close 事件驱动
    pub fn on_error(&mut self, error: &str) -> Vec<Effect> {
        error!("聊天连接错误: {}", error);
        Vec::new()
    }

    /// 连接关闭
    pub fn on_close(&mut self, code: Option<u16>, reason: &str) -> Vec<Effect> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {}
            _ => return Vec::new(),
        }

        info!("聊天连接已关闭: code={:?}, reason={}", code, reason);

        if self.attempts >= self.policy.max_attempts {
            error!("重连 {} 次后仍失败，放弃重连", self.attempts);
            self.state = ConnectionState::Failed;
            return vec![Effect::Notify(Notice::Failed)];
        }

        let delay = self.policy.delay_for(self.attempts);
        self.state = ConnectionState::Backoff { attempt: self.attempts };

        let mut effects = Vec::new();
        if self.attempts > self.policy.notice_threshold {
            effects.push(Effect::ScheduleDegradedCheck(self.policy.degraded_grace));
        }
        effects.push(Effect::ScheduleReconnect(delay));

        warn!("{}毫秒后重新连接（已失败 {} 次）...", delay.as_millis(), self.attempts);
        effects
    }

    /// 重连定时器到期
    pub fn on_reconnect_due(&mut self) -> Vec<Effect> {
        if !matches!(self.state, ConnectionState::Backoff { .. }) {
            return Vec::new();
        }
        self.attempts += 1;
        self.connect()
    }

    /// 服务异常检查定时器到期
    pub fn on_degraded_check(&mut self) -> Vec<Effect> {
        match self.state {
            ConnectionState::Backoff { .. } | ConnectionState::Connecting => {
                vec![Effect::Notify(Notice::Degraded)]
            }
            _ => Vec::new(),
        }
    }

    /// 发送用户输入，空白输入或未连接时不做任何事
    pub fn send(&mut self, text: &str) -> Vec<Effect> {
        if text.trim().is_empty() || self.state != ConnectionState::Open {
            return Vec::new();
        }

        let message = ChatMessage::user(text);
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("序列化聊天消息失败: {}", e);
                return Vec::new();
            }
        };

        // 服务端不会回显，先在本地追加
        self.log.append(message.clone());

        vec![
            Effect::Render(message),
            Effect::ScrollToBottom,
            Effect::Transmit(json),
        ]
    }

    /// 拆除：关闭连接并清理定时器，之后的事件都被忽略
    pub fn teardown(&mut self) -> Vec<Effect> {
        if self.state == ConnectionState::Closed {
            return Vec::new();
        }
        self.state = ConnectionState::Closed;
        vec![Effect::CancelTimers, Effect::CloseSocket]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MessageKind;
    use serde_json::json;

    fn open_manager() -> ConnectionManager {
        let mut manager = ConnectionManager::new(ReconnectPolicy::default());
        assert_eq!(manager.connect(), vec![Effect::OpenSocket]);
        assert!(manager.on_open().is_empty());
        manager
    }

    fn reconnect_delay(effects: &[Effect]) -> Option<Duration> {
        effects.iter().find_map(|e| match e {
            Effect::ScheduleReconnect(d) => Some(*d),
            _ => None,
        })
    }

    fn notices(effects: &[Effect]) -> Vec<Notice> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Notify(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    /// 一次失败的重连：定时器到期后连接失败（error + close）
    fn fail_reconnect(manager: &mut ConnectionManager) -> Vec<Effect> {
        assert_eq!(manager.on_reconnect_due(), vec![Effect::OpenSocket]);
        assert!(manager.on_error("refused").is_empty());
        manager.on_close(None, "refused")
    }

    #[test]
    fn test_connect_is_noop_while_connecting_or_open() {
        let mut manager = ConnectionManager::new(ReconnectPolicy::default());
        assert_eq!(manager.connect(), vec![Effect::OpenSocket]);
        assert!(manager.connect().is_empty());
        manager.on_open();
        assert_eq!(manager.state(), ConnectionState::Open);
        assert!(manager.connect().is_empty());
    }

    #[test]
    fn test_greeting_added_once() {
        let manager = ConnectionManager::with_greeting(ReconnectPolicy::default(), "Welcome!");
        assert_eq!(manager.messages().len(), 1);
        assert_eq!(manager.messages()[0].kind, MessageKind::System);
        assert_eq!(manager.messages()[0].content, "Welcome!");
    }

    #[test]
    fn test_duplicate_ids_render_once() {
        let mut manager = open_manager();
        let payload = json!({
            "type": "message",
            "content": "hi",
            "sender": "user",
            "timestamp": 1700000000000i64,
            "id": "abc"
        })
        .to_string();

        let effects = manager.on_message(&payload);
        assert!(matches!(effects.as_slice(), [Effect::Render(_), Effect::ScrollToBottom]));
        assert!(manager.on_message(&payload).is_empty());
        assert_eq!(manager.messages().len(), 1);
    }

    #[test]
    fn test_malformed_message_dropped() {
        let mut manager = open_manager();
        assert!(manager.on_message("not json").is_empty());
        assert!(manager.on_message(r#"{"content":"missing type"}"#).is_empty());
        assert!(manager.messages().is_empty());
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[test]
    fn test_send_appends_locally_and_transmits() {
        let mut manager = open_manager();
        let effects = manager.send("hello");

        assert_eq!(effects.len(), 3);
        let local = match &effects[0] {
            Effect::Render(message) => message.clone(),
            other => panic!("unexpected effect: {:?}", other),
        };
        assert_eq!(local.sender.as_deref(), Some("user"));
        assert!(local.dedup_id().is_some());

        let wire = match &effects[2] {
            Effect::Transmit(json) => ChatMessage::from_json(json).unwrap(),
            other => panic!("unexpected effect: {:?}", other),
        };
        assert_eq!(wire, local);
        assert_eq!(manager.messages(), &[local]);
    }

    #[test]
    fn test_send_noop_on_blank_or_disconnected() {
        let mut manager = ConnectionManager::new(ReconnectPolicy::default());
        assert!(manager.send("hello").is_empty());

        manager.connect();
        assert!(manager.send("hello").is_empty());

        manager.on_open();
        assert!(manager.send("").is_empty());
        assert!(manager.send("   \n\t").is_empty());
        assert!(manager.messages().is_empty());
    }

    #[test]
    fn test_error_does_not_change_state() {
        let mut manager = open_manager();
        assert!(manager.on_error("boom").is_empty());
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[test]
    fn test_backoff_delays_and_ceiling() {
        let policy = ReconnectPolicy::default();
        let mut manager = open_manager();

        let first = manager.on_close(Some(1006), "network");
        assert_eq!(reconnect_delay(&first), Some(policy.base_delay));
        assert_eq!(manager.state(), ConnectionState::Backoff { attempt: 0 });

        for attempt in 1..policy.max_attempts {
            let effects = fail_reconnect(&mut manager);
            assert_eq!(manager.attempts(), attempt);
            assert_eq!(
                reconnect_delay(&effects),
                Some(policy.base_delay * (attempt + 1).min(5))
            );
        }

        // 第 5 次重连失败后放弃
        let effects = fail_reconnect(&mut manager);
        assert_eq!(manager.attempts(), 5);
        assert_eq!(reconnect_delay(&effects), None);
        assert_eq!(notices(&effects), vec![Notice::Failed]);
        assert_eq!(manager.state(), ConnectionState::Failed);

        assert!(manager.on_reconnect_due().is_empty());
        assert!(manager.connect().is_empty());
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for(7), Duration::from_secs(10));
    }

    #[test]
    fn test_restored_after_four_failures() {
        let mut manager = open_manager();
        manager.on_close(Some(1006), "network");

        let mut degraded_checks = 0;
        for _ in 0..4 {
            let effects = fail_reconnect(&mut manager);
            assert!(notices(&effects).is_empty());
            degraded_checks += effects
                .iter()
                .filter(|e| matches!(e, Effect::ScheduleDegradedCheck(_)))
                .count();
        }
        assert_eq!(degraded_checks, 2);
        assert_eq!(manager.on_degraded_check(), vec![Effect::Notify(Notice::Degraded)]);

        assert_eq!(manager.on_reconnect_due(), vec![Effect::OpenSocket]);
        assert_eq!(manager.on_open(), vec![Effect::Notify(Notice::Restored)]);
        assert_eq!(manager.attempts(), 0);
        assert!(manager.on_degraded_check().is_empty());

        // 下一次断线从头计数，不再提示恢复
        manager.on_close(Some(1006), "network");
        assert_eq!(manager.on_reconnect_due(), vec![Effect::OpenSocket]);
        assert!(manager.on_open().is_empty());
    }

    #[test]
    fn test_teardown_ignores_later_events() {
        let mut manager = open_manager();
        assert_eq!(
            manager.teardown(),
            vec![Effect::CancelTimers, Effect::CloseSocket]
        );
        assert!(manager.teardown().is_empty());

        assert!(manager.on_close(Some(1000), "bye").is_empty());
        assert!(manager.on_reconnect_due().is_empty());
        assert!(manager.on_degraded_check().is_empty());
        assert!(manager.on_message(r#"{"type":"system","content":"x","timestamp":1}"#).is_empty());
        assert!(manager.send("hello").is_empty());
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_open_after_teardown_closes_socket() {
        let mut manager = ConnectionManager::new(ReconnectPolicy::default());
        manager.connect();
        manager.teardown();
        assert_eq!(manager.on_open(), vec![Effect::CloseSocket]);
    }
}
