/// 聊天中继相关常量

/// 聊天 WebSocket 端点路径
pub const CHAT_WS_PATH: &str = "/ws/chat";

/// 聊天子协议
pub const CHAT_SUBPROTOCOL: &str = "chat";

/// 开发工具热重载使用的子协议，聊天端点上必须拒绝
pub const HOT_RELOAD_SUBPROTOCOL: &str = "vite-hmr";

/// 本地用户消息的发送者标记
pub const USER_SENDER: &str = "user";

/// 默认 Server 端口
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// 存活扫描间隔（秒）
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// 重连基础延迟（毫秒）
pub const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 2000;

/// 最大重连次数
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// 重连延迟倍数上限
pub const RECONNECT_MULTIPLIER_CAP: u32 = 5;

/// 连续失败超过该次数后，恢复时提示“已恢复”
pub const RESTORED_NOTICE_THRESHOLD: u32 = 2;

/// 断线后等待多久提示“服务异常”（毫秒）
pub const DEGRADED_GRACE_MS: u64 = 5000;

/// 服务端欢迎消息
pub const DEFAULT_WELCOME_MESSAGE: &str = "Connected to chat server";

/// 登录会话默认有效期（24 小时）
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// SMTP 默认端口（STARTTLS）
pub const DEFAULT_SMTP_PORT: u16 = 587;
