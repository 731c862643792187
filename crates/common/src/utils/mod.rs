/// 工具函数集合

use rand::Rng;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 消息 ID 随机后缀长度
const ID_SUFFIX_LEN: usize = 9;

/// 当前时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 生成消息 ID，格式为 `<timestamp>-<9位base36随机串>`
pub fn generate_message_id(timestamp: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{}", timestamp, suffix)
}

/// 计算第 `attempt` 次失败后的重连延迟倍数：`min(attempt + 1, cap)`
pub fn backoff_multiplier(attempt: u32, cap: u32) -> u32 {
    attempt.saturating_add(1).min(cap)
}
