/// 已显示的消息列表

use common::ChatMessage;

/// 按到达顺序保存消息，带 ID 的消息只保留第一次出现
#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否已存在相同 ID 的消息（线性扫描）
    pub fn contains_id(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.dedup_id() == Some(id))
    }

    /// 追加消息，重复 ID 时返回 false
    pub fn append(&mut self, message: ChatMessage) -> bool {
        if let Some(id) = message.dedup_id() {
            if self.contains_id(id) {
                return false;
            }
        }
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}
