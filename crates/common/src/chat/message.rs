/// 聊天消息定义

use serde::{Deserialize, Serialize};

use crate::constants::USER_SENDER;
use crate::utils::{generate_message_id, now_millis};

/// 聊天消息类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// 用户消息
    Message,
    /// 系统消息（欢迎语、提示等）
    System,
}

/// 聊天消息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// 消息类型
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// 消息内容
    pub content: String,

    /// 发送者标记（未经服务端校验）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    /// 时间戳（毫秒）
    pub timestamp: i64,

    /// 客户端生成的消息 ID，仅用于客户端去重
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ChatMessage {
    /// 创建系统消息
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::System,
            content: content.into(),
            sender: None,
            timestamp: now_millis(),
            id: None,
        }
    }

    /// 创建本地用户消息，附带新生成的 ID
    pub fn user(content: impl Into<String>) -> Self {
        let timestamp = now_millis();
        Self {
            kind: MessageKind::Message,
            content: content.into(),
            sender: Some(USER_SENDER.to_string()),
            timestamp,
            id: Some(generate_message_id(timestamp)),
        }
    }

    /// 去重使用的 ID，空字符串视为没有 ID
    pub fn dedup_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn is_system(&self) -> bool {
        self.kind == MessageKind::System
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 从 JSON 字符串反序列化
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_message() {
        let msg = ChatMessage::system("hello");
        assert!(msg.is_system());
        assert_eq!(msg.sender, None);
        assert_eq!(msg.id, None);
        assert!(msg.timestamp > 0);
    }

    #[test]
    fn test_user_message() {
        let msg = ChatMessage::user("hi there");
        assert_eq!(msg.kind, MessageKind::Message);
        assert_eq!(msg.sender.as_deref(), Some("user"));
        let id = msg.dedup_id().unwrap();
        assert!(id.starts_with(&format!("{}-", msg.timestamp)));
    }

    #[test]
    fn test_wire_shape() {
        let msg = ChatMessage::system("welcome");
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "system");
        assert_eq!(value["content"], "welcome");
        assert!(value.get("sender").is_none());
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_parse_browser_payload() {
        let raw = json!({
            "type": "message",
            "content": "hi",
            "sender": "user",
            "timestamp": 1700000000000i64,
            "id": "abc"
        })
        .to_string();
        let msg = ChatMessage::from_json(&raw).unwrap();
        assert_eq!(msg.kind, MessageKind::Message);
        assert_eq!(msg.dedup_id(), Some("abc"));
        assert_eq!(msg.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_empty_id_is_not_a_dedup_key() {
        let raw = r#"{"type":"message","content":"x","timestamp":1,"id":""}"#;
        let msg = ChatMessage::from_json(raw).unwrap();
        assert_eq!(msg.dedup_id(), None);
    }

    #[test]
    fn test_reject_unknown_kind() {
        let raw = r#"{"type":"typing","content":"x","timestamp":1}"#;
        assert!(ChatMessage::from_json(raw).is_err());
    }
}
