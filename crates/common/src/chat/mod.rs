/// 聊天消息模块
/// 
/// 定义聊天通道上传输的 JSON 消息格式

pub mod message;

pub use message::{ChatMessage, MessageKind};
