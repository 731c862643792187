/// Chat Relay - 公共库
/// 
/// 提供 Server 和 Client 共享的消息类型、错误处理、常量和工具函数

pub mod chat;
pub mod constants;
pub mod errors;
pub mod utils;

// 重新导出常用类型
pub use chat::{ChatMessage, MessageKind};
pub use errors::{Error, Result};
