/// WebSocket 模块
/// 
/// 聊天客户端的连接状态机、传输层和驱动任务

pub mod client;
pub mod message_log;
pub mod state;
pub mod transport;

pub use client::{ChatClient, ClientCommand, ClientEvent};
pub use state::{ConnectionManager, Notice, ReconnectPolicy};
pub use transport::TungsteniteTransport;
