/// WebSocket 模块
/// 
/// 聊天端点的升级过滤、连接处理和广播中继

pub mod handler;
pub mod relay;

pub use handler::handle_chat_websocket;
pub use relay::ChatRelay;
