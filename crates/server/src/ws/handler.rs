/// 聊天 WebSocket 连接处理器
///
/// 在升级阶段过滤子协议，并处理与聊天客户端的连接和消息

use axum::extract::ws::{Message as AxumWsMessage, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::{
    header::{CONNECTION, SEC_WEBSOCKET_PROTOCOL},
    HeaderMap, StatusCode,
};
use axum::response::{IntoResponse, Response};
use common::constants::{CHAT_SUBPROTOCOL, HOT_RELOAD_SUBPROTOCOL};
use common::{ChatMessage, MessageKind};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::relay::{ChatRelay, ConnectionId};
use crate::app_state::AppState;
use crate::metrics::RelayMetrics;
use crate::services::ChatNotifier;

/// 读端结束后等待写端发出关闭帧的时间
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// 子协议协商结果
#[derive(Debug, PartialEq, Eq)]
pub enum ProtocolDecision {
    /// 接受升级，可选地回应选中的子协议
    Accept(Option<&'static str>),
    /// 拒绝升级
    Reject(String),
}

/// 解析请求头中的子协议列表
pub fn requested_protocols(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|protocol| !protocol.is_empty())
        .map(str::to_string)
        .collect()
}

/// 只接受未声明子协议或声明了 `chat` 的请求，热重载协议一律拒绝
pub fn negotiate_protocol(requested: &[String]) -> ProtocolDecision {
    if requested.is_empty() {
        return ProtocolDecision::Accept(None);
    }

    if requested.iter().any(|p| p == HOT_RELOAD_SUBPROTOCOL) {
        return ProtocolDecision::Reject(format!(
            "子协议 {} 不属于聊天端点",
            HOT_RELOAD_SUBPROTOCOL
        ));
    }

    if requested.iter().any(|p| p == CHAT_SUBPROTOCOL) {
        return ProtocolDecision::Accept(Some(CHAT_SUBPROTOCOL));
    }

    ProtocolDecision::Reject(format!("不支持的子协议: {}", requested.join(", ")))
}

/// WebSocket 升级处理器
pub async fn handle_chat_websocket(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    match negotiate_protocol(&requested_protocols(&headers)) {
        ProtocolDecision::Accept(protocol) => {
            let ws = match protocol {
                Some(protocol) => ws.protocols([protocol]),
                None => ws,
            };
            ws.on_upgrade(move |socket| handle_chat_connection(socket, state))
                .into_response()
        }
        ProtocolDecision::Reject(reason) => {
            warn!("拒绝聊天端点的 WebSocket 升级: {}", reason);
            state.metrics().rejected_upgrades.inc();
            // 拒绝后不复用该 TCP 连接
            (StatusCode::BAD_REQUEST, [(CONNECTION, "close")], reason).into_response()
        }
    }
}

/// 处理聊天 WebSocket 连接
async fn handle_chat_connection(socket: WebSocket, state: AppState) {
    let relay = state.relay();
    let metrics = state.metrics();
    let notifier = state.notifier();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // 创建消息发送通道，发送端交给中继持有
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let connection_id = match relay.join(tx).await {
        Ok(id) => id,
        Err(e) => {
            error!("注册聊天连接失败: {}", e);
            let _ = ws_sender.close().await;
            return;
        }
    };
    info!("新的聊天 WebSocket 连接: {}", connection_id);

    // 创建消息发送任务，中继移除连接后通道关闭，任务随之发送关闭帧
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = ws_sender.send(AxumWsMessage::Text(text)).await {
                warn!("发送聊天消息失败: {}", e);
                break;
            }
        }
        let _ = ws_sender.close().await;
        debug!("聊天消息发送任务结束");
    });

    // 创建消息接收任务
    let relay_clone = relay.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(AxumWsMessage::Text(text)) => {
                    handle_chat_text(&relay_clone, &metrics, &notifier, connection_id, text).await;
                }
                Ok(AxumWsMessage::Binary(data)) => {
                    debug!("忽略二进制消息: {} bytes", data.len());
                }
                Ok(AxumWsMessage::Close(frame)) => {
                    debug!("客户端关闭连接: {} {:?}", connection_id, frame);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("接收聊天消息错误: connection={}, error={}", connection_id, e);
                    break;
                }
            }
        }
        debug!("聊天消息接收任务结束");
    });

    // 等待任一任务完成
    let recv_finished = tokio::select! {
        _ = &mut send_task => false,
        _ = &mut recv_task => true,
    };

    // 清理：从存活集合中移除
    relay.leave(connection_id);

    if recv_finished {
        if tokio::time::timeout(CLOSE_GRACE, &mut send_task).await.is_err() {
            send_task.abort();
        }
    } else {
        recv_task.abort();
    }

    info!("聊天连接已关闭: {}", connection_id);
}

/// 处理收到的文本帧：能解析为 JSON 的原样转发，否则记录并丢弃
///
/// 用户聊天消息另外触发一次邮件通知
async fn handle_chat_text(
    relay: &ChatRelay,
    metrics: &RelayMetrics,
    notifier: &ChatNotifier,
    from: ConnectionId,
    text: String,
) {
    metrics.messages_received.inc();

    let value = match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => value,
        Err(e) => {
            warn!("丢弃无法解析的聊天消息: connection={}, error={}", from, e);
            metrics.malformed_messages.inc();
            return;
        }
    };

    if let Some(message) = user_message(value) {
        notifier.notify_chat(&message.content, message.sender.as_deref());
    }

    match relay.broadcast(from, text).await {
        Ok(delivered) => debug!("连接 {} 的消息已转发给 {} 个连接", from, delivered),
        Err(e) => error!("转发聊天消息失败: {}", e),
    }
}

/// 只有 `message` 类型且有内容的负载算用户聊天消息
fn user_message(value: serde_json::Value) -> Option<ChatMessage> {
    serde_json::from_value::<ChatMessage>(value)
        .ok()
        .filter(|message| message.kind == MessageKind::Message && !message.content.trim().is_empty())
}
