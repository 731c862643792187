/// 传输层抽象
///
/// 驱动任务只通过一对通道与连接交互，便于在测试中替换为内存实现

use async_trait::async_trait;
use common::constants::CHAT_SUBPROTOCOL;
use common::{Error, Result};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// 连接上发生的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// 收到文本帧
    Text(String),
    /// 连接错误，随后一定会有 Closed
    Error(String),
    /// 连接已关闭
    Closed { code: Option<u16>, reason: String },
}

/// 一条已建立的连接。丢弃 `outbound` 即关闭连接
pub struct Link {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

/// 传输层
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// 建立连接
    async fn connect(&self, url: &str) -> Result<Link>;
}

/// 基于 tokio-tungstenite 的 WebSocket 传输
/// 握手时声明 `chat` 子协议
#[derive(Debug, Clone)]
pub struct TungsteniteTransport {
    connect_timeout: Duration,
}

impl TungsteniteTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn connect(&self, url: &str) -> Result<Link> {
        let mut request = url
            .into_client_request()
            .map_err(|e| Error::Connection(format!("无效的地址 {}: {}", url, e)))?;

        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(CHAT_SUBPROTOCOL));

        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| Error::Timeout(format!("连接 {} 超时", url)))?
            .map_err(|e| Error::Connection(e.to_string()))?;
        info!("✅ WebSocket 连接成功: {}", url);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<LinkEvent>();

        // 启动发送任务，outbound 被丢弃后发送关闭帧
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = ws_sender.send(Message::Text(text)).await {
                    error!("发送消息失败: {}", e);
                    break;
                }
            }
            let _ = ws_sender.close().await;
            debug!("发送任务结束");
        });

        // 启动接收任务
        tokio::spawn(async move {
            let closed = loop {
                match ws_receiver.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(LinkEvent::Text(text)).is_err() {
                            debug!("连接已被丢弃，接收任务结束");
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => {
                            if inbound_tx.send(LinkEvent::Text(text)).is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!("二进制转字符串失败: {}", e),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break LinkEvent::Closed {
                            code: frame.as_ref().map(|f| u16::from(f.code)),
                            reason: frame.map(|f| f.reason.to_string()).unwrap_or_default(),
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let reason = e.to_string();
                        let _ = inbound_tx.send(LinkEvent::Error(reason.clone()));
                        break LinkEvent::Closed { code: None, reason };
                    }
                    None => {
                        break LinkEvent::Closed {
                            code: None,
                            reason: "连接已断开".to_string(),
                        };
                    }
                }
            };
            let _ = inbound_tx.send(closed);
            debug!("接收任务结束");
        });

        Ok(Link {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
