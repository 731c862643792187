/// 聊天客户端驱动任务
///
/// 把用户命令、连接事件和定时器汇集到一个任务里，交给 `ConnectionManager`
/// 决定下一步，再执行它返回的副作用

use common::ChatMessage;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Sleep;
use tracing::{debug, info, warn};

use super::state::{ConnectionManager, Effect, Notice};
use super::transport::{Link, LinkEvent, Transport};

/// 用户侧命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// 发送一条消息
    Send(String),
    /// 拆除连接并退出
    Shutdown,
}

/// 推送给界面的事件
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// 消息列表新增一条
    Message(ChatMessage),
    /// 连接状态提示
    Notice(Notice),
    /// 列表应滚动到底部
    ScrollToBottom,
}

type Timer = Option<Pin<Box<Sleep>>>;

/// select 的唤醒来源
enum Wake {
    Command(Option<ClientCommand>),
    Link(LinkEvent),
    Reconnect,
    Degraded,
}

/// 聊天客户端
pub struct ChatClient {
    url: String,
    transport: Arc<dyn Transport>,
    manager: ConnectionManager,
    events: mpsc::UnboundedSender<ClientEvent>,
    link: Option<Link>,
    reconnect_timer: Timer,
    degraded_timer: Timer,
}

impl ChatClient {
    pub fn new(
        url: impl Into<String>,
        transport: Arc<dyn Transport>,
        manager: ConnectionManager,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        Self {
            url: url.into(),
            transport,
            manager,
            events,
            link: None,
            reconnect_timer: None,
            degraded_timer: None,
        }
    }

    /// 运行直到收到 Shutdown 或命令通道关闭，返回最终状态
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<ClientCommand>) -> ConnectionManager {
        let effects = self.manager.connect();
        self.apply(effects).await;

        loop {
            let wake = tokio::select! {
                command = commands.recv() => Wake::Command(command),
                event = next_link_event(&mut self.link) => Wake::Link(event),
                _ = fire(&mut self.reconnect_timer) => Wake::Reconnect,
                _ = fire(&mut self.degraded_timer) => Wake::Degraded,
            };

            let effects = match wake {
                Wake::Command(Some(ClientCommand::Send(text))) => self.manager.send(&text),
                Wake::Command(Some(ClientCommand::Shutdown)) | Wake::Command(None) => {
                    let effects = self.manager.teardown();
                    self.apply(effects).await;
                    break;
                }
                Wake::Link(LinkEvent::Text(text)) => self.manager.on_message(&text),
                Wake::Link(LinkEvent::Error(error)) => self.manager.on_error(&error),
                Wake::Link(LinkEvent::Closed { code, reason }) => {
                    self.link = None;
                    self.manager.on_close(code, &reason)
                }
                Wake::Reconnect => {
                    self.reconnect_timer = None;
                    self.manager.on_reconnect_due()
                }
                Wake::Degraded => {
                    self.degraded_timer = None;
                    self.manager.on_degraded_check()
                }
            };

            self.apply(effects).await;
        }

        info!("聊天客户端已停止");
        self.manager
    }

    /// 依次执行副作用，连接结果产生的后续副作用排在队尾
    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::OpenSocket => {
                    info!("尝试连接到聊天服务: {}", self.url);
                    let follow_up = match self.transport.connect(&self.url).await {
                        Ok(link) => {
                            self.link = Some(link);
                            self.manager.on_open()
                        }
                        Err(e) => {
                            // 与浏览器一致：连接失败表现为 error 之后的 close
                            let reason = e.to_string();
                            let mut follow_up = self.manager.on_error(&reason);
                            follow_up.extend(self.manager.on_close(None, &reason));
                            follow_up
                        }
                    };
                    queue.extend(follow_up);
                }
                Effect::Transmit(json) => match &self.link {
                    Some(link) => {
                        if link.outbound.send(json).is_err() {
                            warn!("连接已断开，消息未发送");
                        }
                    }
                    None => warn!("没有可用连接，消息未发送"),
                },
                Effect::CloseSocket => {
                    if self.link.take().is_some() {
                        debug!("已关闭聊天连接");
                    }
                }
                Effect::ScheduleReconnect(delay) => {
                    self.reconnect_timer = Some(Box::pin(tokio::time::sleep(delay)));
                }
                Effect::ScheduleDegradedCheck(delay) => {
                    self.degraded_timer = Some(Box::pin(tokio::time::sleep(delay)));
                }
                Effect::CancelTimers => {
                    self.reconnect_timer = None;
                    self.degraded_timer = None;
                }
                Effect::Render(message) => self.emit(ClientEvent::Message(message)),
                Effect::ScrollToBottom => self.emit(ClientEvent::ScrollToBottom),
                Effect::Notify(notice) => self.emit(ClientEvent::Notice(notice)),
            }
        }
    }

    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            debug!("界面事件接收端已关闭");
        }
    }
}

/// 没有连接时永远挂起；接收端意外结束视为连接关闭
async fn next_link_event(link: &mut Option<Link>) -> LinkEvent {
    match link {
        Some(link) => link.inbound.recv().await.unwrap_or(LinkEvent::Closed {
            code: None,
            reason: "连接通道已关闭".to_string(),
        }),
        None => std::future::pending().await,
    }
}

/// 没有定时器时永远挂起
async fn fire(timer: &mut Timer) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
