/// 聊天广播中继
///
/// 存活连接集合由单个 actor 任务独占，所有修改（加入、离开、广播、扫描）
/// 都通过命令通道串行执行，广播过程中的移除不会产生竞争

use common::{ChatMessage, Error, Result};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::metrics::RelayMetrics;

/// 连接 ID
pub type ConnectionId = Uuid;

/// 单个连接的出站通道
pub type OutboundSender = mpsc::UnboundedSender<String>;

/// 存活连接
struct LiveClient {
    id: ConnectionId,
    sender: OutboundSender,
}

impl LiveClient {
    /// 写端任务退出后接收端被丢弃，通道即视为已关闭
    fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// actor 命令
enum RelayCommand {
    Join {
        id: ConnectionId,
        sender: OutboundSender,
        reply: oneshot::Sender<()>,
    },
    Leave {
        id: ConnectionId,
    },
    Broadcast {
        from: ConnectionId,
        payload: String,
        reply: oneshot::Sender<usize>,
    },
    Sweep {
        reply: oneshot::Sender<Vec<ConnectionId>>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
}

/// 中继句柄，可随意克隆
#[derive(Clone)]
pub struct ChatRelay {
    commands: mpsc::UnboundedSender<RelayCommand>,
}

impl ChatRelay {
    /// 启动 actor 任务并返回句柄
    pub fn spawn(config: RelayConfig, metrics: RelayMetrics) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = RelayActor {
            clients: Vec::new(),
            welcome_message: config.welcome_message,
            metrics,
        };
        tokio::spawn(actor.run(rx));
        Self { commands: tx }
    }

    /// 加入存活集合，并只向该连接发送一条欢迎消息
    pub async fn join(&self, sender: OutboundSender) -> Result<ConnectionId> {
        let id = Uuid::new_v4();
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Join { id, sender, reply })?;
        rx.await.map_err(|_| Error::ChannelClosed)?;
        Ok(id)
    }

    /// 移除连接，重复调用无副作用
    pub fn leave(&self, id: ConnectionId) {
        if self.send(RelayCommand::Leave { id }).is_err() {
            warn!("中继已停止，无法注销连接: {}", id);
        }
    }

    /// 将原始消息转发给除发送者之外的所有存活连接，返回实际投递数
    pub async fn broadcast(&self, from: ConnectionId, payload: String) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Broadcast { from, payload, reply })?;
        rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// 清理已失效的连接，返回被清理的连接 ID
    pub async fn sweep(&self) -> Result<Vec<ConnectionId>> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Sweep { reply })?;
        rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// 存活连接数量
    pub async fn count(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Count { reply })?;
        rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// 启动周期性存活扫描任务
    pub fn start_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let relay = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                match relay.sweep().await {
                    Ok(removed) if !removed.is_empty() => {
                        warn!("存活扫描: 清理了 {} 个失效连接", removed.len());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("存活扫描失败，停止扫描: {}", e);
                        break;
                    }
                }
            }
        })
    }

    fn send(&self, command: RelayCommand) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::ChannelClosed)
    }
}

/// 持有存活集合的 actor
struct RelayActor {
    /// 按加入顺序排列
    clients: Vec<LiveClient>,
    welcome_message: String,
    metrics: RelayMetrics,
}

impl RelayActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<RelayCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                RelayCommand::Join { id, sender, reply } => {
                    self.join(id, sender);
                    let _ = reply.send(());
                }
                RelayCommand::Leave { id } => self.leave(id),
                RelayCommand::Broadcast { from, payload, reply } => {
                    let delivered = self.broadcast(from, payload);
                    let _ = reply.send(delivered);
                }
                RelayCommand::Sweep { reply } => {
                    let removed = self.sweep();
                    let _ = reply.send(removed);
                }
                RelayCommand::Count { reply } => {
                    let _ = reply.send(self.clients.len());
                }
            }
            self.metrics.connections.set(self.clients.len() as i64);
        }
        debug!("中继 actor 已退出");
    }

    fn join(&mut self, id: ConnectionId, sender: OutboundSender) {
        match ChatMessage::system(self.welcome_message.as_str()).to_json() {
            Ok(welcome) => {
                if sender.send(welcome).is_err() {
                    debug!("连接 {} 在欢迎消息发送前已关闭", id);
                }
            }
            Err(e) => error!("序列化欢迎消息失败: {}", e),
        }

        self.clients.push(LiveClient { id, sender });
        info!("聊天连接已加入: {} (当前 {} 个)", id, self.clients.len());
    }

    fn leave(&mut self, id: ConnectionId) {
        let before = self.clients.len();
        self.clients.retain(|client| client.id != id);
        if self.clients.len() < before {
            info!("聊天连接已移除: {} (当前 {} 个)", id, self.clients.len());
        }
    }

    fn broadcast(&mut self, from: ConnectionId, payload: String) -> usize {
        let mut delivered = 0;

        for client in self.clients.iter().filter(|c| c.id != from && c.is_open()) {
            if client.sender.send(payload.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!("连接 {} 已关闭，跳过转发", client.id);
            }
        }

        self.metrics.messages_relayed.inc_by(delivered as u64);
        debug!("消息已从 {} 转发到 {} 个连接", from, delivered);
        delivered
    }

    fn sweep(&mut self) -> Vec<ConnectionId> {
        let removed: Vec<ConnectionId> = self
            .clients
            .iter()
            .filter(|c| !c.is_open())
            .map(|c| c.id)
            .collect();

        if !removed.is_empty() {
            self.clients.retain(LiveClient::is_open);
            self.metrics.swept_connections.inc_by(removed.len() as u64);
            for id in &removed {
                info!("已清理失效连接: {}", id);
            }
        }

        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MessageKind;

    fn relay() -> (ChatRelay, RelayMetrics) {
        let metrics = RelayMetrics::new().unwrap();
        let relay = ChatRelay::spawn(RelayConfig::default(), metrics.clone());
        (relay, metrics)
    }

    async fn join(relay: &ChatRelay) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = relay.join(tx).await.unwrap();
        // 吃掉欢迎消息
        let welcome = rx.recv().await.unwrap();
        assert!(ChatMessage::from_json(&welcome).unwrap().is_system());
        (id, rx)
    }

    #[tokio::test]
    async fn test_join_sends_single_welcome() {
        let (relay, _) = relay();
        let (tx, mut rx) = mpsc::unbounded_channel();
        relay.join(tx).await.unwrap();

        let welcome = ChatMessage::from_json(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(welcome.kind, MessageKind::System);
        assert!(!welcome.content.is_empty());
        assert!(rx.try_recv().is_err());
        assert_eq!(relay.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let (relay, metrics) = relay();
        let (a, mut rx_a) = join(&relay).await;
        let (_b, mut rx_b) = join(&relay).await;
        let (_c, mut rx_c) = join(&relay).await;

        let payload = r#"{"type":"message","content":"hi","sender":"user","timestamp":1,"id":"abc"}"#;
        let delivered = relay.broadcast(a, payload.to_string()).await.unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(rx_b.recv().await.unwrap(), payload);
        assert_eq!(rx_c.recv().await.unwrap(), payload);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(metrics.messages_relayed.get(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_skips_closed_clients() {
        let (relay, _) = relay();
        let (a, _rx_a) = join(&relay).await;
        let (_b, rx_b) = join(&relay).await;
        drop(rx_b);

        let delivered = relay.broadcast(a, "{}".to_string()).await.unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_leave_removes_client() {
        let (relay, metrics) = relay();
        let (a, _rx_a) = join(&relay).await;
        let (b, _rx_b) = join(&relay).await;

        relay.leave(a);
        relay.leave(a);
        assert_eq!(relay.count().await.unwrap(), 1);
        assert_eq!(metrics.connections.get(), 1);

        let delivered = relay.broadcast(b, "{}".to_string()).await.unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_leave_drops_outbound_sender() {
        let (relay, _) = relay();
        let (a, mut rx_a) = join(&relay).await;

        relay.leave(a);
        assert!(rx_a.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_dead_clients() {
        let (relay, metrics) = relay();
        let (_a, _rx_a) = join(&relay).await;
        let (b, rx_b) = join(&relay).await;

        // 写端消失但没有走 leave
        drop(rx_b);

        let removed = relay.sweep().await.unwrap();
        assert_eq!(removed, vec![b]);
        assert_eq!(relay.count().await.unwrap(), 1);
        assert_eq!(metrics.swept_connections.get(), 1);

        assert!(relay.sweep().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_on_interval() {
        let (relay, _) = relay();
        let (_a, rx_a) = join(&relay).await;
        drop(rx_a);

        let interval = Duration::from_secs(30);
        let handle = relay.start_sweeper(interval);

        tokio::time::sleep(interval + Duration::from_millis(10)).await;
        assert_eq!(relay.count().await.unwrap(), 0);
        handle.abort();
    }
}
