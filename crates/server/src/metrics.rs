/// 中继指标
/// 
/// 使用独立的 prometheus Registry，避免多个实例之间互相冲突

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct RelayMetrics {
    registry: Registry,
    /// 当前存活连接数
    pub connections: IntGauge,
    /// 收到的消息数
    pub messages_received: IntCounter,
    /// 转发出去的消息数（按接收方计）
    pub messages_relayed: IntCounter,
    /// 无法解析而被丢弃的消息数
    pub malformed_messages: IntCounter,
    /// 在升级阶段被拒绝的连接数
    pub rejected_upgrades: IntCounter,
    /// 被存活扫描清理的连接数
    pub swept_connections: IntCounter,
}

impl RelayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let connections = IntGauge::new("chat_connections", "Live chat connections")?;
        let messages_received = IntCounter::new(
            "chat_messages_received_total",
            "Chat frames received from clients",
        )?;
        let messages_relayed = IntCounter::new(
            "chat_messages_relayed_total",
            "Chat frames forwarded to other clients",
        )?;
        let malformed_messages = IntCounter::new(
            "chat_malformed_messages_total",
            "Chat frames dropped because they were not valid JSON",
        )?;
        let rejected_upgrades = IntCounter::new(
            "chat_rejected_upgrades_total",
            "WebSocket upgrades rejected on the chat endpoint",
        )?;
        let swept_connections = IntCounter::new(
            "chat_swept_connections_total",
            "Dead connections removed by the liveness sweep",
        )?;

        registry.register(Box::new(connections.clone()))?;
        registry.register(Box::new(messages_received.clone()))?;
        registry.register(Box::new(messages_relayed.clone()))?;
        registry.register(Box::new(malformed_messages.clone()))?;
        registry.register(Box::new(rejected_upgrades.clone()))?;
        registry.register(Box::new(swept_connections.clone()))?;

        Ok(Self {
            registry,
            connections,
            messages_received,
            messages_relayed,
            malformed_messages,
            rejected_upgrades,
            swept_connections,
        })
    }

    /// 以 Prometheus 文本格式导出
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
