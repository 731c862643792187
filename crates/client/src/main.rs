/// Chat Relay - Client
/// 
/// 终端聊天客户端：从标准输入读取消息发送，打印收到的消息和连接提示

use common::ChatMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

mod config;
mod input;
mod ws;

use ws::{ChatClient, ClientCommand, ClientEvent, ConnectionManager, Notice, TungsteniteTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenvy::dotenv().ok();
    let cfg = config::Config::from_env()?;

    // 初始化日志，输出到 stderr，stdout 留给聊天内容
    // 可以通过环境变量 RUST_LOG 设置日志级别，例如：
    // RUST_LOG=client=debug cargo run --bin chat-client
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level))
        )
        .init();

    info!("🚀 启动 Chat Client...");
    info!("🎯 连接到 Server: {}", cfg.server_url);

    let manager = match &cfg.greeting {
        Some(greeting) => ConnectionManager::with_greeting(cfg.reconnect_policy(), greeting.as_str()),
        None => ConnectionManager::new(cfg.reconnect_policy()),
    };
    for message in manager.messages() {
        print_message(message);
    }

    let transport = Arc::new(TungsteniteTransport::new(cfg.connect_timeout()));
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    // 运行客户端（会自动重连）
    let client = ChatClient::new(cfg.server_url.clone(), transport, manager, event_tx);
    let client_task = tokio::spawn(client.run(command_rx));

    // 打印界面事件
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                ClientEvent::Message(message) => print_message(&message),
                ClientEvent::Notice(notice) => print_notice(notice),
                ClientEvent::ScrollToBottom => {}
            }
        }
    });

    // 读取标准输入，EOF 时退出
    input::spawn_line_reader(std::io::BufReader::new(std::io::stdin()), command_tx.clone());

    // Ctrl+C 退出
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("收到退出信号");
            let _ = command_tx.send(ClientCommand::Shutdown);
        }
    });

    let manager = client_task.await?;
    printer.await?;

    info!(
        "👋 客户端已退出: state={:?}, 连续失败 {} 次, 本次共 {} 条消息",
        manager.state(),
        manager.attempts(),
        manager.messages().len()
    );
    Ok(())
}

fn print_message(message: &ChatMessage) {
    if message.is_system() {
        println!("[system] {}", message.content);
    } else {
        let sender = message.sender.as_deref().unwrap_or("anonymous");
        println!("[{}] {}", sender, message.content);
    }
}

fn print_notice(notice: Notice) {
    if notice.is_destructive() {
        eprintln!("❌ {}: {}", notice.title(), notice.description());
    } else {
        eprintln!("ℹ️  {}: {}", notice.title(), notice.description());
    }
}
