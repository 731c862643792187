/// 终端输入
///
/// 读取在独立线程上进行。阻塞中的读取不属于 tokio 的阻塞线程池，
/// 运行时关闭时不会等它

use std::io::BufRead;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::error;

use crate::ws::ClientCommand;

/// 每行输入作为一次发送，EOF 或读取失败时请求退出
pub fn spawn_line_reader<R>(reader: R, commands: mpsc::UnboundedSender<ClientCommand>) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    std::thread::spawn(move || {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if commands.send(ClientCommand::Send(line)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    error!("读取输入失败: {}", e);
                    break;
                }
            }
        }
        let _ = commands.send(ClientCommand::Shutdown);
    })
}
