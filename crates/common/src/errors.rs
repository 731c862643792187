use thiserror::Error;

/// 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("连接错误: {0}")]
    Connection(String),

    #[error("连接超时: {0}")]
    Timeout(String),

    #[error("通道已关闭")]
    ChannelClosed,

    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, Error>;
