use thiserror::Error;

/// allcrypt 统一错误类型
///
/// 任一变体都代表一次任务的终止（不做自动重试）。
/// Display 文本会原样作为 `Response::Error` 的 message 返回给调用方。
#[derive(Debug, Error)]
pub enum AllcryptError {
    /// 执行器尚未收到 Initialize
    #[error("not initialized")]
    NotInitialized,

    /// 已有任务在执行
    #[error("job already in progress")]
    JobInProgress,

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// 认证标签校验失败：密码错误、数据损坏或被截断
    #[error("authentication failed at chunk {chunk_index}: wrong password or corrupted data")]
    Authentication { chunk_index: u32 },

    #[error("sink I/O error: {0}")]
    SinkIo(#[source] std::io::Error),

    #[error("input I/O error: {0}")]
    Input(#[from] std::io::Error),

    #[error("cipher engine error: {0}")]
    Engine(String),

    /// 调用方已断开（执行器被销毁）
    #[error("job aborted: {0}")]
    Aborted(String),

    /// 执行器返回的 `Error` 消息，原样保留
    #[error("{0}")]
    Executor(String),
}

impl AllcryptError {
    pub fn sink(err: std::io::Error) -> Self {
        Self::SinkIo(err)
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedHeader(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AllcryptError>;
