//! 输出端（Sink）
//!
//! 编排器的所有输出都经过 `OutputSink`：
//! - `MemorySink`：在内存中累积，完成时拼接为一段连续字节
//! - `PersistentSink`：追加写入外部存储，用于大文件
//!
//! 每个任务只会激活其中一种。写入顺序即 chunk 顺序，sink 不做重排。

pub mod memory;
pub mod persistent;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hygiene::SecretBytes;

pub use memory::MemorySink;
pub use persistent::{FsStore, PersistentSink, PersistentStore, SinkRecord};

/// 输出端选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkMode {
    /// 输入超过阈值时使用持久化输出
    #[default]
    Auto,
    Memory,
    Persistent,
}

impl SinkMode {
    /// 按阈值解析 `Auto`，返回是否使用持久化输出
    pub fn use_persistent(self, input_len: u64, threshold: u64) -> bool {
        match self {
            Self::Auto => input_len > threshold,
            Self::Memory => false,
            Self::Persistent => true,
        }
    }
}

/// 任务完成后的输出
pub enum SinkOutput {
    Memory(SecretBytes),
    Persistent { sink_id: String, size: u64 },
}

impl SinkOutput {
    pub fn len(&self) -> u64 {
        match self {
            Self::Memory(bytes) => bytes.len() as u64,
            Self::Persistent { size, .. } => *size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait OutputSink {
    /// 追加一个 chunk，sink 取得所有权并负责清理
    fn write(&mut self, chunk: Vec<u8>) -> Result<()>;

    /// 关闭输出并返回结果
    fn finish(self) -> Result<SinkOutput>;

    /// 任务失败时丢弃已写入的内容
    fn abort(self);
}

/// 运行时二选一的输出端
pub enum AnySink<S: PersistentStore> {
    Memory(MemorySink),
    Persistent(PersistentSink<S>),
}

impl<S: PersistentStore> OutputSink for AnySink<S> {
    fn write(&mut self, chunk: Vec<u8>) -> Result<()> {
        match self {
            Self::Memory(sink) => sink.write(chunk),
            Self::Persistent(sink) => sink.write(chunk),
        }
    }

    fn finish(self) -> Result<SinkOutput> {
        match self {
            Self::Memory(sink) => sink.finish(),
            Self::Persistent(sink) => sink.finish(),
        }
    }

    fn abort(self) {
        match self {
            Self::Memory(sink) => sink.abort(),
            Self::Persistent(sink) => sink.abort(),
        }
    }
}
