//! 调用方与执行器之间的消息协议
//!
//! 所有消息都可以序列化（JSON 中以 `type` 字段区分），
//! 调用方与执行器之间不共享任何内存。
//!
//! 调用方 → 执行器：
//! `INITIALIZE` / `RUN_ENCRYPT` / `RUN_DECRYPT` / `CLEAR_RESULT` / `CLEANUP_PERSISTENT`
//!
//! 执行器 → 调用方：
//! `READY` / `PROGRESS` / `DONE` / `DONE_PERSISTENT` / `ERROR` / `CLEARED` / `CLEANED_PERSISTENT`
//!
//! 前置条件：同一执行器同一时间只允许一个任务，
//! 在收到 `DONE*` / `ERROR` 之前再次发送 `RUN_*` 会被拒绝。

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::hygiene::Password;
use crate::sink::SinkMode;

/// 任务输入
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobInput {
    /// 本地文件，由执行器打开
    Path(PathBuf),
    /// 直接转交给执行器的字节，任务结束后清零
    Bytes(Vec<u8>),
}

impl fmt::Debug for JobInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Initialize,
    RunEncrypt {
        password: Password,
        input: JobInput,
        /// 为空时使用配置中的默认值
        #[serde(default)]
        chunk_exp: Option<u8>,
        #[serde(default)]
        sink_mode: SinkMode,
        /// 持久化输出的名称，为空时自动生成
        #[serde(default)]
        sink_name: Option<String>,
    },
    RunDecrypt {
        password: Password,
        input: JobInput,
        #[serde(default)]
        sink_mode: SinkMode,
        #[serde(default)]
        sink_name: Option<String>,
    },
    ClearResult,
    CleanupPersistent {
        sink_id: String,
    },
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Ready,
    Progress { processed: u64, total: u64 },
    Done { bytes: Vec<u8> },
    DonePersistent { sink_id: String, size: u64 },
    Error { message: String },
    Cleared,
    CleanedPersistent { sink_id: String },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// 是否是某个请求的最终应答（`Progress` 之外的所有消息）
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("Ready"),
            Self::Progress { processed, total } => f
                .debug_struct("Progress")
                .field("processed", processed)
                .field("total", total)
                .finish(),
            Self::Done { bytes } => write!(f, "Done({} bytes)", bytes.len()),
            Self::DonePersistent { sink_id, size } => f
                .debug_struct("DonePersistent")
                .field("sink_id", sink_id)
                .field("size", size)
                .finish(),
            Self::Error { message } => f.debug_struct("Error").field("message", message).finish(),
            Self::Cleared => f.write_str("Cleared"),
            Self::CleanedPersistent { sink_id } => f
                .debug_struct("CleanedPersistent")
                .field("sink_id", sink_id)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_use_tagged_json() {
        let json = r#"{"type":"RUN_DECRYPT","password":"pw","input":{"path":"/tmp/a.acry"},"sink_mode":"persistent"}"#;
        let request: Request = serde_json::from_str(json).expect("parse request");

        match request {
            Request::RunDecrypt {
                password,
                input: JobInput::Path(path),
                sink_mode,
                sink_name,
            } => {
                assert_eq!(password.as_bytes(), b"pw");
                assert_eq!(path, PathBuf::from("/tmp/a.acry"));
                assert_eq!(sink_mode, SinkMode::Persistent);
                assert!(sink_name.is_none());
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn responses_serialize_with_type_tag() {
        let json = serde_json::to_string(&Response::Progress {
            processed: 4,
            total: 13,
        })
        .expect("serialize");
        assert_eq!(json, r#"{"type":"PROGRESS","processed":4,"total":13}"#);

        let back: Response = serde_json::from_str(r#"{"type":"CLEARED"}"#).expect("parse");
        assert_eq!(back, Response::Cleared);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let request = Request::RunEncrypt {
            password: Password::new("hunter2"),
            input: JobInput::Bytes(b"top secret".to_vec()),
            chunk_exp: None,
            sink_mode: SinkMode::Memory,
            sink_name: None,
        };
        let shown = format!("{request:?}");
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("top secret"));

        let done = Response::Done {
            bytes: b"plaintext".to_vec(),
        };
        assert_eq!(format!("{done:?}"), "Done(9 bytes)");
    }
}
