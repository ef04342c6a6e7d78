//! 单个加密 / 解密任务
//!
//! 状态机：`Idle -> Initializing -> Iterating -> Finalizing -> Done`，
//! 任意阶段出错都会进入 `Failed`。
//!
//! 任务拥有密码（派生密钥后立即清零）、处理进度以及输出端。
//! 失败时不做任何局部恢复：清理敏感缓冲区、丢弃输出、返回唯一的错误。

use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::crypto::CipherEngine;
use crate::error::{AllcryptError, Result};
use crate::hygiene::Password;
use crate::sink::{OutputSink, SinkOutput};
use crate::{decrypt, encrypt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Encrypt { chunk_exp: u8 },
    Decrypt,
}

impl JobKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Encrypt { .. } => "encrypt",
            Self::Decrypt => "decrypt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Idle,
    Initializing,
    Iterating,
    Finalizing,
    Done,
    Failed,
}

/// 进度事件
///
/// 只是提示信息，丢失或合并都不影响结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub processed: u64,
    pub total: u64,
}

/// 进度回调；返回错误会中止任务（例如调用方已经断开）
pub type ProgressFn<'a> = dyn FnMut(Progress) -> Result<()> + 'a;

pub struct Job {
    kind: JobKind,
    phase: JobPhase,
    password: Option<Password>,
    processed: u64,
    total: u64,
}

impl Job {
    /// `total` 为输入明文长度
    pub fn encrypt(password: Password, total: u64, chunk_exp: u8) -> Self {
        Self::new(JobKind::Encrypt { chunk_exp }, password, total)
    }

    /// `total` 在读取 Header 后才确定
    pub fn decrypt(password: Password) -> Self {
        Self::new(JobKind::Decrypt, password, 0)
    }

    fn new(kind: JobKind, password: Password, total: u64) -> Self {
        Self {
            kind,
            phase: JobPhase::Idle,
            password: Some(password),
            processed: 0,
            total,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub(crate) fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    pub(crate) fn enter(&mut self, phase: JobPhase) {
        debug!(job = self.kind.name(), from = ?self.phase, to = ?phase, "job phase");
        self.phase = phase;
    }

    /// 取出密码；调用方用完即 drop（清零）
    pub(crate) fn take_password(&mut self) -> Result<Password> {
        self.password
            .take()
            .ok_or_else(|| AllcryptError::Engine("password already consumed".into()))
    }

    pub(crate) fn report(&mut self, processed: u64, on_progress: &mut ProgressFn<'_>) -> Result<()> {
        self.processed = processed.min(self.total);
        on_progress(Progress {
            processed: self.processed,
            total: self.total,
        })
    }

    /// 执行任务直到完成或失败
    ///
    /// 成功时返回输出端的结果；失败时输出端会被 abort。
    pub fn run<E, R, S>(
        mut self,
        engine: &E,
        input: R,
        mut sink: S,
        on_progress: &mut ProgressFn<'_>,
    ) -> Result<SinkOutput>
    where
        E: CipherEngine,
        R: Read,
        S: OutputSink,
    {
        info!(job = self.kind.name(), total = self.total, "job started");

        let outcome = match self.kind {
            JobKind::Encrypt { chunk_exp } => {
                encrypt::run(engine, &mut self, chunk_exp, input, &mut sink, on_progress)
            }
            JobKind::Decrypt => decrypt::run(engine, &mut self, input, &mut sink, on_progress),
        };

        // 无论成败，密码都不再需要
        self.password = None;

        if let Err(err) = outcome {
            sink.abort();
            self.fail(&err);
            return Err(err);
        }

        self.enter(JobPhase::Finalizing);
        match sink.finish() {
            Ok(output) => {
                self.enter(JobPhase::Done);
                info!(job = self.kind.name(), size = output.len(), "job finished");
                Ok(output)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    fn fail(&mut self, err: &AllcryptError) {
        self.enter(JobPhase::Failed);
        warn!(job = self.kind.name(), processed = self.processed, error = %err, "job failed");
    }
}
