//! allcrypt：分块 AEAD 容器格式的流式加解密
//!
//! 容器布局：44 字节 Header，随后是若干 `2^chunk_exp + 16` 字节的加密 chunk，
//! 最后一个 chunk 可以更短。

mod decrypt;
mod encrypt;

pub mod algorithm;
pub mod config;
pub mod crypto;
pub mod error;
pub mod executor;
pub mod format;
pub mod fs;
pub mod hygiene;
pub mod job;
pub mod protocol;
pub mod sink;

pub use algorithm::AeadAlgorithm;
pub use config::Config;
pub use crypto::{AeadEngine, CipherEngine};
pub use decrypt::{decrypt_bytes, decrypt_file};
pub use encrypt::{encrypt_bytes, encrypt_file};
pub use error::{AllcryptError, Result};
pub use executor::{ExecutorHandle, JobResult};
pub use format::header::{DEFAULT_CHUNK_EXP, Header};
pub use hygiene::{Password, SecretBytes};
pub use job::{Job, JobPhase, Progress};
pub use protocol::{JobInput, Request, Response};
pub use sink::{FsStore, OutputSink, PersistentSink, SinkMode, SinkOutput};

use std::io;
use std::path::Path;

/// 使用默认算法（AES-256-GCM）与默认 chunk 大小加密文件
pub fn encrypt(input: &Path, output: &Path, password: &str) -> Result<u64> {
    encrypt_with_algorithm(input, output, password, AeadAlgorithm::default())
}

pub fn encrypt_with_algorithm(
    input: &Path,
    output: &Path,
    password: &str,
    algorithm: AeadAlgorithm,
) -> Result<u64> {
    encrypt_file(
        &AeadEngine::new(algorithm),
        input,
        output,
        Password::from(password),
        DEFAULT_CHUNK_EXP,
    )
}

/// 解密文件，算法由 Header 决定
pub fn decrypt(input: &Path, output: &Path, password: &str) -> Result<u64> {
    decrypt_file(&AeadEngine::default(), input, output, Password::from(password))
}

/// 以输出文件所在目录为存储、文件名为资源名的持久化输出端
pub(crate) fn persistent_sink_for(output: &Path) -> Result<PersistentSink<FsStore>> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let name = output
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            AllcryptError::sink(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("output path {} has no usable file name", output.display()),
            ))
        })?;

    PersistentSink::create(FsStore::new(dir), name)
}
