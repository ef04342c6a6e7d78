//! allcrypt v1 Header 实现
//!
//! Header 是 .acry 容器的固定 44 字节前缀，负责：
//! - 标识文件类型（magic）与版本
//! - 指明 KDF 与 AEAD 算法
//! - 提供密钥派生所需的 salt
//! - 提供 chunk nonce 所需的 base_nonce
//! - 记录 chunk 大小指数与原始明文长度
//!
//! 字节布局（多字节整数均为小端）：
//!
//! ```text
//! 0..4    magic "ACRY"
//! 4       version
//! 5       kdf id
//! 6       cipher id
//! 7       chunk_exp
//! 8..24   salt
//! 24..36  base_nonce
//! 36..44  original_size (u64)
//! ```
//!
//! 解码只做结构校验，永远不会因为密码错误而失败；
//! 密码是否正确由第一个 chunk 的认证标签决定。

use std::io::{ErrorKind, Read};

use zeroize::Zeroize;

use crate::algorithm::AeadAlgorithm;
use crate::error::{AllcryptError, Result};

/// 文件魔数（ASCII）
pub const MAGIC: &[u8; 4] = b"ACRY";

/// 当前支持的版本号
pub const VERSION: u8 = 0x01;

/// Argon2id（v0x13，默认参数）
pub const KDF_ARGON2ID: u8 = 0x01;

pub const SALT_SIZE: usize = 16;

/// base nonce 长度，与 AEAD nonce 等长
pub const BASE_NONCE_SIZE: usize = 12;

/// Header 固定大小
pub const HEADER_SIZE: usize = 4 + 1 + 1 + 1 + 1 + SALT_SIZE + BASE_NONCE_SIZE + 8;

/// 允许的 chunk_exp 范围（4 B ~ 16 MiB）
pub const MIN_CHUNK_EXP: u8 = 2;
pub const MAX_CHUNK_EXP: u8 = 24;

/// 默认 chunk_exp：1 MiB
pub const DEFAULT_CHUNK_EXP: u8 = 20;

/// allcrypt v1 Header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub kdf: u8,
    pub algorithm: AeadAlgorithm,
    pub chunk_exp: u8,
    pub salt: [u8; SALT_SIZE],
    pub base_nonce: [u8; BASE_NONCE_SIZE],
    pub original_size: u64,
}

impl Header {
    /// 创建新的 v1 Header（仅在加密任务初始化时使用）
    pub fn new(
        algorithm: AeadAlgorithm,
        salt: [u8; SALT_SIZE],
        base_nonce: [u8; BASE_NONCE_SIZE],
        chunk_exp: u8,
        original_size: u64,
    ) -> Self {
        Self {
            version: VERSION,
            kdf: KDF_ARGON2ID,
            algorithm,
            chunk_exp,
            salt,
            base_nonce,
            original_size,
        }
    }

    /// 明文 chunk 长度：2^chunk_exp
    pub fn chunk_size(&self) -> usize {
        1usize << self.chunk_exp
    }

    /// 编码为固定 44 字节
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];

        out[0..4].copy_from_slice(MAGIC);
        out[4] = self.version;
        out[5] = self.kdf;
        out[6] = self.algorithm.to_u8();
        out[7] = self.chunk_exp;
        out[8..24].copy_from_slice(&self.salt);
        out[24..36].copy_from_slice(&self.base_nonce);
        out[36..44].copy_from_slice(&self.original_size.to_le_bytes());

        out
    }

    /// 从恰好 44 字节解析 Header
    pub fn decode(data: &[u8]) -> Result<Self> {
        let data: &[u8; HEADER_SIZE] = data.try_into().map_err(|_| {
            AllcryptError::malformed(format!(
                "expected {HEADER_SIZE} bytes, got {}",
                data.len()
            ))
        })?;

        if &data[0..4] != MAGIC {
            return Err(AllcryptError::malformed("invalid magic"));
        }

        let version = data[4];
        if version != VERSION {
            return Err(AllcryptError::malformed(format!(
                "unsupported version {version}"
            )));
        }

        let kdf = data[5];
        if kdf != KDF_ARGON2ID {
            return Err(AllcryptError::malformed(format!("unknown kdf id {kdf}")));
        }

        let algorithm = AeadAlgorithm::from_u8(data[6]).ok_or_else(|| {
            AllcryptError::malformed(format!("unknown cipher id {}", data[6]))
        })?;

        let chunk_exp = data[7];
        validate_chunk_exp(chunk_exp).map_err(AllcryptError::MalformedHeader)?;

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&data[8..24]);

        let mut base_nonce = [0u8; BASE_NONCE_SIZE];
        base_nonce.copy_from_slice(&data[24..36]);

        let mut size_buf = [0u8; 8];
        size_buf.copy_from_slice(&data[36..44]);
        let original_size = u64::from_le_bytes(size_buf);

        Ok(Self {
            version,
            kdf,
            algorithm,
            chunk_exp,
            salt,
            base_nonce,
            original_size,
        })
    }

    /// 从输入流读取恰好 44 字节并解析
    ///
    /// 输入不足 44 字节视为格式错误，而不是 I/O 错误。
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        let filled = reader.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                AllcryptError::malformed("input shorter than the container header")
            }
            _ => AllcryptError::Input(e),
        });

        let header = filled.and_then(|()| Self::decode(&buf));
        buf.zeroize();
        header
    }
}

/// 清零 salt 与 base_nonce，其余字段不含秘密
impl Zeroize for Header {
    fn zeroize(&mut self) {
        self.salt.zeroize();
        self.base_nonce.zeroize();
    }
}

/// 校验 chunk_exp，返回可读的错误描述
pub fn validate_chunk_exp(chunk_exp: u8) -> std::result::Result<(), String> {
    if !(MIN_CHUNK_EXP..=MAX_CHUNK_EXP).contains(&chunk_exp) {
        return Err(format!(
            "chunk_exp {chunk_exp} outside {MIN_CHUNK_EXP}..={MAX_CHUNK_EXP}"
        ));
    }
    Ok(())
}
