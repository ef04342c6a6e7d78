//! allcrypt AEAD 算法模块。
//!
//! 统一管理可选算法与 Header 中的算法标识，具体实现见子模块。
//! 两种算法都使用 12 字节 nonce 与 16 字节认证标签，
//! 因此共享同一套 chunk 布局。

pub mod aes_256_gcm;
pub mod chacha20_poly1305;

use serde::{Deserialize, Serialize};

/// AEAD 认证标签长度
pub const TAG_SIZE: usize = 16;

/// 支持的 AEAD 算法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum AeadAlgorithm {
    #[default]
    #[serde(rename = "aes-256-gcm")]
    #[value(name = "aes-256-gcm")]
    Aes256Gcm,
    #[serde(rename = "chacha20-poly1305")]
    #[value(name = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

impl AeadAlgorithm {
    pub const AES_256_GCM_ID: u8 = 1;
    pub const CHACHA20_POLY1305_ID: u8 = 2;

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Aes256Gcm => Self::AES_256_GCM_ID,
            Self::ChaCha20Poly1305 => Self::CHACHA20_POLY1305_ID,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            Self::AES_256_GCM_ID => Some(Self::Aes256Gcm),
            Self::CHACHA20_POLY1305_ID => Some(Self::ChaCha20Poly1305),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Aes256Gcm => "aes-256-gcm",
            Self::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }
}
