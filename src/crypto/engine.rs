//! 密码引擎接口
//!
//! 编排器只依赖这四个操作的签名与失败语义：
//! - `derive_key`：密码 + salt → 密钥
//! - `init_encrypt`：生成 salt / base_nonce，派生密钥并产出 Header
//! - `encrypt_chunk` / `decrypt_chunk`：单个 chunk 的 AEAD 加解密
//!
//! `AeadEngine` 是默认实现：Argon2id + AES-256-GCM 或 ChaCha20-Poly1305。

use rand::{RngCore, rngs::OsRng};
use zeroize::Zeroizing;

use crate::algorithm::{AeadAlgorithm, TAG_SIZE, aes_256_gcm, chacha20_poly1305};
use crate::crypto::kdf::{self, SecretKey};
use crate::error::Result;
use crate::format::header::{BASE_NONCE_SIZE, HEADER_SIZE, Header, SALT_SIZE};

/// 清零保护的 base nonce
pub type SecretNonce = Zeroizing<[u8; BASE_NONCE_SIZE]>;

/// 加密任务初始化结果
pub struct EncryptInit {
    pub key: SecretKey,
    pub base_nonce: SecretNonce,
    pub header: Header,
    pub header_bytes: [u8; HEADER_SIZE],
}

pub trait CipherEngine {
    /// 当前使用的 AEAD 算法
    fn algorithm(&self) -> AeadAlgorithm;

    /// 返回使用指定算法的同类引擎（解密时按 Header 选择）
    fn for_cipher(&self, algorithm: AeadAlgorithm) -> Self
    where
        Self: Sized;

    fn tag_size(&self) -> usize {
        TAG_SIZE
    }

    fn derive_key(&self, password: &[u8], salt: &[u8; SALT_SIZE]) -> Result<SecretKey>;

    fn init_encrypt(&self, password: &[u8], total_size: u64, chunk_exp: u8) -> Result<EncryptInit>;

    /// 必须以从 0 开始严格递增的 chunk_index 调用
    fn encrypt_chunk(
        &self,
        key: &SecretKey,
        base_nonce: &[u8; BASE_NONCE_SIZE],
        chunk_index: u32,
        plaintext: &[u8],
    ) -> Result<Vec<u8>>;

    /// 认证失败返回 `AllcryptError::Authentication`
    fn decrypt_chunk(
        &self,
        key: &SecretKey,
        base_nonce: &[u8; BASE_NONCE_SIZE],
        chunk_index: u32,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AeadEngine {
    algorithm: AeadAlgorithm,
}

impl AeadEngine {
    pub fn new(algorithm: AeadAlgorithm) -> Self {
        Self { algorithm }
    }
}

impl CipherEngine for AeadEngine {
    fn algorithm(&self) -> AeadAlgorithm {
        self.algorithm
    }

    fn for_cipher(&self, algorithm: AeadAlgorithm) -> Self {
        Self::new(algorithm)
    }

    fn derive_key(&self, password: &[u8], salt: &[u8; SALT_SIZE]) -> Result<SecretKey> {
        kdf::derive_key(password, salt)
    }

    fn init_encrypt(&self, password: &[u8], total_size: u64, chunk_exp: u8) -> Result<EncryptInit> {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);

        let mut base_nonce = Zeroizing::new([0u8; BASE_NONCE_SIZE]);
        OsRng.fill_bytes(&mut base_nonce[..]);

        let key = self.derive_key(password, &salt)?;

        let header = Header::new(self.algorithm, salt, *base_nonce, chunk_exp, total_size);
        let header_bytes = header.encode();

        Ok(EncryptInit {
            key,
            base_nonce,
            header,
            header_bytes,
        })
    }

    fn encrypt_chunk(
        &self,
        key: &SecretKey,
        base_nonce: &[u8; BASE_NONCE_SIZE],
        chunk_index: u32,
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        match self.algorithm {
            AeadAlgorithm::Aes256Gcm => {
                aes_256_gcm::encrypt_chunk(key, base_nonce, chunk_index, plaintext)
            }
            AeadAlgorithm::ChaCha20Poly1305 => {
                chacha20_poly1305::encrypt_chunk(key, base_nonce, chunk_index, plaintext)
            }
        }
    }

    fn decrypt_chunk(
        &self,
        key: &SecretKey,
        base_nonce: &[u8; BASE_NONCE_SIZE],
        chunk_index: u32,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        match self.algorithm {
            AeadAlgorithm::Aes256Gcm => {
                aes_256_gcm::decrypt_chunk(key, base_nonce, chunk_index, ciphertext)
            }
            AeadAlgorithm::ChaCha20Poly1305 => {
                chacha20_poly1305::decrypt_chunk(key, base_nonce, chunk_index, ciphertext)
            }
        }
    }
}
