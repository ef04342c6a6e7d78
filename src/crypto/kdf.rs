//! allcrypt 密钥派生函数（KDF）模块
//!
//! 通过 Argon2id 将用户密码派生为 256-bit 对称密钥。
//!
//! - 每个容器使用独立的随机 salt（保存在 Header 中）
//! - 参数固定为 Argon2 默认值，由 Header 的 kdf id 约定；
//!   如需调整必须同时分配新的 kdf id
//! - 派生出的密钥在离开作用域后自动清零
//!
//! 派生过程刻意昂贵，每个任务只调用一次。

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use crate::error::{AllcryptError, Result};
use crate::format::header::SALT_SIZE;

/// 派生密钥长度（256-bit）
pub const KEY_LEN: usize = 32;

/// 清零保护的对称密钥
pub type SecretKey = Zeroizing<[u8; KEY_LEN]>;

/// 根据密码和 salt 派生对称加密密钥
///
/// 相同的密码与 salt 总是得到相同的密钥。
pub fn derive_key(password: &[u8], salt: &[u8; SALT_SIZE]) -> Result<SecretKey> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());

    let mut key = Zeroizing::new([0u8; KEY_LEN]);

    argon2
        .hash_password_into(password, salt, &mut key[..])
        .map_err(|e| AllcryptError::Engine(format!("key derivation failed: {e}")))?;

    Ok(key)
}
