//! chunk nonce 派生
//!
//! nonce = base_nonce，并用 chunk_index（u32，小端）覆盖第 8..12 字节。
//!
//! 同一密钥下 nonce 绝不能重复。`NonceSequence` 只能单调前进，
//! 既不能回退也不能复制，因此一个任务内每个 chunk_index 只会被发出一次。

use crate::error::{AllcryptError, Result};
use crate::format::header::BASE_NONCE_SIZE;

/// 计算指定 chunk 的 nonce
pub fn chunk_nonce(base_nonce: &[u8; BASE_NONCE_SIZE], chunk_index: u32) -> [u8; BASE_NONCE_SIZE] {
    let mut nonce = *base_nonce;
    nonce[8..12].copy_from_slice(&chunk_index.to_le_bytes());
    nonce
}

/// 单调递增的 chunk 序号发生器，从 0 开始
#[derive(Debug, Default)]
pub struct NonceSequence {
    next: u64,
}

impl NonceSequence {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// 取出下一个 chunk_index
    ///
    /// 序号空间（2^32）耗尽时返回错误，而不是回绕。
    pub fn advance(&mut self) -> Result<u32> {
        let index = u32::try_from(self.next)
            .map_err(|_| AllcryptError::Engine("chunk index space exhausted".into()))?;
        self.next += 1;
        Ok(index)
    }

    /// 已发出的序号数量
    pub fn issued(&self) -> u64 {
        self.next
    }
}
