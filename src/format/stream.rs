//! allcrypt v1 Stream 布局
//!
//! Header 之后紧跟按顺序排列的 chunk：
//!
//! ```text
//! [44 字节 Header][chunk_0 密文+tag][chunk_1 密文+tag]...[chunk_n 密文+tag]
//! ```
//!
//! - 明文 chunk 长度为 2^chunk_exp，只有最后一个可以更短
//! - chunk 之间没有长度前缀，边界完全由 chunk_exp 与 tag 长度推出
//! - 空输入只有 Header，没有任何 chunk

use std::io::{self, ErrorKind, Read};

/// 默认切换到持久化输出的阈值：100 MiB
pub const DEFAULT_PERSISTENT_THRESHOLD: u64 = 100 * 1024 * 1024;

/// 由 chunk_exp 与 tag 长度决定的 chunk 几何
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    chunk_exp: u8,
    tag_size: usize,
}

impl ChunkLayout {
    pub fn new(chunk_exp: u8, tag_size: usize) -> Self {
        Self {
            chunk_exp,
            tag_size,
        }
    }

    pub fn chunk_exp(&self) -> u8 {
        self.chunk_exp
    }

    /// 明文 chunk 长度
    pub fn chunk_size(&self) -> usize {
        1usize << self.chunk_exp
    }

    /// 完整密文 chunk 长度（明文 + tag）
    pub fn encrypted_chunk_len(&self) -> usize {
        self.chunk_size() + self.tag_size
    }

    /// 给定明文总长时的 chunk 数量
    pub fn chunk_count(&self, total: u64) -> u64 {
        total.div_ceil(self.chunk_size() as u64)
    }

    /// 第 `index` 个明文 chunk 的长度（越界返回 0）
    pub fn plaintext_len(&self, index: u64, total: u64) -> usize {
        let chunk = self.chunk_size() as u64;
        let start = index.saturating_mul(chunk);
        if start >= total {
            return 0;
        }
        (total - start).min(chunk) as usize
    }

    /// 给定明文总长时整个容器的长度（不含 Header）
    pub fn encrypted_body_len(&self, total: u64) -> u64 {
        total + self.chunk_count(total) * self.tag_size as u64
    }
}

/// 尽可能填满 `buf`，只在 EOF 时返回较短的长度
///
/// 普通的 `read` 允许短读，这里需要按 chunk 边界精确切分。
pub fn read_window<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 每次最多返回 3 字节的 reader，用来模拟短读
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(3).min(self.0.len());
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    #[test]
    fn thirteen_bytes_in_four_byte_chunks() {
        let layout = ChunkLayout::new(2, 16);
        let lens: Vec<usize> = (0..layout.chunk_count(13))
            .map(|i| layout.plaintext_len(i, 13))
            .collect();

        assert_eq!(lens, vec![4, 4, 4, 1]);
        assert_eq!(layout.encrypted_chunk_len(), 20);
        assert_eq!(layout.encrypted_body_len(13), 13 + 4 * 16);
    }

    #[test]
    fn empty_input_has_no_chunks() {
        let layout = ChunkLayout::new(20, 16);
        assert_eq!(layout.chunk_count(0), 0);
        assert_eq!(layout.encrypted_body_len(0), 0);
    }

    #[test]
    fn read_window_fills_across_short_reads() {
        let data = b"0123456789";
        let mut reader = Trickle(data);
        let mut buf = [0u8; 8];

        assert_eq!(read_window(&mut reader, &mut buf).expect("read"), 8);
        assert_eq!(&buf, b"01234567");
        assert_eq!(read_window(&mut reader, &mut buf).expect("read"), 2);
        assert_eq!(read_window(&mut reader, &mut buf).expect("read"), 0);
    }
}
