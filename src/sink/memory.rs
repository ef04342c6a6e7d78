//! 内存输出端
//!
//! 按顺序保存每个 chunk，完成时拼接为一段连续缓冲区，
//! 原有的各个 chunk 缓冲区随即清零释放。

use zeroize::Zeroizing;

use super::{OutputSink, SinkOutput};
use crate::error::Result;
use crate::hygiene::SecretBytes;

#[derive(Default)]
pub struct MemorySink {
    parts: Vec<SecretBytes>,
    len: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已累积的字节数
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl OutputSink for MemorySink {
    fn write(&mut self, chunk: Vec<u8>) -> Result<()> {
        self.len += chunk.len();
        self.parts.push(Zeroizing::new(chunk));
        Ok(())
    }

    fn finish(self) -> Result<SinkOutput> {
        let mut out = Zeroizing::new(Vec::with_capacity(self.len));
        for part in &self.parts {
            out.extend_from_slice(part);
        }

        // parts 在此处 drop 并清零
        Ok(SinkOutput::Memory(out))
    }

    fn abort(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_in_write_order() {
        let mut sink = MemorySink::new();
        sink.write(b"INI ".to_vec()).expect("write");
        sink.write(b"FILE".to_vec()).expect("write");
        sink.write(Vec::new()).expect("write");
        assert_eq!(sink.len(), 8);

        match sink.finish().expect("finish") {
            SinkOutput::Memory(bytes) => assert_eq!(&bytes[..], b"INI FILE"),
            SinkOutput::Persistent { .. } => panic!("expected memory output"),
        }
    }
}
