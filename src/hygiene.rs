//! 敏感缓冲区清理
//!
//! 明文、密文、派生密钥、nonce 在交给下一阶段后都要清零再释放。
//!
//! 这只是降低风险的尽力而为措施，不是密码学保证：
//! - `Vec` 扩容时旧的分配不会被清零
//! - 操作系统可能已经把页面换出到磁盘
//! - 跨线程传递的消息可能在传输过程中留下副本
//! - `Header` 等按值复制的结构（数组是 `Copy`）可能在栈上留下未清零的临时副本
//!
//! 以上属于已知的残余风险。

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, Zeroizing};

/// 离开作用域时自动清零的字节缓冲区
pub type SecretBytes = Zeroizing<Vec<u8>>;

/// 清零并清空缓冲区（保留容量）
pub fn scrub(buf: &mut Vec<u8>) {
    buf.zeroize();
}

/// 用户密码
///
/// - Drop 时清零
/// - Debug 输出不包含内容
/// - 只存在于单个任务的生命周期内，不会被持久化
pub struct Password(Zeroizing<String>);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Serialize for Password {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}
