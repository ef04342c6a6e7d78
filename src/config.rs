//! 运行配置
//!
//! 可从 TOML 文件加载，未出现的字段取默认值，未知字段直接报错：
//!
//! ```toml
//! chunk_exp = 20
//! persistent_threshold = 104857600
//! persistent_dir = "/var/tmp/allcrypt"
//! algorithm = "aes-256-gcm"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::algorithm::AeadAlgorithm;
use crate::format::header::{DEFAULT_CHUNK_EXP, validate_chunk_exp};
use crate::format::stream::DEFAULT_PERSISTENT_THRESHOLD;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// 加密时的 chunk 大小指数
    pub chunk_exp: u8,
    /// `SinkMode::Auto` 下输入超过该字节数时使用持久化输出
    pub persistent_threshold: u64,
    /// 持久化输出所在目录
    pub persistent_dir: PathBuf,
    /// 加密使用的 AEAD 算法（解密始终以 Header 为准）
    pub algorithm: AeadAlgorithm,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_exp: DEFAULT_CHUNK_EXP,
            persistent_threshold: DEFAULT_PERSISTENT_THRESHOLD,
            persistent_dir: std::env::temp_dir().join("allcrypt"),
            algorithm: AeadAlgorithm::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content).context("parsing config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Err(msg) = validate_chunk_exp(self.chunk_exp) {
            bail!("invalid config: {msg}");
        }
        if self.persistent_dir.as_os_str().is_empty() {
            bail!("invalid config: persistent_dir is empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml_str("").expect("parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.chunk_exp, 20);
        assert_eq!(config.persistent_threshold, 100 * 1024 * 1024);
    }

    #[test]
    fn recognized_options_are_applied() {
        let config = Config::from_toml_str(
            r#"
            chunk_exp = 16
            persistent_threshold = 1024
            persistent_dir = "/data/out"
            algorithm = "chacha20-poly1305"
            "#,
        )
        .expect("parse");

        assert_eq!(config.chunk_exp, 16);
        assert_eq!(config.persistent_threshold, 1024);
        assert_eq!(config.persistent_dir, PathBuf::from("/data/out"));
        assert_eq!(config.algorithm, AeadAlgorithm::ChaCha20Poly1305);
    }

    #[test]
    fn defaults_serialize_to_loadable_toml() {
        let text = toml::to_string(&Config::default()).expect("serialize");
        assert!(text.contains(r#"algorithm = "aes-256-gcm""#), "{text}");

        let back = Config::from_toml_str(&text).expect("parse");
        assert_eq!(back, Config::default());
    }

    #[test]
    fn unknown_keys_and_bad_values_are_rejected() {
        assert!(Config::from_toml_str("chunk_size = 4096").is_err());
        assert!(Config::from_toml_str("chunk_exp = 40").is_err());
        assert!(Config::from_toml_str(r#"algorithm = "rot13""#).is_err());
    }
}
