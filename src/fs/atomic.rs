//! allcrypt 原子写入工具。
//!
//! 持久化输出先写入同目录下的隐藏临时文件 `.<name>.partial`，
//! 完成后再用 rename 替换目标文件，避免中断的任务留下半截结果。

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

const PARTIAL_SUFFIX: &str = ".partial";

/// 生成唯一的输出名：`<prefix>-<pid>-<nanos>-<counter>.<ext>`
pub fn unique_name(prefix: &str, ext: &str) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let counter = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);

    format!(
        "{prefix}-{}-{timestamp}-{counter}.{ext}",
        std::process::id()
    )
}

/// 校验输出名只包含单个普通路径组件，防止写出到目录之外
pub fn validate_name(name: &str) -> io::Result<()> {
    let invalid = || {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid output name: {name:?}"),
        )
    };

    if name.is_empty() || name.starts_with('.') {
        return Err(invalid());
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(()),
        _ => Err(invalid()),
    }
}

/// 临时文件路径：`<root>/.<name>.partial`
pub fn partial_path(root: &Path, name: &str) -> PathBuf {
    root.join(format!(".{name}{PARTIAL_SUFFIX}"))
}

pub fn is_partial_file(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.ends_with(PARTIAL_SUFFIX)
}

/// 落盘并用 rename 把临时文件提升为目标文件
pub fn promote(file: File, partial: &Path, target: &Path) -> io::Result<()> {
    file.sync_all()?;
    drop(file);

    if target.exists() {
        fs::remove_file(target)?;
    }

    fs::rename(partial, target)
}
