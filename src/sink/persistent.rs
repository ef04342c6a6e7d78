//! 持久化输出端
//!
//! 输出大小可能超过安全的内存上限时使用。存储后端只需要支持：
//! `create(name)` / `append(handle, bytes)` / `finalize(handle)` / `remove(name)`。
//!
//! `FsStore` 是基于目录的实现：写入 `.<name>.partial`，完成时原子地 rename 为 `<name>`。
//! 被中断的任务可能留下 partial 文件，其内容不确定，应当清理掉。

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{OutputSink, SinkOutput};
use crate::error::{AllcryptError, Result};
use crate::fs::atomic::{is_partial_file, partial_path, promote, validate_name};
use crate::hygiene::scrub;

/// 完成后的持久化资源
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRecord {
    pub name: String,
    pub size: u64,
}

/// 追加写入的外部存储
pub trait PersistentStore {
    type Handle;

    fn create(&self, name: &str) -> io::Result<Self::Handle>;

    /// 同步追加，返回前数据已交给存储
    fn append(&self, handle: &mut Self::Handle, bytes: &[u8]) -> io::Result<()>;

    fn finalize(&self, handle: Self::Handle) -> io::Result<SinkRecord>;

    fn remove(&self, name: &str) -> io::Result<()>;
}

/// 基于目录的存储
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

pub struct FsHandle {
    name: String,
    partial: PathBuf,
    file: File,
    size: u64,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 资源完成后的路径
    pub fn path_of(&self, name: &str) -> io::Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// 删除中断任务遗留的 partial 文件，返回删除数量
    pub fn purge_partials(&self) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let is_partial = entry.file_name().to_str().is_some_and(is_partial_file);
            if is_partial && entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(root = %self.root.display(), removed, "purged partial outputs");
        }
        Ok(removed)
    }
}

impl PersistentStore for FsStore {
    type Handle = FsHandle;

    fn create(&self, name: &str) -> io::Result<FsHandle> {
        validate_name(name)?;
        fs::create_dir_all(&self.root)?;

        let partial = partial_path(&self.root, name);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&partial)?;

        debug!(name, root = %self.root.display(), "created persistent output");

        Ok(FsHandle {
            name: name.to_owned(),
            partial,
            file,
            size: 0,
        })
    }

    fn append(&self, handle: &mut FsHandle, bytes: &[u8]) -> io::Result<()> {
        handle.file.write_all(bytes)?;
        handle.size += bytes.len() as u64;
        Ok(())
    }

    fn finalize(&self, handle: FsHandle) -> io::Result<SinkRecord> {
        let FsHandle {
            name,
            partial,
            file,
            size,
        } = handle;

        let target = self.root.join(&name);
        promote(file, &partial, &target)?;

        debug!(name = %name, size, "finalized persistent output");
        Ok(SinkRecord { name, size })
    }

    fn remove(&self, name: &str) -> io::Result<()> {
        validate_name(name)?;

        let mut found = false;
        for path in [self.root.join(name), partial_path(&self.root, name)] {
            match fs::remove_file(&path) {
                Ok(()) => found = true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        if !found {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no persistent output named {name:?}"),
            ));
        }

        info!(name, "removed persistent output");
        Ok(())
    }
}

/// 把 chunk 依次追加到持久化存储的输出端
pub struct PersistentSink<S: PersistentStore> {
    store: S,
    name: String,
    handle: S::Handle,
}

impl<S: PersistentStore> PersistentSink<S> {
    pub fn create(store: S, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let handle = store.create(&name).map_err(AllcryptError::sink)?;
        Ok(Self {
            store,
            name,
            handle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<S: PersistentStore> OutputSink for PersistentSink<S> {
    fn write(&mut self, mut chunk: Vec<u8>) -> Result<()> {
        let written = self.store.append(&mut self.handle, &chunk);
        scrub(&mut chunk);
        written.map_err(AllcryptError::sink)
    }

    fn finish(self) -> Result<SinkOutput> {
        let record = self
            .store
            .finalize(self.handle)
            .map_err(AllcryptError::sink)?;

        Ok(SinkOutput::Persistent {
            sink_id: record.name,
            size: record.size,
        })
    }

    fn abort(self) {
        let Self {
            store,
            name,
            handle,
        } = self;
        drop(handle);

        if let Err(e) = store.remove(&name) {
            warn!(name = %name, error = %e, "failed to remove aborted output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn append_finalize_and_remove() {
        let dir = tempdir().expect("create temp dir");
        let store = FsStore::new(dir.path());

        let mut sink = PersistentSink::create(store.clone(), "out.bin").expect("create");
        assert!(dir.path().join(".out.bin.partial").exists());

        sink.write(b"abc".to_vec()).expect("write");
        sink.write(b"defg".to_vec()).expect("write");

        match sink.finish().expect("finish") {
            SinkOutput::Persistent { sink_id, size } => {
                assert_eq!(sink_id, "out.bin");
                assert_eq!(size, 7);
            }
            SinkOutput::Memory(_) => panic!("expected persistent output"),
        }

        let path = dir.path().join("out.bin");
        assert_eq!(fs::read(&path).expect("read"), b"abcdefg");
        assert!(!dir.path().join(".out.bin.partial").exists());

        store.remove("out.bin").expect("remove");
        assert!(!path.exists());
        assert_eq!(
            store.remove("out.bin").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn abort_leaves_nothing_behind() {
        let dir = tempdir().expect("create temp dir");
        let store = FsStore::new(dir.path());

        let mut sink = PersistentSink::create(store, "aborted.bin").expect("create");
        sink.write(b"partial data".to_vec()).expect("write");
        sink.abort();

        assert_eq!(fs::read_dir(dir.path()).expect("list").count(), 0);
    }

    #[test]
    fn rejects_names_outside_root() {
        let dir = tempdir().expect("create temp dir");
        let store = FsStore::new(dir.path());

        assert!(PersistentSink::create(store.clone(), "../escape").is_err());
        assert!(store.remove("../escape").is_err());
    }

    #[test]
    fn purge_removes_only_partials() {
        let dir = tempdir().expect("create temp dir");
        fs::write(dir.path().join(".stale.bin.partial"), b"x").expect("write");
        fs::write(dir.path().join("kept.bin"), b"y").expect("write");

        let store = FsStore::new(dir.path());
        assert_eq!(store.purge_partials().expect("purge"), 1);
        assert!(dir.path().join("kept.bin").exists());
    }
}
