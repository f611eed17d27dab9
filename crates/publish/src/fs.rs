//! Narrow file-access seam.
//!
//! The publish flow only ever stats and opens files. Routing both through
//! [`FileAccess`] lets tests run against [`MemFileAccess`] instead of disk.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::io::{AsyncRead, AsyncSeek};

/// An open, seekable source file.
pub trait SourceFile: AsyncRead + AsyncSeek + Send + Sync + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Sync + Unpin> SourceFile for T {}

/// File metadata the publish flow cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub len: u64,
}

/// Stat and open files by path.
pub trait FileAccess: Send + Sync {
    /// Returns metadata for a regular file.
    fn stat(&self, path: &Path) -> io::Result<FileMeta>;

    /// Opens a regular file for reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn SourceFile>>;

    /// Returns `true` if `path` is a regular file.
    fn exists(&self, path: &Path) -> bool {
        self.stat(path).is_ok()
    }
}

/// [`FileAccess`] backed by the real file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileAccess;

impl FileAccess for OsFileAccess {
    fn stat(&self, path: &Path) -> io::Result<FileMeta> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }
        Ok(FileMeta {
            len: metadata.len(),
        })
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn SourceFile>> {
        let file = std::fs::File::open(path)?;
        Ok(Box::new(tokio::fs::File::from_std(file)))
    }
}

/// In-memory [`FileAccess`], mostly for tests.
#[derive(Debug, Default)]
pub struct MemFileAccess {
    files: RwLock<HashMap<PathBuf, Arc<Vec<u8>>>>,
}

impl MemFileAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a file.
    pub fn insert(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        files.insert(path.into(), Arc::new(data.into()));
    }

    /// Removes a file, returning whether it existed.
    pub fn remove(&self, path: &Path) -> bool {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        files.remove(path).is_some()
    }

    fn get(&self, path: &Path) -> io::Result<Arc<Vec<u8>>> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }
}

impl FileAccess for MemFileAccess {
    fn stat(&self, path: &Path) -> io::Result<FileMeta> {
        let data = self.get(path)?;
        Ok(FileMeta {
            len: data.len() as u64,
        })
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn SourceFile>> {
        let data = self.get(path)?;
        Ok(Box::new(io::Cursor::new(data.as_ref().clone())))
    }
}
