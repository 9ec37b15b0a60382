//! Generic virtual-filesystem contract
//!
//! Every backend (object storage, in-memory, a forwarding adapter) implements
//! [`Fs`] and hands out [`File`] handles, so callers can swap backends
//! without touching the code that uses them.
//!
//! Paths are plain strings rather than `std::path::Path`: backends are free to
//! pick their own folder separator, which an OS path cannot express.

use std::io::SeekFrom;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::{Result, VfsError};

/// File type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
}

/// Default file mode (rw-r--r--)
pub const DEFAULT_FILE_MODE: u32 = 0o644;
/// Default directory mode (rwxr-xr-x)
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Metadata for a file or directory
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    /// Base name (last path segment)
    pub name: String,
    pub file_type: FileType,
    pub size: u64,
    pub mtime: SystemTime,
    /// POSIX permission bits (e.g., 0o644). None means use default.
    pub mode: Option<u32>,
}

impl FileInfo {
    pub fn file(name: impl Into<String>, size: u64, mtime: SystemTime) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::File,
            size,
            mtime,
            mode: None,
        }
    }

    pub fn directory(name: impl Into<String>, mtime: SystemTime) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::Directory,
            size: 0,
            mtime,
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Get the mode, using defaults if not set
    pub fn mode_or_default(&self) -> u32 {
        self.mode.unwrap_or(if self.is_dir() {
            DEFAULT_DIR_MODE
        } else {
            DEFAULT_FILE_MODE
        })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.file_type, FileType::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.file_type, FileType::Directory)
    }
}

/// Flags for [`Fs::open_file`], modelled on `open(2)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    /// Writes go to the end of the file
    pub append: bool,
    /// Create the file if it does not exist
    pub create: bool,
    /// Truncate an existing file to zero length
    pub truncate: bool,
    /// Together with `create`, fail if the file already exists
    pub exclusive: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    pub fn write_only() -> Self {
        Self {
            write: true,
            ..Self::default()
        }
    }

    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            ..Self::default()
        }
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Whether the handle will modify content
    pub fn is_writable(&self) -> bool {
        self.write || self.append
    }

    /// Reject combinations `open(2)` would reject
    pub fn validate(&self) -> Result<()> {
        if !self.read && !self.is_writable() {
            return Err(VfsError::InvalidArgument(
                "open flags grant neither read nor write access".to_string(),
            ));
        }
        if self.exclusive && !self.create {
            return Err(VfsError::InvalidArgument(
                "exclusive requires create".to_string(),
            ));
        }
        if self.truncate && !self.is_writable() {
            return Err(VfsError::InvalidArgument(
                "truncate requires write access".to_string(),
            ));
        }
        Ok(())
    }
}

/// An open file or directory handle.
///
/// Handles belong to the caller, who must `close` them on every exit path.
#[async_trait]
pub trait File: Send + Sync {
    /// Path the handle was opened with
    fn name(&self) -> &str;

    /// Read from the current position, advancing it. Returns 0 at end of file.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Read at an absolute offset without moving the position
    async fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Write at the current position, advancing it
    async fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Write at an absolute offset without moving the position
    async fn write_at(&mut self, data: &[u8], offset: u64) -> Result<usize>;

    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    async fn truncate(&mut self, size: u64) -> Result<()>;

    async fn stat(&self) -> Result<FileInfo>;

    /// List directory entries.
    ///
    /// `Some(n)` returns at most `n` entries and continues where the previous
    /// call stopped; an empty vector means the listing is exhausted.
    /// `None` returns every remaining entry.
    async fn read_dir(&mut self, count: Option<usize>) -> Result<Vec<FileInfo>>;

    /// Same as `read_dir`, names only
    async fn read_dir_names(&mut self, count: Option<usize>) -> Result<Vec<String>> {
        Ok(self
            .read_dir(count)
            .await?
            .into_iter()
            .map(|info| info.name)
            .collect())
    }

    /// Persist buffered writes
    async fn sync(&mut self) -> Result<()>;

    /// Persist buffered writes and release the handle
    async fn close(&mut self) -> Result<()>;

    /// Read from the current position to the end of the file
    async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        Ok(out)
    }

    /// Write the whole buffer at the current position
    async fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let n = self.write(data).await?;
            if n == 0 {
                return Err(VfsError::Io(std::io::ErrorKind::WriteZero.into()));
            }
            data = &data[n..];
        }
        Ok(())
    }
}

/// Core filesystem trait
///
/// The operation set matches a conventional virtual filesystem, so an object
/// storage backend, an in-memory backend and a forwarding adapter are
/// interchangeable.
#[async_trait]
pub trait Fs: Send + Sync {
    /// Backend identifier
    fn name(&self) -> &str;

    /// Create (or truncate) a file and open it for writing
    async fn create(&self, path: &str) -> Result<Box<dyn File>>;

    /// Create a directory. The parent must exist.
    async fn mkdir(&self, path: &str, perm: u32) -> Result<()>;

    /// Create a directory and every missing ancestor
    async fn mkdir_all(&self, path: &str, perm: u32) -> Result<()>;

    /// Open a file or directory for reading
    async fn open(&self, path: &str) -> Result<Box<dyn File>>;

    /// Open with explicit flags and permission bits
    async fn open_file(&self, path: &str, flags: OpenFlags, perm: u32) -> Result<Box<dyn File>>;

    /// Remove a file or an empty directory
    async fn remove(&self, path: &str) -> Result<()>;

    /// Remove a path and everything below it. A missing path is not an error.
    async fn remove_all(&self, path: &str) -> Result<()>;

    /// Rename/move a file or directory
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Get metadata for a path
    async fn stat(&self, path: &str) -> Result<FileInfo>;

    /// Change permission bits
    async fn chmod(&self, path: &str, mode: u32) -> Result<()>;

    /// Change access and modification times
    async fn chtimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> Result<()>;

    /// Change owner and group
    async fn chown(&self, path: &str, uid: u32, gid: u32) -> Result<()>;

    /// Check if a path exists
    ///
    /// Default implementation uses stat()
    async fn exists(&self, path: &str) -> Result<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(VfsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
