//! Object storage backend filesystem
//!
//! Maps the hierarchical [`Fs`] contract onto flat object keys. The first
//! path segment names the bucket; the remaining segments are joined with the
//! folder separator to form the object key.
//!
//! Object storage has no directories. A directory exists when it is a bucket
//! root, when a zero-length marker object `<dir><sep>.keep` exists, or when
//! any key starts with `<dir><sep>`. Markers never show up in listings.

use std::collections::{BTreeMap, VecDeque};
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use tracing::{debug, trace, warn};

use crate::client::StorageClient;
use crate::error::{Result, VfsError};
use crate::fs::{File, FileInfo, Fs, OpenFlags};

/// Default folder separator
pub const DEFAULT_SEPARATOR: &str = "/";

/// Name of the zero-length object that marks an explicit directory
pub const DIR_MARKER: &str = ".keep";

const FS_NAME: &str = "GcsFs";

/// Largest object GCS accepts (5 TiB); writes and truncates past it fail
pub const MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024 * 1024;

/// Checks that a buffer may grow to `end` bytes and returns it as an index
fn buffer_len(path: &str, end: Option<u64>) -> Result<usize> {
    end.filter(|end| *end <= MAX_OBJECT_SIZE)
        .and_then(|end| usize::try_from(end).ok())
        .ok_or_else(|| {
            VfsError::InvalidArgument(format!(
                "{}: size exceeds the {} byte object limit",
                path, MAX_OBJECT_SIZE
            ))
        })
}

/// Key layout: how hierarchical paths become flat object keys
#[derive(Debug, Clone)]
struct Layout {
    separator: String,
}

/// A parsed path. An empty bucket is the client root, an empty key a bucket root.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Location {
    bucket: String,
    key: String,
}

impl Location {
    fn is_client_root(&self) -> bool {
        self.bucket.is_empty()
    }

    fn is_bucket_root(&self) -> bool {
        !self.bucket.is_empty() && self.key.is_empty()
    }
}

/// What a key currently refers to
enum Entry {
    File(ObjectMeta),
    Directory,
    Missing,
}

impl Layout {
    fn locate(&self, path: &str) -> Result<Location> {
        let mut segments = Vec::new();
        for segment in path
            .trim_start_matches('/')
            .split(self.separator.as_str())
        {
            match segment {
                "" => continue,
                "." | ".." => {
                    return Err(VfsError::InvalidPath(format!(
                        "{}: relative segments are not allowed",
                        path
                    )))
                }
                s => segments.push(s),
            }
        }

        match segments.split_first() {
            None => Ok(Location {
                bucket: String::new(),
                key: String::new(),
            }),
            Some((bucket, rest)) => Ok(Location {
                bucket: bucket.to_string(),
                key: rest.join(self.separator.as_str()),
            }),
        }
    }

    fn object_path(&self, key: &str) -> Result<ObjectPath> {
        ObjectPath::parse(key)
            .map_err(|e| VfsError::InvalidPath(format!("{}: {}", key, e)))
    }

    /// Prefix shared by every key below `key` ("" for a bucket root)
    fn dir_prefix(&self, key: &str) -> String {
        if key.is_empty() {
            String::new()
        } else {
            format!("{}{}", key, self.separator)
        }
    }

    fn marker_key(&self, key: &str) -> String {
        format!("{}{}", self.dir_prefix(key), DIR_MARKER)
    }

    fn parent_key<'a>(&self, key: &'a str) -> &'a str {
        key.rsplit_once(self.separator.as_str())
            .map(|(parent, _)| parent)
            .unwrap_or("")
    }

    fn base_name<'a>(&self, key: &'a str) -> &'a str {
        key.rsplit_once(self.separator.as_str())
            .map(|(_, name)| name)
            .unwrap_or(key)
    }

    /// Narrowest listing scope the store can evaluate itself.
    ///
    /// Stores only understand `/`; with any other separator the whole bucket
    /// is scanned and filtered by string prefix.
    fn list_scope(&self, key: &str) -> Result<Option<ObjectPath>> {
        if self.separator == DEFAULT_SEPARATOR && !key.is_empty() {
            Ok(Some(self.object_path(key)?))
        } else {
            Ok(None)
        }
    }

    async fn head(&self, store: &dyn ObjectStore, key: &str) -> Result<Option<ObjectMeta>> {
        let location = self.object_path(key)?;
        match store.head(&location).await {
            Ok(meta) => Ok(Some(meta)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(VfsError::Store(e)),
        }
    }

    /// Every object below the directory `key`, markers included
    async fn list_under(&self, store: &dyn ObjectStore, key: &str) -> Result<Vec<ObjectMeta>> {
        let prefix = self.dir_prefix(key);
        let scope = self.list_scope(key)?;

        let mut stream = store.list(scope.as_ref());
        let mut objects = Vec::new();
        while let Some(meta) = stream.try_next().await? {
            if meta.location.as_ref().starts_with(&prefix) {
                objects.push(meta);
            }
        }
        Ok(objects)
    }

    async fn has_objects_under(&self, store: &dyn ObjectStore, key: &str) -> Result<bool> {
        let prefix = self.dir_prefix(key);
        let scope = self.list_scope(key)?;

        let mut stream = store.list(scope.as_ref());
        while let Some(meta) = stream.try_next().await? {
            if meta.location.as_ref().starts_with(&prefix) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn lookup(&self, store: &dyn ObjectStore, key: &str) -> Result<Entry> {
        if key.is_empty() {
            return Ok(Entry::Directory);
        }
        if let Some(meta) = self.head(store, key).await? {
            return Ok(Entry::File(meta));
        }
        if self.head(store, &self.marker_key(key)).await?.is_some()
            || self.has_objects_under(store, key).await?
        {
            return Ok(Entry::Directory);
        }
        Ok(Entry::Missing)
    }

    /// Immediate children of a directory, sorted by name
    async fn children(&self, store: &dyn ObjectStore, key: &str) -> Result<Vec<FileInfo>> {
        let now = SystemTime::now();
        let mut files = BTreeMap::new();
        let mut dirs = BTreeMap::new();

        if self.separator == DEFAULT_SEPARATOR {
            let scope = self.list_scope(key)?;
            let listing = store.list_with_delimiter(scope.as_ref()).await?;

            for prefix in listing.common_prefixes {
                if let Some(name) = prefix.filename() {
                    dirs.insert(name.to_string(), FileInfo::directory(name, now));
                }
            }
            for meta in listing.objects {
                if let Some(name) = meta.location.filename() {
                    if name != DIR_MARKER {
                        files.insert(name.to_string(), object_info(name, &meta));
                    }
                }
            }
        } else {
            let prefix = self.dir_prefix(key);
            for meta in self.list_under(store, key).await? {
                let rest = &meta.location.as_ref()[prefix.len()..];
                match rest.split_once(self.separator.as_str()) {
                    Some((child, _)) if !child.is_empty() => {
                        dirs.entry(child.to_string())
                            .or_insert_with(|| FileInfo::directory(child, now));
                    }
                    Some(_) => {}
                    None => {
                        if !rest.is_empty() && rest != DIR_MARKER {
                            files.insert(rest.to_string(), object_info(rest, &meta));
                        }
                    }
                }
            }
        }

        // A key can be both an object and a prefix; report both
        let mut entries: Vec<FileInfo> = dirs.into_values().chain(files.into_values()).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

fn object_info(name: &str, meta: &ObjectMeta) -> FileInfo {
    FileInfo::file(name, meta.size as u64, SystemTime::from(meta.last_modified))
}

/// Filesystem over a [`StorageClient`]
pub struct ObjectFs {
    client: Arc<dyn StorageClient>,
    layout: Layout,
}

impl ObjectFs {
    /// Create a filesystem using the default `/` separator
    pub fn new(client: Arc<dyn StorageClient>) -> Self {
        Self::with_separator(client, DEFAULT_SEPARATOR)
    }

    /// Create a filesystem using a custom folder separator.
    ///
    /// An empty separator falls back to the default.
    pub fn with_separator(client: Arc<dyn StorageClient>, separator: impl Into<String>) -> Self {
        let mut separator = separator.into();
        if separator.is_empty() {
            warn!("Empty folder separator, using {:?}", DEFAULT_SEPARATOR);
            separator = DEFAULT_SEPARATOR.to_string();
        }
        Self {
            client,
            layout: Layout { separator },
        }
    }

    pub fn separator(&self) -> &str {
        &self.layout.separator
    }

    fn store(&self, location: &Location) -> Result<Arc<dyn ObjectStore>> {
        self.client.bucket(&location.bucket)
    }

    async fn put_empty(&self, store: &dyn ObjectStore, key: &str) -> Result<()> {
        let location = self.layout.object_path(key)?;
        store.put(&location, PutPayload::from(Vec::new())).await?;
        Ok(())
    }

    fn dir_name(&self, location: &Location) -> String {
        if location.key.is_empty() {
            location.bucket.clone()
        } else {
            self.layout.base_name(&location.key).to_string()
        }
    }

    fn directory_handle(
        &self,
        path: &str,
        location: &Location,
        store: Option<Arc<dyn ObjectStore>>,
    ) -> Box<dyn File> {
        Box::new(ObjectFile {
            path: path.to_string(),
            name: self.dir_name(location),
            pos: 0,
            closed: false,
            body: Body::Directory {
                store,
                key: location.key.clone(),
                layout: self.layout.clone(),
                pending: None,
            },
        })
    }

    fn reader_handle(
        &self,
        path: &str,
        location: &Location,
        store: Arc<dyn ObjectStore>,
        meta: &ObjectMeta,
    ) -> Box<dyn File> {
        Box::new(ObjectFile {
            path: path.to_string(),
            name: self.layout.base_name(&location.key).to_string(),
            pos: 0,
            closed: false,
            body: Body::Reader {
                store,
                location: meta.location.clone(),
                size: meta.size as u64,
                mtime: SystemTime::from(meta.last_modified),
            },
        })
    }

    fn writer_handle(
        &self,
        path: &str,
        location: &Location,
        store: Arc<dyn ObjectStore>,
        data: Vec<u8>,
        flags: OpenFlags,
        dirty: bool,
    ) -> Result<Box<dyn File>> {
        let pos = if flags.append { data.len() as u64 } else { 0 };
        Ok(Box::new(ObjectFile {
            path: path.to_string(),
            name: self.layout.base_name(&location.key).to_string(),
            pos,
            closed: false,
            body: Body::Writer {
                location: self.layout.object_path(&location.key)?,
                store,
                data,
                dirty,
                readable: flags.read,
                writable: flags.is_writable(),
                append: flags.append,
                mtime: SystemTime::now(),
            },
        }))
    }

    async fn require_exists(&self, path: &str) -> Result<()> {
        self.stat(path).await.map(|_| ())
    }
}

#[async_trait]
impl Fs for ObjectFs {
    fn name(&self) -> &str {
        FS_NAME
    }

    async fn create(&self, path: &str) -> Result<Box<dyn File>> {
        self.open_file(
            path,
            OpenFlags::read_write().create(true).truncate(true),
            crate::fs::DEFAULT_FILE_MODE,
        )
        .await
    }

    async fn mkdir(&self, path: &str, _perm: u32) -> Result<()> {
        let location = self.layout.locate(path)?;
        debug!("mkdir: path={} key={}", path, location.key);

        if location.is_client_root() || location.is_bucket_root() {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }

        let store = self.store(&location)?;
        match self.layout.lookup(&*store, &location.key).await? {
            Entry::File(_) | Entry::Directory => {
                return Err(VfsError::AlreadyExists(path.to_string()))
            }
            Entry::Missing => {}
        }

        let parent = self.layout.parent_key(&location.key);
        match self.layout.lookup(&*store, parent).await? {
            Entry::Directory => {}
            Entry::File(_) => return Err(VfsError::NotADirectory(parent.to_string())),
            Entry::Missing => return Err(VfsError::NotFound(parent.to_string())),
        }

        self.put_empty(&*store, &self.layout.marker_key(&location.key))
            .await
    }

    async fn mkdir_all(&self, path: &str, _perm: u32) -> Result<()> {
        let location = self.layout.locate(path)?;
        debug!("mkdir_all: path={} key={}", path, location.key);

        if location.is_client_root() || location.is_bucket_root() {
            return Ok(());
        }

        let store = self.store(&location)?;
        let separator = self.layout.separator.as_str();
        let segments: Vec<&str> = location.key.split(separator).collect();

        for depth in 1..=segments.len() {
            let key = segments[..depth].join(separator);
            match self.layout.lookup(&*store, &key).await? {
                Entry::Directory => {}
                Entry::File(_) => return Err(VfsError::NotADirectory(key)),
                Entry::Missing => {
                    trace!("mkdir_all: creating marker for {}", key);
                    self.put_empty(&*store, &self.layout.marker_key(&key))
                        .await?;
                }
            }
        }

        Ok(())
    }

    async fn open(&self, path: &str) -> Result<Box<dyn File>> {
        self.open_file(path, OpenFlags::read_only(), 0).await
    }

    async fn open_file(&self, path: &str, flags: OpenFlags, _perm: u32) -> Result<Box<dyn File>> {
        flags.validate()?;
        let location = self.layout.locate(path)?;
        trace!("open_file: path={} key={} flags={:?}", path, location.key, flags);

        if location.is_client_root() {
            if flags.is_writable() {
                return Err(VfsError::IsADirectory(path.to_string()));
            }
            return Ok(self.directory_handle(path, &location, None));
        }

        let store = self.store(&location)?;
        match self.layout.lookup(&*store, &location.key).await? {
            Entry::Directory => {
                if flags.is_writable() {
                    return Err(VfsError::IsADirectory(path.to_string()));
                }
                Ok(self.directory_handle(path, &location, Some(store)))
            }
            Entry::Missing => {
                if !flags.create {
                    return Err(VfsError::NotFound(path.to_string()));
                }
                debug!("open_file: creating {}", location.key);
                self.put_empty(&*store, &location.key).await?;
                self.writer_handle(path, &location, store, Vec::new(), flags, false)
            }
            Entry::File(meta) => {
                if flags.create && flags.exclusive {
                    return Err(VfsError::AlreadyExists(path.to_string()));
                }
                if !flags.is_writable() {
                    return Ok(self.reader_handle(path, &location, store, &meta));
                }
                if flags.truncate {
                    return self.writer_handle(path, &location, store, Vec::new(), flags, true);
                }
                // Objects are immutable; edits rewrite the whole object
                let data = store.get(&meta.location).await?.bytes().await?.to_vec();
                self.writer_handle(path, &location, store, data, flags, false)
            }
        }
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let location = self.layout.locate(path)?;
        debug!("remove: path={} key={}", path, location.key);

        if location.is_client_root() || location.is_bucket_root() {
            return Err(VfsError::NotSupported(format!("removing bucket {}", path)));
        }

        let store = self.store(&location)?;
        match self.layout.lookup(&*store, &location.key).await? {
            Entry::File(meta) => {
                store.delete(&meta.location).await?;
                Ok(())
            }
            Entry::Directory => {
                let marker = self.layout.marker_key(&location.key);
                let objects = self.layout.list_under(&*store, &location.key).await?;
                if objects.iter().any(|meta| meta.location.as_ref() != marker) {
                    return Err(VfsError::NotEmpty(path.to_string()));
                }
                for meta in objects {
                    store.delete(&meta.location).await?;
                }
                Ok(())
            }
            Entry::Missing => Err(VfsError::NotFound(path.to_string())),
        }
    }

    async fn remove_all(&self, path: &str) -> Result<()> {
        let location = self.layout.locate(path)?;
        debug!("remove_all: path={} key={}", path, location.key);

        if location.is_client_root() || location.is_bucket_root() {
            return Err(VfsError::NotSupported(format!("removing bucket {}", path)));
        }

        let store = self.store(&location)?;
        let mut removed = 0usize;

        if let Some(meta) = self.layout.head(&*store, &location.key).await? {
            store.delete(&meta.location).await?;
            removed += 1;
        }
        for meta in self.layout.list_under(&*store, &location.key).await? {
            store.delete(&meta.location).await?;
            removed += 1;
        }

        debug!("remove_all: deleted {} objects under {}", removed, path);
        Ok(())
    }

    /// Copy then delete, object by object. Not atomic: a failure part way
    /// leaves objects under both names.
    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let source = self.layout.locate(from)?;
        let target = self.layout.locate(to)?;
        debug!("rename: {} -> {}", from, to);

        if source.is_client_root()
            || source.is_bucket_root()
            || target.is_client_root()
            || target.is_bucket_root()
        {
            return Err(VfsError::InvalidArgument(format!(
                "cannot rename bucket roots: {} -> {}",
                from, to
            )));
        }
        if source.bucket != target.bucket {
            return Err(VfsError::InvalidArgument(format!(
                "cannot rename across buckets: {} -> {}",
                from, to
            )));
        }
        if source == target {
            return self.require_exists(from).await;
        }

        let store = self.store(&source)?;
        let target_entry = self.layout.lookup(&*store, &target.key).await?;

        match self.layout.lookup(&*store, &source.key).await? {
            Entry::Missing => Err(VfsError::NotFound(from.to_string())),
            Entry::File(meta) => {
                if matches!(target_entry, Entry::Directory) {
                    return Err(VfsError::IsADirectory(to.to_string()));
                }
                let destination = self.layout.object_path(&target.key)?;
                store.rename(&meta.location, &destination).await?;
                Ok(())
            }
            Entry::Directory => {
                let source_prefix = self.layout.dir_prefix(&source.key);
                if target.key.starts_with(&source_prefix) {
                    return Err(VfsError::InvalidArgument(format!(
                        "cannot move {} into itself ({})",
                        from, to
                    )));
                }
                match target_entry {
                    Entry::File(_) => return Err(VfsError::NotADirectory(to.to_string())),
                    Entry::Directory => {
                        let marker = self.layout.marker_key(&target.key);
                        let existing = self.layout.list_under(&*store, &target.key).await?;
                        if existing.iter().any(|meta| meta.location.as_ref() != marker) {
                            return Err(VfsError::NotEmpty(to.to_string()));
                        }
                    }
                    Entry::Missing => {}
                }

                let target_prefix = self.layout.dir_prefix(&target.key);
                let objects = self.layout.list_under(&*store, &source.key).await?;
                debug!("rename: moving {} objects", objects.len());
                for meta in objects {
                    let rest = &meta.location.as_ref()[source_prefix.len()..];
                    let destination = self
                        .layout
                        .object_path(&format!("{}{}", target_prefix, rest))?;
                    store.rename(&meta.location, &destination).await?;
                }
                Ok(())
            }
        }
    }

    async fn stat(&self, path: &str) -> Result<FileInfo> {
        let location = self.layout.locate(path)?;
        trace!("stat: path={} key={}", path, location.key);

        if location.is_client_root() {
            return Ok(FileInfo::directory("", SystemTime::now()));
        }

        let store = self.store(&location)?;
        match self.layout.lookup(&*store, &location.key).await? {
            Entry::File(meta) => Ok(object_info(self.layout.base_name(&location.key), &meta)),
            Entry::Directory => Ok(FileInfo::directory(
                self.dir_name(&location),
                SystemTime::now(),
            )),
            Entry::Missing => Err(VfsError::NotFound(path.to_string())),
        }
    }

    async fn chmod(&self, path: &str, _mode: u32) -> Result<()> {
        self.require_exists(path).await?;
        Err(VfsError::NotSupported(format!("chmod on {}", path)))
    }

    async fn chtimes(&self, path: &str, _atime: SystemTime, _mtime: SystemTime) -> Result<()> {
        self.require_exists(path).await?;
        Err(VfsError::NotSupported(format!("chtimes on {}", path)))
    }

    async fn chown(&self, path: &str, _uid: u32, _gid: u32) -> Result<()> {
        self.require_exists(path).await?;
        Err(VfsError::NotSupported(format!("chown on {}", path)))
    }
}

enum Body {
    /// Read-only view of an object; reads are ranged requests
    Reader {
        store: Arc<dyn ObjectStore>,
        location: ObjectPath,
        size: u64,
        mtime: SystemTime,
    },
    /// Whole object held in memory, uploaded on sync/close
    Writer {
        store: Arc<dyn ObjectStore>,
        location: ObjectPath,
        data: Vec<u8>,
        dirty: bool,
        readable: bool,
        writable: bool,
        append: bool,
        mtime: SystemTime,
    },
    /// Directory listing, fetched on first read_dir. `store` is None at the
    /// client root, where buckets cannot be listed.
    Directory {
        store: Option<Arc<dyn ObjectStore>>,
        key: String,
        layout: Layout,
        pending: Option<VecDeque<FileInfo>>,
    },
}

/// Handle returned by [`ObjectFs`]
pub struct ObjectFile {
    path: String,
    name: String,
    pos: u64,
    closed: bool,
    body: Body,
}

impl ObjectFile {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(VfsError::Closed(self.path.clone()));
        }
        Ok(())
    }

    async fn read_range(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        match &self.body {
            Body::Reader {
                store,
                location,
                size,
                ..
            } => {
                if offset >= *size || buf.is_empty() {
                    return Ok(0);
                }
                let end = (*size).min(offset + buf.len() as u64);
                let bytes = store.get_range(location, offset..end).await?;
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Body::Writer { data, readable, .. } => {
                if !*readable {
                    return Err(VfsError::InvalidArgument(format!(
                        "{} not opened for reading",
                        self.path
                    )));
                }
                let len = data.len() as u64;
                if offset >= len {
                    return Ok(0);
                }
                let start = offset as usize;
                let n = buf.len().min(data.len() - start);
                buf[..n].copy_from_slice(&data[start..start + n]);
                Ok(n)
            }
            Body::Directory { .. } => Err(VfsError::IsADirectory(self.path.clone())),
        }
    }

    fn write_range(&mut self, bytes: &[u8], offset: u64) -> Result<usize> {
        match &mut self.body {
            Body::Writer {
                data,
                dirty,
                writable: true,
                mtime,
                ..
            } => {
                let end = buffer_len(&self.path, offset.checked_add(bytes.len() as u64))?;
                let start = end - bytes.len();
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[start..end].copy_from_slice(bytes);
                *dirty = true;
                *mtime = SystemTime::now();
                Ok(bytes.len())
            }
            Body::Writer { .. } | Body::Reader { .. } => Err(self.not_writable()),
            Body::Directory { .. } => Err(VfsError::IsADirectory(self.path.clone())),
        }
    }

    fn not_writable(&self) -> VfsError {
        VfsError::InvalidArgument(format!("{} not opened for writing", self.path))
    }

    fn len(&self) -> u64 {
        match &self.body {
            Body::Reader { size, .. } => *size,
            Body::Writer { data, .. } => data.len() as u64,
            Body::Directory { .. } => 0,
        }
    }
}

#[async_trait]
impl File for ObjectFile {
    fn name(&self) -> &str {
        &self.path
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        let n = self.read_range(buf, self.pos).await?;
        self.pos += n as u64;
        Ok(n)
    }

    async fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.ensure_open()?;
        self.read_range(buf, offset).await
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        if let Body::Writer { append: true, .. } = self.body {
            self.pos = self.len();
        }
        let n = self.write_range(data, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }

    async fn write_at(&mut self, data: &[u8], offset: u64) -> Result<usize> {
        self.ensure_open()?;
        if let Body::Writer { append: true, .. } = self.body {
            return Err(VfsError::InvalidArgument(format!(
                "{}: write_at on a file opened for append",
                self.path
            )));
        }
        self.write_range(data, offset)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.ensure_open()?;

        if let Body::Directory { pending, .. } = &mut self.body {
            // Rewinding restarts the listing
            return match pos {
                SeekFrom::Start(0) => {
                    *pending = None;
                    Ok(0)
                }
                _ => Err(VfsError::IsADirectory(self.path.clone())),
            };
        }

        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self.len().checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            VfsError::InvalidArgument(format!("{}: seek before start of file", self.path))
        })?;
        self.pos = target;
        Ok(target)
    }

    async fn truncate(&mut self, size: u64) -> Result<()> {
        self.ensure_open()?;
        match &mut self.body {
            Body::Writer {
                data,
                dirty,
                writable: true,
                mtime,
                ..
            } => {
                data.resize(buffer_len(&self.path, Some(size))?, 0);
                *dirty = true;
                *mtime = SystemTime::now();
                Ok(())
            }
            Body::Writer { .. } | Body::Reader { .. } => Err(self.not_writable()),
            Body::Directory { .. } => Err(VfsError::IsADirectory(self.path.clone())),
        }
    }

    async fn stat(&self) -> Result<FileInfo> {
        self.ensure_open()?;
        Ok(match &self.body {
            Body::Reader { size, mtime, .. } => FileInfo::file(&self.name, *size, *mtime),
            Body::Writer { data, mtime, .. } => {
                FileInfo::file(&self.name, data.len() as u64, *mtime)
            }
            Body::Directory { .. } => FileInfo::directory(&self.name, SystemTime::now()),
        })
    }

    async fn read_dir(&mut self, count: Option<usize>) -> Result<Vec<FileInfo>> {
        self.ensure_open()?;
        let Body::Directory {
            store,
            key,
            layout,
            pending,
        } = &mut self.body
        else {
            return Err(VfsError::NotADirectory(self.path.clone()));
        };

        if pending.is_none() {
            let store = store.as_ref().ok_or_else(|| {
                VfsError::NotSupported(format!("listing buckets at {}", self.path))
            })?;
            *pending = Some(layout.children(&**store, key).await?.into());
        }

        let entries = pending.get_or_insert_with(VecDeque::new);
        let take = count.unwrap_or(entries.len()).min(entries.len());
        Ok(entries.drain(..take).collect())
    }

    async fn sync(&mut self) -> Result<()> {
        self.ensure_open()?;
        if let Body::Writer {
            store,
            location,
            data,
            dirty,
            ..
        } = &mut self.body
        {
            if *dirty {
                debug!("sync: uploading {} bytes to {}", data.len(), location);
                store
                    .put(location, PutPayload::from(data.clone()))
                    .await?;
                *dirty = false;
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.sync().await?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for ObjectFile {
    fn drop(&mut self) {
        if let Body::Writer { dirty: true, .. } = self.body {
            if !self.closed {
                warn!("{} dropped with unsynced writes; data discarded", self.path);
            }
        }
    }
}
