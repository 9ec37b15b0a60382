//! Google Cloud Storage filesystem adapter
//!
//! [`GcsFs`] exposes a backend filesystem through the generic [`Fs`]
//! interface. It adds nothing of its own: every operation is passed directly
//! to the owned backend and its result (or error) is returned unchanged.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::info;

use crate::backend::ObjectFs;
use crate::client::{ClientOption, GcsClient, StorageClient};
use crate::credentials::with_env_credentials;
use crate::error::Result;
use crate::fs::{File, FileInfo, Fs, OpenFlags};

/// Filesystem backed by Google Cloud Storage
pub struct GcsFs<B: Fs = ObjectFs> {
    source: B,
}

impl GcsFs<ObjectFs> {
    /// Connect to GCS with the default folder separator.
    ///
    /// Credentials from `GOOGLE_APPLICATION_CREDENTIALS_JSON` are appended
    /// after `options`.
    pub async fn new(options: Vec<ClientOption>) -> Result<Self> {
        let client = GcsClient::connect(with_env_credentials(options)).await?;
        info!("GCS filesystem ready");
        Ok(Self::from_client(Arc::new(client)))
    }

    /// Connect to GCS with a custom folder separator.
    ///
    /// Like [`GcsFs::new`], this appends credentials from
    /// `GOOGLE_APPLICATION_CREDENTIALS_JSON` after `options`, so changing the
    /// separator never changes how the client authenticates. Callers that
    /// must not consult the environment should build a [`GcsClient`] and use
    /// [`GcsFs::from_client_with_separator`].
    pub async fn new_with_separator(separator: &str, options: Vec<ClientOption>) -> Result<Self> {
        let client = GcsClient::connect(with_env_credentials(options)).await?;
        info!("GCS filesystem ready (separator {:?})", separator);
        Ok(Self::from_client_with_separator(Arc::new(client), separator))
    }

    /// Wrap an existing client. Never reads the environment.
    pub fn from_client(client: Arc<dyn StorageClient>) -> Self {
        Self::from_backend(ObjectFs::new(client))
    }

    /// Wrap an existing client with a custom folder separator
    pub fn from_client_with_separator(client: Arc<dyn StorageClient>, separator: &str) -> Self {
        Self::from_backend(ObjectFs::with_separator(client, separator))
    }
}

impl<B: Fs> GcsFs<B> {
    pub fn from_backend(source: B) -> Self {
        Self { source }
    }

    pub fn inner(&self) -> &B {
        &self.source
    }

    pub fn into_inner(self) -> B {
        self.source
    }
}

#[async_trait]
impl<B: Fs> Fs for GcsFs<B> {
    fn name(&self) -> &str {
        self.source.name()
    }

    async fn create(&self, path: &str) -> Result<Box<dyn File>> {
        self.source.create(path).await
    }

    async fn mkdir(&self, path: &str, perm: u32) -> Result<()> {
        self.source.mkdir(path, perm).await
    }

    async fn mkdir_all(&self, path: &str, perm: u32) -> Result<()> {
        self.source.mkdir_all(path, perm).await
    }

    async fn open(&self, path: &str) -> Result<Box<dyn File>> {
        self.source.open(path).await
    }

    async fn open_file(&self, path: &str, flags: OpenFlags, perm: u32) -> Result<Box<dyn File>> {
        self.source.open_file(path, flags, perm).await
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.source.remove(path).await
    }

    async fn remove_all(&self, path: &str) -> Result<()> {
        self.source.remove_all(path).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.source.rename(from, to).await
    }

    async fn stat(&self, path: &str) -> Result<FileInfo> {
        self.source.stat(path).await
    }

    async fn chmod(&self, path: &str, mode: u32) -> Result<()> {
        self.source.chmod(path, mode).await
    }

    async fn chtimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> Result<()> {
        self.source.chtimes(path, atime, mtime).await
    }

    async fn chown(&self, path: &str, uid: u32, gid: u32) -> Result<()> {
        self.source.chown(path, uid, gid).await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.source.exists(path).await
    }
}
