//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gcs_vfs::client::MemoryClient;
use gcs_vfs::fs::Fs;
use gcs_vfs::{GcsFs, Result};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Adapter over a fresh in-memory client
pub fn memory_fs() -> GcsFs {
    GcsFs::from_client(Arc::new(MemoryClient::new()))
}

/// Adapter over a fresh in-memory client with a custom folder separator
pub fn memory_fs_with_separator(separator: &str) -> GcsFs {
    GcsFs::from_client_with_separator(Arc::new(MemoryClient::new()), separator)
}

/// Unique file name with a readable prefix
pub fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, COUNTER.fetch_add(1, Ordering::Relaxed))
}

pub async fn write_str<F: Fs + ?Sized>(fs: &F, path: &str, content: &str) -> Result<()> {
    let mut file = fs.create(path).await?;
    file.write_all(content.as_bytes()).await?;
    file.close().await
}

pub async fn read_string<F: Fs + ?Sized>(fs: &F, path: &str) -> Result<String> {
    let mut file = fs.open(path).await?;
    let data = file.read_to_end().await?;
    file.close().await?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

pub async fn list_names<F: Fs + ?Sized>(fs: &F, path: &str) -> Result<Vec<String>> {
    let mut dir = fs.open(path).await?;
    let names = dir.read_dir_names(None).await?;
    dir.close().await?;
    Ok(names)
}

pub async fn assert_not_exists<F: Fs + ?Sized>(fs: &F, path: &str) {
    assert!(
        !fs.exists(path).await.unwrap(),
        "{} should not exist",
        path
    );
}
