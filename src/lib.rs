//! gcs-vfs: Google Cloud Storage behind a generic virtual-filesystem interface
//!
//! # Architecture
//!
//! - **Filesystem contract** ([`fs`]): the `Fs` and `File` traits any backend
//!   implements, so callers can swap local, in-memory and object storage
//!   backends without changing code.
//! - **Credentials** ([`credentials`]): turns an optional JSON payload from the
//!   environment into a client option, falling back to ambient discovery.
//! - **Clients** ([`client`]): `GcsClient` builds one object store per bucket;
//!   `MemoryClient` keeps buckets in process.
//! - **Backend** ([`backend`]): `ObjectFs` emulates directories over flat
//!   object keys with a configurable folder separator.
//! - **Adapter** ([`gcs`]): `GcsFs` owns one backend and forwards every
//!   operation to it unchanged.
//!
//! # Example
//!
//! ```no_run
//! use gcs_vfs::fs::Fs;
//! use gcs_vfs::GcsFs;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fs = GcsFs::new(Vec::new()).await?;
//! fs.mkdir_all("/my-bucket/reports/2024", 0o755).await?;
//!
//! let mut file = fs.create("/my-bucket/reports/2024/summary.txt").await?;
//! file.write_all(b"all good").await?;
//! file.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod credentials;
pub mod env;
pub mod error;
pub mod fs;
pub mod gcs;
pub mod walk;

pub use error::{Result, VfsError};
pub use gcs::GcsFs;
