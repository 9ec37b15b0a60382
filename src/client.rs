//! Storage clients
//!
//! A [`StorageClient`] hands out one `ObjectStore` per bucket. [`GcsClient`]
//! talks to Google Cloud Storage; [`MemoryClient`] keeps everything in
//! process and is what the tests run against.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::memory::InMemory;
use object_store::{ClientOptions, ObjectStore};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{Result, VfsError};

const SERVICE_ACCOUNT_TYPE: &str = "service_account";

/// A single client-configuration entry.
///
/// Options are applied in order; a later entry overrides an earlier one for
/// the same setting.
#[derive(Clone, PartialEq, Eq)]
pub enum ClientOption {
    /// Service account key JSON, passed as-is to the client. Other credential
    /// types (`authorized_user`, `external_account`) fail construction.
    CredentialsJson(Vec<u8>),
    /// Path to a service account key file
    CredentialsFile(PathBuf),
    /// Path to an application default credentials file
    ApplicationCredentials(PathBuf),
    /// HTTP(S) proxy for all requests
    ProxyUrl(String),
    /// Per-request timeout
    Timeout(Duration),
    /// Connection establishment timeout
    ConnectTimeout(Duration),
}

// Credential material stays out of logs
impl std::fmt::Debug for ClientOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientOption::CredentialsJson(bytes) => {
                write!(f, "CredentialsJson(<{} bytes>)", bytes.len())
            }
            ClientOption::CredentialsFile(path) => f.debug_tuple("CredentialsFile").field(path).finish(),
            ClientOption::ApplicationCredentials(path) => {
                f.debug_tuple("ApplicationCredentials").field(path).finish()
            }
            ClientOption::ProxyUrl(url) => f.debug_tuple("ProxyUrl").field(url).finish(),
            ClientOption::Timeout(d) => f.debug_tuple("Timeout").field(d).finish(),
            ClientOption::ConnectTimeout(d) => f.debug_tuple("ConnectTimeout").field(d).finish(),
        }
    }
}

/// Source of bucket-scoped object stores
pub trait StorageClient: Send + Sync {
    /// Get the object store for a bucket
    fn bucket(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>>;
}

#[derive(Clone)]
enum ServiceAccount {
    Key(String),
    Path(PathBuf),
}

/// Settings folded from the ordered option list
#[derive(Clone, Default)]
struct ClientSettings {
    service_account: Option<ServiceAccount>,
    application_credentials: Option<PathBuf>,
    proxy_url: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl ClientSettings {
    async fn from_options(options: &[ClientOption]) -> Result<Self> {
        let mut settings = Self::default();

        for option in options {
            match option {
                ClientOption::CredentialsJson(bytes) => {
                    let key = std::str::from_utf8(bytes).map_err(|e| {
                        VfsError::ClientConstruction(format!("Credentials are not UTF-8: {}", e))
                    })?;
                    let document =
                        serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(key)
                            .map_err(|e| {
                                VfsError::ClientConstruction(format!(
                                    "Credentials are not a JSON object: {}",
                                    e
                                ))
                            })?;
                    check_key_type(&document)?;
                    settings.service_account = Some(ServiceAccount::Key(key.to_string()));
                }
                ClientOption::CredentialsFile(path) => {
                    check_readable(path).await?;
                    settings.service_account = Some(ServiceAccount::Path(path.clone()));
                }
                ClientOption::ApplicationCredentials(path) => {
                    check_readable(path).await?;
                    settings.application_credentials = Some(path.clone());
                }
                ClientOption::ProxyUrl(url) => {
                    settings.proxy_url = Some(url.clone());
                }
                ClientOption::Timeout(timeout) => {
                    settings.timeout = Some(non_zero("timeout", *timeout)?);
                }
                ClientOption::ConnectTimeout(timeout) => {
                    settings.connect_timeout = Some(non_zero("connect timeout", *timeout)?);
                }
            }
        }

        Ok(settings)
    }

    fn client_options(&self) -> ClientOptions {
        let mut options = ClientOptions::new();
        if let Some(url) = &self.proxy_url {
            options = options.with_proxy_url(url);
        }
        if let Some(timeout) = self.timeout {
            options = options.with_timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            options = options.with_connect_timeout(timeout);
        }
        options
    }
}

async fn check_readable(path: &PathBuf) -> Result<()> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        VfsError::ClientConstruction(format!("Cannot read credentials file {:?}: {}", path, e))
    })?;
    if !metadata.is_file() {
        return Err(VfsError::ClientConstruction(format!(
            "Credentials path {:?} is not a file",
            path
        )));
    }
    Ok(())
}

/// Only service account keys can be handed to the client as inline JSON.
///
/// A document without a `type` field is treated as a service account key.
/// `authorized_user` documents work when passed by path as
/// [`ClientOption::ApplicationCredentials`].
fn check_key_type(document: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
    match document.get("type") {
        None => Ok(()),
        Some(serde_json::Value::String(kind)) if kind == SERVICE_ACCOUNT_TYPE => Ok(()),
        Some(serde_json::Value::String(kind)) => Err(VfsError::ClientConstruction(format!(
            "Unsupported inline credentials type '{}'; only '{}' keys can be passed as JSON, \
             use an application credentials file for other types",
            kind, SERVICE_ACCOUNT_TYPE
        ))),
        Some(other) => Err(VfsError::ClientConstruction(format!(
            "Credentials 'type' must be a string, got {}",
            other
        ))),
    }
}

fn non_zero(what: &str, d: Duration) -> Result<Duration> {
    if d.is_zero() {
        return Err(VfsError::ClientConstruction(format!("{} must be non-zero", what)));
    }
    Ok(d)
}

/// Google Cloud Storage client.
///
/// Without explicit credentials the underlying client performs its own
/// discovery (`GOOGLE_APPLICATION_CREDENTIALS`, gcloud defaults, instance
/// metadata).
pub struct GcsClient {
    settings: ClientSettings,
    stores: DashMap<String, Arc<dyn ObjectStore>>,
}

impl GcsClient {
    /// Validate the options and construct a client.
    ///
    /// Bucket stores are built on first use.
    pub async fn connect(options: Vec<ClientOption>) -> Result<Self> {
        let settings = ClientSettings::from_options(&options).await?;

        info!(
            "Constructed GCS client ({} options, explicit credentials: {})",
            options.len(),
            settings.service_account.is_some() || settings.application_credentials.is_some()
        );

        Ok(Self {
            settings,
            stores: DashMap::new(),
        })
    }

    fn build_store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket);

        match &self.settings.service_account {
            Some(ServiceAccount::Key(key)) => {
                builder = builder.with_service_account_key(key.clone());
            }
            Some(ServiceAccount::Path(path)) => {
                builder = builder.with_service_account_path(path.to_string_lossy());
            }
            None => {}
        }

        if let Some(path) = &self.settings.application_credentials {
            builder = builder.with_application_credentials(path.to_string_lossy());
        }

        let store = builder
            .with_client_options(self.settings.client_options())
            .build()
            .map_err(|e| {
                VfsError::ClientConstruction(format!(
                    "Failed to build client for bucket '{}': {}",
                    bucket, e
                ))
            })?;

        Ok(Arc::new(store))
    }
}

impl StorageClient for GcsClient {
    fn bucket(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        if let Some(store) = self.stores.get(bucket) {
            return Ok(store.value().clone());
        }

        debug!("Building object store for bucket '{}'", bucket);
        let store = self.build_store(bucket)?;
        Ok(self
            .stores
            .entry(bucket.to_string())
            .or_insert(store)
            .value()
            .clone())
    }
}

/// In-process client: every bucket is an empty `InMemory` store on first use
#[derive(Default)]
pub struct MemoryClient {
    buckets: Mutex<HashMap<String, Arc<InMemory>>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageClient for MemoryClient {
    fn bucket(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let store: Arc<dyn ObjectStore> = self
            .buckets
            .lock()
            .entry(bucket.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone();
        Ok(store)
    }
}
