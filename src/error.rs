use std::io;
use thiserror::Error;

/// Main error type for gcs-vfs operations
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Path already exists: {0}")]
    AlreadyExists(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Directory not empty: {0}")]
    NotEmpty(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File already closed: {0}")]
    Closed(String),

    /// Establishing the storage client failed. Never retried.
    #[error("Failed to construct storage client: {0}")]
    ClientConstruction(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Opaque pass-through of the object store's own error
    #[error("Object store error: {0}")]
    Store(#[from] object_store::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl VfsError {
    /// Map the error onto the closest `std::io::ErrorKind`
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            VfsError::NotFound(_) => io::ErrorKind::NotFound,
            VfsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            VfsError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            VfsError::IsADirectory(_) => io::ErrorKind::IsADirectory,
            VfsError::NotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            VfsError::InvalidPath(_) => io::ErrorKind::InvalidInput,
            VfsError::NotSupported(_) => io::ErrorKind::Unsupported,
            VfsError::PermissionDenied(_) => io::ErrorKind::PermissionDenied,
            VfsError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            VfsError::Closed(_) => io::ErrorKind::BrokenPipe,
            VfsError::ClientConstruction(_) => io::ErrorKind::ConnectionRefused,
            VfsError::Io(e) => e.kind(),
            VfsError::Store(e) => match e {
                object_store::Error::NotFound { .. } => io::ErrorKind::NotFound,
                object_store::Error::AlreadyExists { .. } => io::ErrorKind::AlreadyExists,
                object_store::Error::PermissionDenied { .. }
                | object_store::Error::Unauthenticated { .. } => io::ErrorKind::PermissionDenied,
                object_store::Error::NotImplemented => io::ErrorKind::Unsupported,
                _ => io::ErrorKind::Other,
            },
            VfsError::Config(_) => io::ErrorKind::InvalidInput,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == io::ErrorKind::NotFound
    }
}

impl From<VfsError> for io::Error {
    fn from(err: VfsError) -> Self {
        match err {
            VfsError::Io(e) => e,
            other => io::Error::new(other.kind(), other),
        }
    }
}

/// Result type alias for gcs-vfs operations
pub type Result<T> = std::result::Result<T, VfsError>;
