use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoltierError {
    #[error("Could not mount secondary storage {remote_dir} on host: {message}")]
    MountError { remote_dir: String, message: String },

    #[error("Failed to create folder {folder} in secondary storage")]
    FolderCreateError { folder: String },

    #[error("No storage pool found with name: {pool_name}")]
    PoolNotFound { pool_name: String },

    #[error("There are {count} storage pools with same name: {pool_name}")]
    AmbiguousPool { pool_name: String, count: usize },

    #[error("Expected exactly one disk image under {path}, found {count}")]
    AmbiguousSource { path: String, count: usize },

    #[error("Remote task failed: {0}")]
    RemoteTaskError(String),

    #[error("Remote task did not finish within {timeout_ms}ms")]
    TaskTimeout { timeout_ms: u64 },

    #[error("Upload of {object_id} failed: {message}")]
    UploadError { object_id: String, message: String },

    #[error("unsupported protocol")]
    UnsupportedProtocol,

    #[error("Invariant violation: {0}")]
    InternalInvariantViolation(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VoltierError>;
