use crate::{Result, VoltierError};
use serde::{Deserialize, Serialize};

/// Disk image format used for staged and archived images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Vhd,
    Qcow2,
    Raw,
}

/// Destination or source tier for a data-movement request. Read-only
/// configuration, supplied per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataStore {
    PrimaryPool {
        pool_name: String,
    },
    SecondaryFile {
        url: String,
    },
    Swift {
        endpoint: String,
        account: String,
        user_name: String,
        key: String,
        container: String,
    },
    S3 {
        endpoint: String,
        access_key: String,
        secret_key: String,
        bucket: String,
    },
}

impl DataStore {
    pub fn is_file_based(&self) -> bool {
        matches!(self, DataStore::SecondaryFile { .. })
    }

    pub fn is_object_store(&self) -> bool {
        matches!(self, DataStore::Swift { .. } | DataStore::S3 { .. })
    }

    /// Decomposes a secondary-file URL like `nfs://host/export/dir` into the
    /// `host:/export/dir` form the remote mount call expects.
    pub fn secondary_mount_source(&self) -> Result<String> {
        let DataStore::SecondaryFile { url } = self else {
            return Err(VoltierError::UnsupportedProtocol);
        };
        let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
        let (host, path) = rest.split_once('/').ok_or_else(|| {
            VoltierError::ConfigError(format!("invalid secondary storage url: {url}"))
        })?;
        if host.is_empty() || path.is_empty() {
            return Err(VoltierError::ConfigError(format!(
                "invalid secondary storage url: {url}"
            )));
        }
        Ok(format!("{host}:/{path}"))
    }
}

/// Back-reference from a snapshot to its owning volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRef {
    pub id: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeObject {
    pub id: String,
    pub path: String,
    pub size: Option<u64>,
    pub store: DataStore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateObject {
    pub id: String,
    pub name: Option<String>,
    pub path: String,
    pub format: ImageFormat,
    pub size: Option<u64>,
    pub physical_size: Option<u64>,
    pub store: DataStore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotObject {
    pub id: String,
    pub path: String,
    /// Identifier of the backup this snapshot is incremental against, or
    /// None for a full backup.
    pub parent_snapshot_path: Option<String>,
    pub volume: Option<VolumeRef>,
    pub store: DataStore,
}

/// One of the three movable disk data objects. Constructed fresh as the
/// return value of every orchestrator operation and never mutated after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DataObject {
    Volume(VolumeObject),
    Template(TemplateObject),
    Snapshot(SnapshotObject),
}

impl DataObject {
    pub fn store(&self) -> &DataStore {
        match self {
            DataObject::Volume(v) => &v.store,
            DataObject::Template(t) => &t.store,
            DataObject::Snapshot(s) => &s.store,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            DataObject::Volume(v) => &v.path,
            DataObject::Template(t) => &t.path,
            DataObject::Snapshot(s) => &s.path,
        }
    }
}

/// A copy request names a source and a destination data object, each
/// carrying its own store descriptor, plus an optional staging cache
/// descriptor and the caller's task timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyRequest {
    pub source: DataObject,
    pub destination: DataObject,
    pub cache: Option<DataObject>,
    pub wait_secs: u64,
}

/// Outcome of one orchestrator operation: either the newly created data
/// object or a human-readable failure message. Business failures never
/// surface as panics or raw errors past the operation boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CopyAnswer {
    Success(DataObject),
    Failure(String),
}

impl CopyAnswer {
    pub fn is_success(&self) -> bool {
        matches!(self, CopyAnswer::Success(_))
    }

    pub fn result(&self) -> Option<&DataObject> {
        match self {
            CopyAnswer::Success(obj) => Some(obj),
            CopyAnswer::Failure(_) => None,
        }
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            CopyAnswer::Success(_) => None,
            CopyAnswer::Failure(msg) => Some(msg),
        }
    }
}

/// Splits an install path like `snapshots/12/34/<uuid>.vhd` into its
/// directory component and the bare object identifier with any file
/// extension stripped.
pub fn split_object_path(path: &str) -> Result<(String, String)> {
    let (dir, file) = path.rsplit_once('/').ok_or_else(|| {
        VoltierError::InternalInvariantViolation(format!(
            "object path has no directory component: {path}"
        ))
    })?;
    let id = file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file);
    if dir.is_empty() || id.is_empty() {
        return Err(VoltierError::InternalInvariantViolation(format!(
            "malformed object path: {path}"
        )));
    }
    Ok((dir.to_string(), id.to_string()))
}

/// Directory component of an install path, without the trailing file name.
pub fn parent_directory(path: &str) -> Result<String> {
    Ok(split_object_path(path)?.0)
}
