pub mod staging;
pub mod task;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use voltier_core::Result;

pub use staging::{EphemeralRepository, EphemeralRepositoryManager};
pub use task::AsyncTaskWaiter;

/// Remote record of one disk image, as reported by the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskRecord {
    pub uuid: String,
    pub label: String,
    pub virtual_size: u64,
    pub physical_utilisation: u64,
}

/// Status of one in-flight remote copy task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    /// Carries the identifier of the newly created disk image.
    Success { result: String },
    Failure { message: String },
}

/// The remote hypervisor management session. All calls are idempotent
/// queries or commands against shared remote state; consistency of
/// concurrent access to the same pool or volume is delegated to the
/// remote system.
#[async_trait]
pub trait HypervisorConnection: Send + Sync {
    /// Mounts a remote directory onto a host-local path. Returns the
    /// plugin's result string; an absent or empty result means the mount
    /// did not happen.
    async fn mount_remote_dir(
        &self,
        remote_dir: &str,
        local_dir: &str,
        timeout_ms: u64,
    ) -> Result<Option<String>>;

    /// Registers a file-based repository rooted at `local_path` and
    /// returns its handle.
    async fn create_file_repository(&self, local_path: &str) -> Result<String>;

    async fn destroy_repository(&self, repository: &str) -> Result<()>;

    async fn scan_repository(&self, repository: &str) -> Result<()>;

    /// Whether a repository is block-based (iSCSI-backed) rather than
    /// file-based. Affects VHD parent lookups and object-store uploads.
    async fn is_block_based(&self, repository: &str) -> Result<bool>;

    /// All pool repositories whose name matches exactly.
    async fn find_pools_by_name(&self, pool_name: &str) -> Result<Vec<String>>;

    /// Identifiers of the disk images visible inside a repository.
    async fn disks_in_repository(&self, repository: &str) -> Result<Vec<String>>;

    async fn disk_record(&self, disk: &str) -> Result<DiskRecord>;

    /// Starts an asynchronous copy of `disk` into `dest_repository`,
    /// optionally relative to `base_disk` for incremental copies. Returns
    /// the task handle.
    async fn copy_disk_async(
        &self,
        disk: &str,
        dest_repository: &str,
        base_disk: Option<&str>,
    ) -> Result<String>;

    /// Takes a hypervisor-level snapshot of a disk image and returns the
    /// snapshot's identifier.
    async fn snapshot_disk(&self, disk: &str) -> Result<String>;

    async fn set_disk_label(&self, disk: &str, label: &str) -> Result<()>;

    async fn destroy_disk(&self, disk: &str) -> Result<()>;

    /// VHD-level parent of a disk image within a pool, or None for a
    /// self-contained image.
    async fn vhd_parent(
        &self,
        pool: &str,
        disk: &str,
        is_block_based: bool,
    ) -> Result<Option<String>>;

    async fn task_status(&self, task: &str) -> Result<TaskStatus>;

    async fn destroy_task(&self, task: &str) -> Result<()>;

    /// Deletes every on-pool snapshot of a volume except `keep`.
    async fn destroy_volume_snapshots_except(&self, volume_path: &str, keep: &str) -> Result<()>;

    /// Removes a staged snapshot backup from the secondary-file staging
    /// area once it has been persisted elsewhere.
    async fn delete_staged_backup(
        &self,
        mount_source: &str,
        folder: &str,
        backup_id: &str,
    ) -> Result<()>;
}

/// Folder management on the secondary-file store. Creation is idempotent:
/// an already existing folder is not a failure.
#[async_trait]
pub trait FolderManager: Send + Sync {
    /// Returns false when the folder could not be created.
    async fn create_folder(&self, mount_source: &str, folder: &str) -> Result<bool>;

    async fn delete_folder(&self, mount_source: &str, folder: &str) -> Result<()>;
}

/// Uploads one staged or on-pool disk image into an object-store container
/// or bucket. Returns the destination key, or None when the backend
/// reported no destination.
#[async_trait]
pub trait ObjectStoreUploader: Send + Sync {
    async fn upload(
        &self,
        repository: &str,
        source_object: &str,
        container_or_bucket: &str,
        use_block_mode: bool,
        timeout_secs: u64,
    ) -> Result<Option<String>>;
}

/// Metadata persisted next to a freshly created template's staged files.
#[derive(Debug, Clone)]
pub struct TemplateMetadata {
    pub filename: String,
    pub uuid: String,
    pub name: Option<String>,
    pub virtual_size: u64,
    pub physical_size: u64,
    pub template_id: String,
}

/// Writes the template properties file on secondary storage. Returns false
/// when the file could not be written.
#[async_trait]
pub trait TemplateMetadataWriter: Send + Sync {
    async fn write(&self, template_path: &str, metadata: &TemplateMetadata) -> Result<bool>;
}
