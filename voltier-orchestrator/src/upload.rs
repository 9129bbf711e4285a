use std::sync::Arc;
use tracing::debug;
use voltier_core::{DataStore, Result, VoltierError};
use voltier_hypervisor::{EphemeralRepository, HypervisorConnection, ObjectStoreUploader};

/// Swift containers are named after the volume a snapshot belongs to.
fn swift_container(volume_id: &str) -> String {
    format!("S-{volume_id}")
}

/// Persists a staged backup (or an on-pool parent image) to its final
/// backend, polymorphic over the destination store.
pub struct BackendUploader {
    conn: Arc<dyn HypervisorConnection>,
    swift: Arc<dyn ObjectStoreUploader>,
    s3: Arc<dyn ObjectStoreUploader>,
}

impl BackendUploader {
    pub fn new(
        conn: Arc<dyn HypervisorConnection>,
        swift: Arc<dyn ObjectStoreUploader>,
        s3: Arc<dyn ObjectStoreUploader>,
    ) -> Self {
        Self { conn, swift, s3 }
    }

    /// Full-backup dispatch: the staged copy already sits on the
    /// secondary-file tier. For a secondary-file destination that copy is
    /// the backup; for object stores it is uploaded and then deleted from
    /// the staging area whether or not the upload succeeded.
    #[allow(clippy::too_many_arguments)]
    pub async fn persist(
        &self,
        staging: &EphemeralRepository,
        staged_object: &str,
        destination: &DataStore,
        volume_id: &str,
        folder: &str,
        mount_source: &str,
        use_block_mode: bool,
        wait_secs: u64,
    ) -> Result<String> {
        match destination {
            DataStore::Swift { .. } => {
                let container = swift_container(volume_id);
                // A staged copy always lives on a file-based repository,
                // so the upload never runs in block mode here.
                let upload = self
                    .swift
                    .upload(&staging.repository, staged_object, &container, false, wait_secs)
                    .await;
                self.delete_staged(mount_source, folder, staged_object).await;
                match upload? {
                    Some(key) => Ok(format!("{container}/{key}")),
                    None => Err(upload_failed(staged_object)),
                }
            }
            DataStore::S3 { bucket, .. } => {
                let upload = self
                    .s3
                    .upload(
                        &staging.repository,
                        staged_object,
                        bucket,
                        use_block_mode,
                        wait_secs,
                    )
                    .await;
                self.delete_staged(mount_source, folder, staged_object).await;
                match upload? {
                    Some(key) => Ok(key),
                    None => Err(upload_failed(staged_object)),
                }
            }
            DataStore::SecondaryFile { .. } => Ok(format!("{folder}/{staged_object}")),
            DataStore::PrimaryPool { .. } => Err(VoltierError::UnsupportedProtocol),
        }
    }

    /// Incremental dispatch for object stores: the snapshot's VHD parent
    /// is uploaded straight from the primary pool, with no staging step
    /// and nothing to clean up afterwards.
    pub async fn persist_from_pool(
        &self,
        pool_repository: &str,
        parent_disk: &str,
        destination: &DataStore,
        volume_id: &str,
        use_block_mode: bool,
        wait_secs: u64,
    ) -> Result<String> {
        match destination {
            DataStore::Swift { .. } => {
                let container = swift_container(volume_id);
                match self
                    .swift
                    .upload(
                        pool_repository,
                        parent_disk,
                        &container,
                        use_block_mode,
                        wait_secs,
                    )
                    .await?
                {
                    Some(key) => Ok(format!("{container}/{key}")),
                    None => Err(upload_failed(parent_disk)),
                }
            }
            DataStore::S3 { bucket, .. } => {
                match self
                    .s3
                    .upload(
                        pool_repository,
                        parent_disk,
                        bucket,
                        use_block_mode,
                        wait_secs,
                    )
                    .await?
                {
                    Some(key) => Ok(key),
                    None => Err(upload_failed(parent_disk)),
                }
            }
            _ => Err(VoltierError::UnsupportedProtocol),
        }
    }

    /// The staged copy is redundant once the object store holds the
    /// backup; a failed delete is logged and swallowed.
    async fn delete_staged(&self, mount_source: &str, folder: &str, staged_object: &str) {
        if let Err(e) = self
            .conn
            .delete_staged_backup(mount_source, folder, staged_object)
            .await
        {
            debug!("failed to delete staged snapshot copy {staged_object}: {e}");
        }
    }
}

fn upload_failed(object_id: &str) -> VoltierError {
    VoltierError::UploadError {
        object_id: object_id.to_string(),
        message: "object store returned no destination path".to_string(),
    }
}
