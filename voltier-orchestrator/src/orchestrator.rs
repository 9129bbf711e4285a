use crate::chain::{BackupClassification, SnapshotChainResolver};
use crate::upload::BackendUploader;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use voltier_core::{
    parent_directory, split_object_path, Config, CopyAnswer, CopyRequest, DataObject, DataStore,
    ImageFormat, Result, SnapshotObject, TemplateObject, VoltierError, VolumeObject,
};
use voltier_hypervisor::{
    AsyncTaskWaiter, EphemeralRepository, EphemeralRepositoryManager, FolderManager,
    HypervisorConnection, ObjectStoreUploader, TemplateMetadata, TemplateMetadataWriter,
};

/// Top-level entry points for moving disk data objects between tiers.
///
/// Every operation follows the same shape: acquire staging resources,
/// start a remote async copy task, wait, extract the result, optionally
/// persist to a final backend, and release every staging resource it
/// acquired regardless of outcome. Business failures surface as
/// `CopyAnswer::Failure` messages, never as panics.
pub struct DataMovementOrchestrator {
    conn: Arc<dyn HypervisorConnection>,
    folders: Arc<dyn FolderManager>,
    metadata: Arc<dyn TemplateMetadataWriter>,
    staging: EphemeralRepositoryManager,
    waiter: AsyncTaskWaiter,
    resolver: SnapshotChainResolver,
    uploader: BackendUploader,
    config: Config,
}

impl DataMovementOrchestrator {
    pub fn new(
        conn: Arc<dyn HypervisorConnection>,
        folders: Arc<dyn FolderManager>,
        swift: Arc<dyn ObjectStoreUploader>,
        s3: Arc<dyn ObjectStoreUploader>,
        metadata: Arc<dyn TemplateMetadataWriter>,
        config: Config,
    ) -> Self {
        let staging = EphemeralRepositoryManager::new(conn.clone(), &config);
        let waiter = AsyncTaskWaiter::new(conn.clone(), config.poll_interval_ms);
        let resolver = SnapshotChainResolver::new(conn.clone());
        let uploader = BackendUploader::new(conn.clone(), swift, s3);
        Self {
            conn,
            folders,
            metadata,
            staging,
            waiter,
            resolver,
            uploader,
            config,
        }
    }

    /// Copies a template from a file-based store into a primary pool and
    /// returns the pool-side snapshot backing the new template.
    pub async fn copy_template_to_primary_storage(&self, req: &CopyRequest) -> CopyAnswer {
        self.answer(
            "copy template to primary storage",
            self.copy_template(req).await,
        )
    }

    /// Backs up a snapshot to a secondary-file store or an object store,
    /// choosing full or incremental per the snapshot chain on the pool.
    pub async fn backup_snapshot(&self, req: &CopyRequest) -> CopyAnswer {
        self.answer("backup snapshot", self.backup(req).await)
    }

    /// Copies a volume into a fresh template directory on secondary
    /// storage and writes its template properties.
    pub async fn create_template_from_volume(&self, req: &CopyRequest) -> CopyAnswer {
        self.answer(
            "create template from volume",
            self.template_from_volume(req).await,
        )
    }

    /// Materializes a volume on a primary pool from an archived snapshot.
    pub async fn create_volume_from_snapshot(&self, req: &CopyRequest) -> CopyAnswer {
        self.answer(
            "create volume from snapshot",
            self.volume_from_snapshot(req).await,
        )
    }

    pub async fn copy_volume_from_primary_to_secondary(&self, req: &CopyRequest) -> CopyAnswer {
        self.answer(
            "copy volume from primary to secondary",
            self.volume_to_secondary(req).await,
        )
    }

    pub async fn copy_volume_from_image_cache_to_primary(&self, req: &CopyRequest) -> CopyAnswer {
        self.answer(
            "copy volume from image cache to primary",
            self.volume_from_cache(req).await,
        )
    }

    fn answer(&self, operation: &str, result: Result<DataObject>) -> CopyAnswer {
        match result {
            Ok(obj) => CopyAnswer::Success(obj),
            Err(e) => {
                warn!("{operation} failed: {e}");
                CopyAnswer::Failure(e.to_string())
            }
        }
    }

    /// Resolves a pool name to exactly one repository.
    async fn resolve_pool(&self, pool_name: &str) -> Result<String> {
        let mut pools = self.conn.find_pools_by_name(pool_name).await?;
        match pools.len() {
            1 => Ok(pools.remove(0)),
            0 => Err(VoltierError::PoolNotFound {
                pool_name: pool_name.to_string(),
            }),
            count => Err(VoltierError::AmbiguousPool {
                pool_name: pool_name.to_string(),
                count,
            }),
        }
    }

    /// Waits out a copy task and releases its handle whatever the outcome.
    async fn run_copy_task(&self, task: &str, wait_secs: u64) -> Result<String> {
        let outcome = self.waiter.wait(task, wait_secs.saturating_mul(1000)).await;
        self.waiter.finish(task).await;
        outcome
    }

    async fn copy_template(&self, req: &CopyRequest) -> Result<DataObject> {
        let DataObject::Template(src) = &req.source else {
            return Err(VoltierError::UnsupportedProtocol);
        };
        if !src.store.is_file_based() {
            return Err(VoltierError::UnsupportedProtocol);
        }
        let DataStore::PrimaryPool { pool_name } = req.destination.store() else {
            return Err(VoltierError::UnsupportedProtocol);
        };
        let mount_source = src.store.secondary_mount_source()?;
        let volume_directory = parent_directory(&src.path)?;
        info!("copying template {} into pool {pool_name}", src.id);

        let staged = self.staging.stage(&mount_source, &volume_directory).await?;
        let result = self
            .copy_template_staged(&staged, src, pool_name, req.destination.store(), req.wait_secs)
            .await;
        self.staging.release(&staged).await;
        result
    }

    async fn copy_template_staged(
        &self,
        staged: &EphemeralRepository,
        src: &TemplateObject,
        pool_name: &str,
        dest_store: &DataStore,
        wait_secs: u64,
    ) -> Result<DataObject> {
        let disks = self.conn.disks_in_repository(&staged.repository).await?;
        if disks.len() != 1 {
            return Err(VoltierError::AmbiguousSource {
                path: staged.remote_path.clone(),
                count: disks.len(),
            });
        }
        let source_disk = &disks[0];

        let pool = self.resolve_pool(pool_name).await?;
        let is_block = self.conn.is_block_based(&pool).await?;

        let task = self.conn.copy_disk_async(source_disk, &pool, None).await?;
        let copied = self.run_copy_task(&task, wait_secs).await?;

        let snapshot = self.conn.snapshot_disk(&copied).await?;
        if let Some(name) = &src.name {
            self.conn
                .set_disk_label(&snapshot, &format!("Template {name}"))
                .await?;
        }
        let parent = self
            .conn
            .vhd_parent(&pool, &snapshot, is_block)
            .await?
            .ok_or_else(|| {
                VoltierError::InternalInvariantViolation(format!(
                    "copied template {snapshot} has no VHD parent"
                ))
            })?;
        let physical_size = self.conn.disk_record(&parent).await?.physical_utilisation;

        // The intermediate copy is redundant once its snapshot exists.
        self.conn.destroy_disk(&copied).await?;
        self.conn.scan_repository(&pool).await?;
        // Let the remote side converge after the rescan.
        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;

        Ok(DataObject::Template(TemplateObject {
            id: snapshot.clone(),
            name: src.name.clone(),
            path: snapshot,
            format: ImageFormat::Vhd,
            size: src.size,
            physical_size: Some(physical_size),
            store: dest_store.clone(),
        }))
    }

    async fn backup(&self, req: &CopyRequest) -> Result<DataObject> {
        let DataObject::Snapshot(src) = &req.source else {
            return Err(VoltierError::UnsupportedProtocol);
        };
        let DataObject::Snapshot(dest) = &req.destination else {
            return Err(VoltierError::UnsupportedProtocol);
        };
        let DataStore::PrimaryPool { pool_name } = &src.store else {
            return Err(VoltierError::UnsupportedProtocol);
        };

        // Staging goes through the cache store when one is supplied,
        // otherwise through the destination itself.
        let (staging_store, folder) = match &req.cache {
            Some(cache) => (cache.store(), cache.path().to_string()),
            None => (&dest.store, dest.path.clone()),
        };
        let mount_source = staging_store.secondary_mount_source()?;

        let pool = self.resolve_pool(pool_name).await?;
        let is_block = self.conn.is_block_based(&pool).await?;

        let snapshot_id = src.path.clone();
        let volume = src.volume.clone().ok_or_else(|| {
            VoltierError::InternalInvariantViolation(
                "snapshot carries no owning volume".to_string(),
            )
        })?;
        let wait_secs = if req.wait_secs == 0 {
            self.config.default_backup_wait_secs
        } else {
            req.wait_secs
        };

        let classification = self
            .resolver
            .classify(
                &pool,
                &snapshot_id,
                src.parent_snapshot_path.as_deref(),
                dest.parent_snapshot_path.as_deref(),
                is_block,
            )
            .await;
        info!("backing up snapshot {snapshot_id} as {classification:?}");

        let final_path = match &classification {
            BackupClassification::Full => {
                if !self.folders.create_folder(&mount_source, &folder).await? {
                    return Err(VoltierError::FolderCreateError { folder });
                }
                let staged = self.staging.stage(&mount_source, &folder).await?;
                let result = self
                    .backup_full(
                        &staged,
                        &snapshot_id,
                        &dest.store,
                        &volume.id,
                        &folder,
                        &mount_source,
                        is_block,
                        wait_secs,
                    )
                    .await;
                self.staging.release(&staged).await;
                result?
            }
            BackupClassification::Incremental { parent_disk, .. } => {
                if dest.store.is_object_store() {
                    self.uploader
                        .persist_from_pool(
                            &pool,
                            parent_disk,
                            &dest.store,
                            &volume.id,
                            is_block,
                            wait_secs,
                        )
                        .await?
                } else if dest.store.is_file_based() {
                    let staged = self.staging.stage(&mount_source, &folder).await?;
                    let result = self
                        .copy_snapshot_with_base(
                            &staged,
                            &snapshot_id,
                            src.parent_snapshot_path.as_deref(),
                            wait_secs,
                        )
                        .await;
                    self.staging.release(&staged).await;
                    format!("{folder}/{}", result?)
                } else {
                    return Err(VoltierError::UnsupportedProtocol);
                }
            }
        };

        // Retention: keep only the snapshot that was just backed up.
        self.conn
            .destroy_volume_snapshots_except(&volume.path, &snapshot_id)
            .await?;

        let parent_snapshot_path = match classification {
            BackupClassification::Full => None,
            BackupClassification::Incremental { base_backup, .. } => Some(base_backup),
        };
        Ok(DataObject::Snapshot(SnapshotObject {
            id: src.id.clone(),
            path: final_path,
            parent_snapshot_path,
            volume: Some(volume),
            store: dest.store.clone(),
        }))
    }

    #[allow(clippy::too_many_arguments)]
    async fn backup_full(
        &self,
        staged: &EphemeralRepository,
        snapshot_id: &str,
        dest_store: &DataStore,
        volume_id: &str,
        folder: &str,
        mount_source: &str,
        is_block: bool,
        wait_secs: u64,
    ) -> Result<String> {
        let task = self
            .conn
            .copy_disk_async(snapshot_id, &staged.repository, None)
            .await?;
        let backup_id = self.run_copy_task(&task, wait_secs).await?;
        self.uploader
            .persist(
                staged,
                &backup_id,
                dest_store,
                volume_id,
                folder,
                mount_source,
                is_block,
                wait_secs,
            )
            .await
    }

    /// Incremental copy onto the secondary-file tier, relative to the
    /// previously backed up snapshot.
    async fn copy_snapshot_with_base(
        &self,
        staged: &EphemeralRepository,
        snapshot_id: &str,
        base_snapshot: Option<&str>,
        wait_secs: u64,
    ) -> Result<String> {
        let task = self
            .conn
            .copy_disk_async(snapshot_id, &staged.repository, base_snapshot)
            .await?;
        self.run_copy_task(&task, wait_secs).await
    }

    async fn template_from_volume(&self, req: &CopyRequest) -> Result<DataObject> {
        let DataObject::Volume(volume) = &req.source else {
            return Err(VoltierError::UnsupportedProtocol);
        };
        let DataObject::Template(template) = &req.destination else {
            return Err(VoltierError::UnsupportedProtocol);
        };
        let mount_source = template.store.secondary_mount_source()?;
        let install_path = template.path.clone();
        info!(
            "creating template at {install_path} from volume {}",
            volume.path
        );

        if !self.folders.create_folder(&mount_source, &install_path).await? {
            return Err(VoltierError::FolderCreateError {
                folder: install_path,
            });
        }

        let result = self
            .template_from_volume_staged(volume, template, &mount_source, &install_path, req.wait_secs)
            .await;
        if result.is_err() {
            // Roll back the destination folder created above.
            if let Err(e) = self.folders.delete_folder(&mount_source, &install_path).await {
                warn!("failed to roll back template folder {install_path}: {e}");
            }
        }
        result
    }

    async fn template_from_volume_staged(
        &self,
        volume: &VolumeObject,
        template: &TemplateObject,
        mount_source: &str,
        install_path: &str,
        wait_secs: u64,
    ) -> Result<DataObject> {
        let staged = self.staging.stage(mount_source, install_path).await?;
        let result = self
            .build_template(&staged, volume, template, mount_source, install_path, wait_secs)
            .await;
        self.staging.release(&staged).await;
        result
    }

    async fn build_template(
        &self,
        staged: &EphemeralRepository,
        volume: &VolumeObject,
        template: &TemplateObject,
        mount_source: &str,
        install_path: &str,
        wait_secs: u64,
    ) -> Result<DataObject> {
        let task = self
            .conn
            .copy_disk_async(&volume.path, &staged.repository, None)
            .await?;
        let template_uuid = self.run_copy_task(&task, wait_secs).await?;

        // Rescan so the remote side reports real size fields.
        self.conn.scan_repository(&staged.repository).await?;
        if let Some(name) = &template.name {
            self.conn.set_disk_label(&template_uuid, name).await?;
        }
        let record = self.conn.disk_record(&template_uuid).await?;

        let filename = format!("{template_uuid}.vhd");
        let template_path = format!("{mount_source}/{install_path}");
        let written = self
            .metadata
            .write(
                &template_path,
                &TemplateMetadata {
                    filename: filename.clone(),
                    uuid: template_uuid.clone(),
                    name: template.name.clone(),
                    virtual_size: record.virtual_size,
                    physical_size: record.physical_utilisation,
                    template_id: template.id.clone(),
                },
            )
            .await?;
        if !written {
            return Err(VoltierError::StorageError(
                "could not create the template properties file on secondary storage".to_string(),
            ));
        }

        Ok(DataObject::Template(TemplateObject {
            id: template_uuid.clone(),
            name: Some(template_uuid),
            path: format!("{install_path}/{filename}"),
            format: ImageFormat::Vhd,
            size: Some(record.virtual_size),
            physical_size: Some(record.physical_utilisation),
            store: template.store.clone(),
        }))
    }

    async fn volume_from_snapshot(&self, req: &CopyRequest) -> Result<DataObject> {
        let DataObject::Snapshot(snapshot) = &req.source else {
            return Err(VoltierError::UnsupportedProtocol);
        };
        if !snapshot.store.is_file_based() {
            return Err(VoltierError::UnsupportedProtocol);
        }
        let DataStore::PrimaryPool { pool_name } = req.destination.store() else {
            return Err(VoltierError::UnsupportedProtocol);
        };
        let mount_source = snapshot.store.secondary_mount_source()?;
        let (snapshot_directory, snapshot_id) = split_object_path(&snapshot.path)?;
        let pool = self.resolve_pool(pool_name).await?;

        let staged = self.staging.stage(&mount_source, &snapshot_directory).await?;
        let result = self
            .restore_snapshot(&snapshot_id, &pool, req.destination.store(), req.wait_secs)
            .await;
        self.staging.release(&staged).await;
        result
    }

    async fn restore_snapshot(
        &self,
        snapshot_id: &str,
        pool: &str,
        dest_store: &DataStore,
        wait_secs: u64,
    ) -> Result<DataObject> {
        let task = self.conn.copy_disk_async(snapshot_id, pool, None).await?;
        let volume_id = self.run_copy_task(&task, wait_secs).await?;
        let record = self.conn.disk_record(&volume_id).await?;
        Ok(DataObject::Volume(VolumeObject {
            id: volume_id.clone(),
            path: volume_id,
            size: Some(record.virtual_size),
            store: dest_store.clone(),
        }))
    }

    async fn volume_to_secondary(&self, req: &CopyRequest) -> Result<DataObject> {
        let DataObject::Volume(src) = &req.source else {
            return Err(VoltierError::UnsupportedProtocol);
        };
        let DataObject::Volume(dest) = &req.destination else {
            return Err(VoltierError::UnsupportedProtocol);
        };
        if !dest.store.is_file_based() {
            return Err(VoltierError::UnsupportedProtocol);
        }
        let mount_source = dest.store.secondary_mount_source()?;

        if !self.folders.create_folder(&mount_source, &dest.path).await? {
            return Err(VoltierError::FolderCreateError {
                folder: dest.path.clone(),
            });
        }

        let staged = self.staging.stage(&mount_source, &dest.path).await?;
        let result = self.export_volume(src, dest, &staged, req.wait_secs).await;
        self.staging.release(&staged).await;
        result
    }

    async fn export_volume(
        &self,
        src: &VolumeObject,
        dest: &VolumeObject,
        staged: &EphemeralRepository,
        wait_secs: u64,
    ) -> Result<DataObject> {
        let task = self
            .conn
            .copy_disk_async(&src.path, &staged.repository, None)
            .await?;
        let copied = self.run_copy_task(&task, wait_secs).await?;
        Ok(DataObject::Volume(VolumeObject {
            id: copied.clone(),
            path: format!("{}/{copied}.vhd", dest.path),
            size: src.size,
            store: dest.store.clone(),
        }))
    }

    async fn volume_from_cache(&self, req: &CopyRequest) -> Result<DataObject> {
        let DataObject::Volume(src) = &req.source else {
            return Err(VoltierError::UnsupportedProtocol);
        };
        let DataObject::Volume(dest) = &req.destination else {
            return Err(VoltierError::UnsupportedProtocol);
        };
        if !src.store.is_file_based() {
            return Err(VoltierError::UnsupportedProtocol);
        }
        let DataStore::PrimaryPool { pool_name } = &dest.store else {
            return Err(VoltierError::UnsupportedProtocol);
        };
        let mount_source = src.store.secondary_mount_source()?;
        let (volume_directory, volume_id) = split_object_path(&src.path)?;
        let pool = self.resolve_pool(pool_name).await?;

        let staged = self.staging.stage(&mount_source, &volume_directory).await?;
        let result = self
            .import_volume(&volume_id, &pool, src.size, &dest.store, req.wait_secs)
            .await;
        self.staging.release(&staged).await;
        result
    }

    async fn import_volume(
        &self,
        volume_id: &str,
        pool: &str,
        size: Option<u64>,
        dest_store: &DataStore,
        wait_secs: u64,
    ) -> Result<DataObject> {
        let task = self.conn.copy_disk_async(volume_id, pool, None).await?;
        let copied = self.run_copy_task(&task, wait_secs).await?;
        Ok(DataObject::Volume(VolumeObject {
            id: copied.clone(),
            path: copied,
            size,
            store: dest_store.clone(),
        }))
    }
}
