
use crate::{DiskRecord, HypervisorConnection, TaskStatus};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use voltier_core::{Result, VoltierError};

/// Scripted connection for waiter and staging tests. Each field drives one
/// collaborator call; counters record what actually happened.
#[derive(Default)]
pub struct ScriptedConnection {
    pub mount_results: Mutex<VecDeque<Option<String>>>,
    pub mounted_dirs: Mutex<Vec<(String, String)>>,
    pub created_repositories: Mutex<Vec<String>>,
    pub destroyed_repositories: Mutex<Vec<String>>,
    pub scanned_repositories: Mutex<Vec<String>>,
    pub task_statuses: Mutex<VecDeque<TaskStatus>>,
    pub destroyed_tasks: Mutex<Vec<String>>,
    pub fail_destroy_task: Mutex<bool>,
    pub fail_destroy_repository: Mutex<bool>,
}

impl ScriptedConnection {
    pub fn with_mount_result(result: Option<&str>) -> Self {
        let conn = Self::default();
        conn.mount_results
            .lock()
            .unwrap()
            .push_back(result.map(str::to_string));
        conn
    }

    pub fn push_task_status(&self, status: TaskStatus) {
        self.task_statuses.lock().unwrap().push_back(status);
    }
}

#[async_trait]
impl HypervisorConnection for ScriptedConnection {
    async fn mount_remote_dir(
        &self,
        remote_dir: &str,
        local_dir: &str,
        _timeout_ms: u64,
    ) -> Result<Option<String>> {
        self.mounted_dirs
            .lock()
            .unwrap()
            .push((remote_dir.to_string(), local_dir.to_string()));
        Ok(self
            .mount_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Some("mounted".to_string())))
    }

    async fn create_file_repository(&self, local_path: &str) -> Result<String> {
        let repository = format!("sr-{}", self.created_repositories.lock().unwrap().len());
        self.created_repositories
            .lock()
            .unwrap()
            .push(local_path.to_string());
        Ok(repository)
    }

    async fn destroy_repository(&self, repository: &str) -> Result<()> {
        if *self.fail_destroy_repository.lock().unwrap() {
            return Err(VoltierError::StorageError(
                "repository busy".to_string(),
            ));
        }
        self.destroyed_repositories
            .lock()
            .unwrap()
            .push(repository.to_string());
        Ok(())
    }

    async fn scan_repository(&self, repository: &str) -> Result<()> {
        self.scanned_repositories
            .lock()
            .unwrap()
            .push(repository.to_string());
        Ok(())
    }

    async fn is_block_based(&self, _repository: &str) -> Result<bool> {
        Ok(false)
    }

    async fn find_pools_by_name(&self, _pool_name: &str) -> Result<Vec<String>> {
        Ok(vec![])
    }

    async fn disks_in_repository(&self, _repository: &str) -> Result<Vec<String>> {
        Ok(vec![])
    }

    async fn disk_record(&self, disk: &str) -> Result<DiskRecord> {
        Ok(DiskRecord {
            uuid: disk.to_string(),
            label: String::new(),
            virtual_size: 0,
            physical_utilisation: 0,
        })
    }

    async fn copy_disk_async(
        &self,
        _disk: &str,
        _dest_repository: &str,
        _base_disk: Option<&str>,
    ) -> Result<String> {
        Ok("task-0".to_string())
    }

    async fn snapshot_disk(&self, disk: &str) -> Result<String> {
        Ok(format!("{disk}-snap"))
    }

    async fn set_disk_label(&self, _disk: &str, _label: &str) -> Result<()> {
        Ok(())
    }

    async fn destroy_disk(&self, _disk: &str) -> Result<()> {
        Ok(())
    }

    async fn vhd_parent(
        &self,
        _pool: &str,
        _disk: &str,
        _is_block_based: bool,
    ) -> Result<Option<String>> {
        Ok(None)
    }

    async fn task_status(&self, _task: &str) -> Result<TaskStatus> {
        Ok(self
            .task_statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TaskStatus::Pending))
    }

    async fn destroy_task(&self, task: &str) -> Result<()> {
        if *self.fail_destroy_task.lock().unwrap() {
            return Err(VoltierError::StorageError("task handle gone".to_string()));
        }
        self.destroyed_tasks.lock().unwrap().push(task.to_string());
        Ok(())
    }

    async fn destroy_volume_snapshots_except(&self, _volume_path: &str, _keep: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_staged_backup(
        &self,
        _mount_source: &str,
        _folder: &str,
        _backup_id: &str,
    ) -> Result<()> {
        Ok(())
    }
}
