use crate::HypervisorConnection;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use voltier_core::{Config, Result, VoltierError};

/// A remote file-based repository mounted over a transient local mount
/// point. Exclusively owned by the operation that staged it; must be
/// released exactly once before that operation returns.
#[derive(Debug, Clone)]
pub struct EphemeralRepository {
    pub repository: String,
    pub local_mount_path: String,
    pub remote_path: String,
    pub created_at: DateTime<Utc>,
}

/// Creates and tears down ephemeral staging repositories. Every staging
/// call mounts at a freshly generated local path; mount points are never
/// cached or shared across invocations.
pub struct EphemeralRepositoryManager {
    conn: Arc<dyn HypervisorConnection>,
    mount_root: PathBuf,
    mount_timeout_ms: u64,
}

impl EphemeralRepositoryManager {
    pub fn new(conn: Arc<dyn HypervisorConnection>, config: &Config) -> Self {
        Self {
            conn,
            mount_root: config.mount_root.clone(),
            mount_timeout_ms: config.mount_timeout_ms,
        }
    }

    /// Mounts `remote_dir` at a fresh local mount point, registers a
    /// file-based repository at `<mount>/<sub_path>` and rescans it.
    pub async fn stage(&self, remote_dir: &str, sub_path: &str) -> Result<EphemeralRepository> {
        let local_dir = self.mount_root.join(Uuid::new_v4().to_string());
        let local_dir = local_dir.to_string_lossy().into_owned();

        let mounted = self
            .conn
            .mount_remote_dir(remote_dir, &local_dir, self.mount_timeout_ms)
            .await?;
        match mounted {
            Some(result) if !result.is_empty() => {}
            _ => {
                let err = VoltierError::MountError {
                    remote_dir: remote_dir.to_string(),
                    message: "mount call returned no result".to_string(),
                };
                warn!("{err}");
                return Err(err);
            }
        }

        let repository = self
            .conn
            .create_file_repository(&format!("{local_dir}/{sub_path}"))
            .await?;
        self.conn.scan_repository(&repository).await?;

        info!("staged repository {repository} for {remote_dir}/{sub_path} at {local_dir}");
        Ok(EphemeralRepository {
            repository,
            local_mount_path: local_dir,
            remote_path: format!("{remote_dir}/{sub_path}"),
            created_at: Utc::now(),
        })
    }

    /// Unregisters the staged repository. Called once per successful
    /// staging, on every exit path of the owning operation; a failed
    /// removal is logged and never overrides the operation's result.
    pub async fn release(&self, repository: &EphemeralRepository) {
        if let Err(e) = self.conn.destroy_repository(&repository.repository).await {
            warn!(
                "failed to remove staging repository {}: {e}",
                repository.repository
            );
        } else {
            info!("released staging repository {}", repository.repository);
        }
    }
}
