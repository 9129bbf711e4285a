use std::sync::Arc;
use tracing::debug;
use voltier_hypervisor::HypervisorConnection;

/// Whether a snapshot backup is self-contained or references a previously
/// archived base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupClassification {
    Full,
    Incremental {
        /// Identifier of the prior backup the result will reference.
        base_backup: String,
        /// The snapshot's VHD parent on the primary pool; object-store
        /// incrementals upload this image directly.
        parent_disk: String,
    },
}

/// Classifies a backup by walking pairwise VHD parent links on the primary
/// pool. Issues only read queries; never mutates pool state.
pub struct SnapshotChainResolver {
    conn: Arc<dyn HypervisorConnection>,
}

impl SnapshotChainResolver {
    pub fn new(conn: Arc<dyn HypervisorConnection>) -> Self {
        Self { conn }
    }

    /// A backup is incremental when the new snapshot's grandparent equals
    /// the previous snapshot's parent and both resolve. The first backup
    /// (no previous backup id) is always full. Any lookup error degrades
    /// to a full backup rather than failing the operation.
    pub async fn classify(
        &self,
        pool: &str,
        snapshot: &str,
        prev_snapshot: Option<&str>,
        prev_backup: Option<&str>,
        is_block_based: bool,
    ) -> BackupClassification {
        let Some(prev_backup) = prev_backup else {
            return BackupClassification::Full;
        };

        match self
            .resolve_parent(pool, snapshot, prev_snapshot, is_block_based)
            .await
        {
            Ok(Some(parent_disk)) => BackupClassification::Incremental {
                base_backup: prev_backup.to_string(),
                parent_disk,
            },
            Ok(None) => BackupClassification::Full,
            Err(e) => {
                debug!("snapshot chain lookup failed, falling back to full backup: {e}");
                BackupClassification::Full
            }
        }
    }

    /// Returns the snapshot's parent when the chain comparison holds.
    async fn resolve_parent(
        &self,
        pool: &str,
        snapshot: &str,
        prev_snapshot: Option<&str>,
        is_block_based: bool,
    ) -> voltier_core::Result<Option<String>> {
        let Some(parent) = self.conn.vhd_parent(pool, snapshot, is_block_based).await? else {
            return Ok(None);
        };
        let grandparent = self.conn.vhd_parent(pool, &parent, is_block_based).await?;
        let prev_parent = match prev_snapshot {
            Some(prev) => self.conn.vhd_parent(pool, prev, is_block_based).await?,
            None => None,
        };
        match (grandparent, prev_parent) {
            (Some(g), Some(p)) if g == p => Ok(Some(parent)),
            _ => Ok(None),
        }
    }
}
