use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tunables for the data-movement orchestrator. Loaded from
/// `~/.voltier/config.yaml` when present, otherwise defaults apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root under which ephemeral staging mount points are created.
    pub mount_root: PathBuf,
    /// Timeout for the remote mount plugin call.
    pub mount_timeout_ms: u64,
    /// Interval between remote task status polls.
    pub poll_interval_ms: u64,
    /// Delay after a pool rescan, letting the remote side converge before
    /// the copied template is reported back.
    pub settle_delay_ms: u64,
    /// Task timeout applied to snapshot backups when the request carries
    /// no explicit wait value.
    pub default_backup_wait_secs: u64,
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_yaml::from_str(&content)
                .map_err(|e| crate::VoltierError::ConfigError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> crate::Result<()> {
        let config_path = Self::config_path()?;
        if let Some(config_dir) = config_path.parent() {
            std::fs::create_dir_all(config_dir)?;
        }

        let content = serde_yaml::to_string(self)
            .map_err(|e| crate::VoltierError::ConfigError(e.to_string()))?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    fn config_path() -> crate::Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| {
            crate::VoltierError::ConfigError("Cannot determine home directory".to_string())
        })?;
        Ok(home.join(".voltier").join("config.yaml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mount_root: PathBuf::from("/var/cloud_mount"),
            mount_timeout_ms: 100 * 1000,
            poll_interval_ms: 1000,
            settle_delay_ms: 5000,
            default_backup_wait_secs: 2 * 60 * 60,
        }
    }
}
