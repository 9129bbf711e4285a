pub mod chain;
pub mod orchestrator;
pub mod upload;


pub use chain::{BackupClassification, SnapshotChainResolver};
pub use orchestrator::DataMovementOrchestrator;
pub use upload::BackendUploader;
