//! Versioned backup snapshots of all user data

mod codec;
mod types;

pub use codec::BackupManager;
pub use types::SNAPSHOT_VERSION;
