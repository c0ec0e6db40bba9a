//! Translation installation
//!
//! Remote catalog fetch, per-chapter download with validation, and atomic
//! commit, with progress reporting and cooperative cancellation.

mod installer;
mod parser;
mod remote;

pub use installer::{InstallPhase, TranslationInstaller};
pub use remote::{HttpSource, RemoteSource};
