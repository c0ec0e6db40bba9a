//! Lectio - Scripture content and annotation engine
//!
//! The content & annotation management layer of a personal Bible-reading
//! application:
//!
//! - [`store::Database`] — durable SQLite storage with atomic multi-table
//!   transactions and additive schema upgrades
//! - [`content::ContentRepository`] — installed translations and verse text
//! - [`annotations`] — one generic repository over bookmarks, highlights,
//!   and notes
//! - [`state::ReadingStateCache`] — reactive current translation / verse /
//!   parallel-set streams, plus the discrete verse update bus
//! - [`install::TranslationInstaller`] — multi-stage translation install
//!   from a remote catalog, with progress and cancellation
//! - [`progress`] — reading time tracking
//! - [`backup::BackupManager`] — versioned user-data snapshots
//!
//! The user-facing shell (rendering, navigation, theming) lives elsewhere;
//! this crate owns the invariants, concurrency coordination, and failure
//! handling underneath it.

pub mod annotations;
pub mod backup;
pub mod canon;
pub mod config;
pub mod content;
pub mod error;
pub mod install;
pub mod progress;
pub mod state;
pub mod store;

pub use annotations::{
    Bookmark, BookmarkRepository, Highlight, HighlightColor, HighlightRepository, Note,
    NoteRepository, SortOrder, VerseAnnotation,
};
pub use backup::BackupManager;
pub use config::Config;
pub use content::{ContentRepository, TranslationInfo, Verse, VerseIndex, VerseText};
pub use error::{Error, Result};
pub use install::{HttpSource, InstallPhase, RemoteSource, TranslationInstaller};
pub use progress::{ProgressRepository, ReadingProgress, ReadingTracker};
pub use state::{ReadingStateCache, VerseUpdate, VerseUpdateBus};
pub use store::Database;
