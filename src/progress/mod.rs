//! Reading progress
//!
//! Per-chapter accumulated reading time, a per-day read-chapter log, and
//! the session tracker feeding them.

pub(crate) mod store;
mod tracker;
mod types;

pub use store::ProgressRepository;
pub use tracker::ReadingTracker;
pub use types::{ChapterProgress, DailyReading, ReadingProgress};
