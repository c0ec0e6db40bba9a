//! Reactive application state
//!
//! Two distribution disciplines, deliberately kept apart:
//!
//! - [`ReadingStateCache`] — latest-value state streams with replay for new
//!   subscribers (current translation, current verse, parallel set)
//! - [`VerseUpdateBus`] — discrete fire-and-forget events without replay
//!   (bookmark added, note removed, ...)

mod cache;
mod events;

pub use cache::ReadingStateCache;
pub use events::{VerseUpdate, VerseUpdateBus};
