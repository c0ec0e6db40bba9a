//! Discrete verse update events
//!
//! Fire-and-forget notifications observed by multiple screens (reading pane,
//! chapter list, annotation lists). Unlike the reading state streams these
//! carry no replay: a subscriber only sees events published after it
//! subscribed, and a lagging subscriber may drop old events.

use tokio::sync::broadcast;

use crate::annotations::HighlightColor;
use crate::content::VerseIndex;

const EVENT_CAPACITY: usize = 64;

/// A discrete change to one verse
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerseUpdate {
    VerseSelected(VerseIndex),
    VerseDeselected(VerseIndex),
    BookmarkAdded(VerseIndex),
    BookmarkRemoved(VerseIndex),
    NoteAdded(VerseIndex),
    NoteRemoved(VerseIndex),
    HighlightUpdated(VerseIndex, Option<HighlightColor>),
}

impl VerseUpdate {
    pub fn verse_index(&self) -> VerseIndex {
        match self {
            VerseUpdate::VerseSelected(v)
            | VerseUpdate::VerseDeselected(v)
            | VerseUpdate::BookmarkAdded(v)
            | VerseUpdate::BookmarkRemoved(v)
            | VerseUpdate::NoteAdded(v)
            | VerseUpdate::NoteRemoved(v)
            | VerseUpdate::HighlightUpdated(v, _) => *v,
        }
    }
}

/// Multi-subscriber publish primitive for [`VerseUpdate`] events
#[derive(Debug, Clone)]
pub struct VerseUpdateBus {
    tx: broadcast::Sender<VerseUpdate>,
}

impl VerseUpdateBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all current subscribers. Publishing with no
    /// subscribers is a no-op.
    pub fn publish(&self, update: VerseUpdate) {
        let _ = self.tx.send(update);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VerseUpdate> {
        self.tx.subscribe()
    }
}

impl Default for VerseUpdateBus {
    fn default() -> Self {
        Self::new()
    }
}
