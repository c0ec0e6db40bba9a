//! Annotation types
//!
//! Bookmarks, highlights, and notes are all keyed by verse location and a
//! timestamp; they differ only in their payload. Annotations are
//! translation-independent and survive translation removal.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::content::VerseIndex;
use crate::error::{Error, Result};
use crate::state::VerseUpdate;

/// Display order for annotation lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Descending timestamp, ties broken by ascending verse index
    #[default]
    ByDate,
    /// Ascending verse index
    ByBook,
}

impl SortOrder {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            SortOrder::ByDate => "by_date",
            SortOrder::ByBook => "by_book",
        }
    }

    pub(crate) fn parse(raw: &str) -> SortOrder {
        match raw {
            "by_book" => SortOrder::ByBook,
            _ => SortOrder::ByDate,
        }
    }
}

/// Common surface of every annotation kind
pub trait VerseAnnotation {
    fn verse_index(&self) -> VerseIndex;
    fn timestamp(&self) -> i64;
    /// Presence predicate: point reads return an empty sentinel value
    /// (timestamp zero) instead of a not-found failure.
    fn is_valid(&self) -> bool {
        self.timestamp() > 0
    }
}

/// A bookmarked verse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub verse_index: VerseIndex,
    pub timestamp: i64,
}

impl Bookmark {
    pub fn new(verse_index: VerseIndex) -> Self {
        Self {
            verse_index,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

impl VerseAnnotation for Bookmark {
    fn verse_index(&self) -> VerseIndex {
        self.verse_index
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Highlight colors available to the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    Yellow,
    Pink,
    Orange,
    Purple,
    Red,
    Green,
    Blue,
}

/// A highlighted verse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub verse_index: VerseIndex,
    pub color: HighlightColor,
    pub timestamp: i64,
}

impl Highlight {
    pub fn new(verse_index: VerseIndex, color: HighlightColor) -> Self {
        Self {
            verse_index,
            color,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

impl VerseAnnotation for Highlight {
    fn verse_index(&self) -> VerseIndex {
        self.verse_index
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// A free-text note attached to a verse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub verse_index: VerseIndex,
    pub text: String,
    pub timestamp: i64,
}

impl Note {
    pub fn new(verse_index: VerseIndex, text: impl Into<String>) -> Self {
        Self {
            verse_index,
            text: text.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

impl VerseAnnotation for Note {
    fn verse_index(&self) -> VerseIndex {
        self.verse_index
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Per-kind adapter for the generic repository: table name, sort-order
/// preference key, empty sentinel, payload codec, and event constructors.
pub trait AnnotationKind: Send + Sync + 'static {
    type Value: VerseAnnotation + Clone + Send + Sync + 'static;

    const TABLE: &'static str;
    const SORT_ORDER_KEY: &'static str;

    fn empty(verse_index: VerseIndex) -> Self::Value;
    fn encode_payload(value: &Self::Value) -> Result<Option<String>>;
    fn decode(verse_index: VerseIndex, timestamp: i64, payload: Option<&str>)
        -> Result<Self::Value>;
    fn saved_update(value: &Self::Value) -> VerseUpdate;
    fn removed_update(verse_index: VerseIndex) -> VerseUpdate;
}

#[derive(Debug, Serialize, Deserialize)]
struct HighlightPayload {
    color: HighlightColor,
}

#[derive(Debug, Serialize, Deserialize)]
struct NotePayload {
    text: String,
}

fn corrupt(table: &str, detail: impl std::fmt::Display) -> Error {
    Error::DataCorruption(format!("{table} payload: {detail}"))
}

/// Bookmark kind adapter
pub struct BookmarkKind;

impl AnnotationKind for BookmarkKind {
    type Value = Bookmark;

    const TABLE: &'static str = "bookmarks";
    const SORT_ORDER_KEY: &'static str = "sort_order:bookmarks";

    fn empty(verse_index: VerseIndex) -> Bookmark {
        Bookmark {
            verse_index,
            timestamp: 0,
        }
    }

    fn encode_payload(_value: &Bookmark) -> Result<Option<String>> {
        Ok(None)
    }

    fn decode(verse_index: VerseIndex, timestamp: i64, _payload: Option<&str>) -> Result<Bookmark> {
        Ok(Bookmark {
            verse_index,
            timestamp,
        })
    }

    fn saved_update(value: &Bookmark) -> VerseUpdate {
        VerseUpdate::BookmarkAdded(value.verse_index)
    }

    fn removed_update(verse_index: VerseIndex) -> VerseUpdate {
        VerseUpdate::BookmarkRemoved(verse_index)
    }
}

/// Highlight kind adapter
pub struct HighlightKind;

impl AnnotationKind for HighlightKind {
    type Value = Highlight;

    const TABLE: &'static str = "highlights";
    const SORT_ORDER_KEY: &'static str = "sort_order:highlights";

    fn empty(verse_index: VerseIndex) -> Highlight {
        Highlight {
            verse_index,
            color: HighlightColor::Yellow,
            timestamp: 0,
        }
    }

    fn encode_payload(value: &Highlight) -> Result<Option<String>> {
        let payload = HighlightPayload { color: value.color };
        Ok(Some(serde_json::to_string(&payload).map_err(|e| {
            corrupt(Self::TABLE, e)
        })?))
    }

    fn decode(verse_index: VerseIndex, timestamp: i64, payload: Option<&str>) -> Result<Highlight> {
        let raw = payload.ok_or_else(|| corrupt(Self::TABLE, "missing payload"))?;
        let payload: HighlightPayload =
            serde_json::from_str(raw).map_err(|e| corrupt(Self::TABLE, e))?;
        Ok(Highlight {
            verse_index,
            color: payload.color,
            timestamp,
        })
    }

    fn saved_update(value: &Highlight) -> VerseUpdate {
        VerseUpdate::HighlightUpdated(value.verse_index, Some(value.color))
    }

    fn removed_update(verse_index: VerseIndex) -> VerseUpdate {
        VerseUpdate::HighlightUpdated(verse_index, None)
    }
}

/// Note kind adapter
pub struct NoteKind;

impl AnnotationKind for NoteKind {
    type Value = Note;

    const TABLE: &'static str = "notes";
    const SORT_ORDER_KEY: &'static str = "sort_order:notes";

    fn empty(verse_index: VerseIndex) -> Note {
        Note {
            verse_index,
            text: String::new(),
            timestamp: 0,
        }
    }

    fn encode_payload(value: &Note) -> Result<Option<String>> {
        let payload = NotePayload {
            text: value.text.clone(),
        };
        Ok(Some(serde_json::to_string(&payload).map_err(|e| {
            corrupt(Self::TABLE, e)
        })?))
    }

    fn decode(verse_index: VerseIndex, timestamp: i64, payload: Option<&str>) -> Result<Note> {
        let raw = payload.ok_or_else(|| corrupt(Self::TABLE, "missing payload"))?;
        let payload: NotePayload =
            serde_json::from_str(raw).map_err(|e| corrupt(Self::TABLE, e))?;
        Ok(Note {
            verse_index,
            text: payload.text,
            timestamp,
        })
    }

    fn saved_update(value: &Note) -> VerseUpdate {
        VerseUpdate::NoteAdded(value.verse_index)
    }

    fn removed_update(verse_index: VerseIndex) -> VerseUpdate {
        VerseUpdate::NoteRemoved(verse_index)
    }
}
