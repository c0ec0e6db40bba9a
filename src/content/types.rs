//! Core scripture content types

use serde::{Deserialize, Serialize};

use crate::canon;

/// Zero-based coordinates identifying a scripture location
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VerseIndex {
    #[serde(rename = "bookIndex")]
    pub book_index: i32,
    #[serde(rename = "chapterIndex")]
    pub chapter_index: i32,
    #[serde(rename = "verseIndex")]
    pub verse_index: i32,
}

impl VerseIndex {
    /// Sentinel representing "no selection"
    pub const INVALID: VerseIndex = VerseIndex {
        book_index: -1,
        chapter_index: -1,
        verse_index: -1,
    };

    pub fn new(book_index: i32, chapter_index: i32, verse_index: i32) -> Self {
        Self {
            book_index,
            chapter_index,
            verse_index,
        }
    }

    /// Whether all coordinates are non-negative. A valid index is not
    /// necessarily inside the canon; see [`canon::contains`].
    pub fn is_valid(&self) -> bool {
        self.book_index >= 0 && self.chapter_index >= 0 && self.verse_index >= 0
    }

    /// Collapse any index outside the canon to [`VerseIndex::INVALID`].
    pub fn normalized(self) -> Self {
        if canon::contains(self) {
            self
        } else {
            Self::INVALID
        }
    }
}

/// One installed or installable translation, identified by its short name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TranslationInfo {
    #[serde(rename = "shortName")]
    pub short_name: String,
    pub name: String,
    pub language: String,
    pub size: i64,
}

/// Verse text from one translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseText {
    pub translation_short_name: String,
    pub book_name: String,
    pub text: String,
}

/// A verse assembled on read: primary text plus any parallel translations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verse {
    pub verse_index: VerseIndex,
    pub text: VerseText,
    pub parallel: Vec<VerseText>,
}
