//! Snapshot wire format
//!
//! Versioned container for all user annotation and progress data. Field
//! order is stable; the version tag gates restore.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::annotations::HighlightColor;

/// Version written by this engine
pub const SNAPSHOT_VERSION: i64 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub version: i64,
    pub bookmarks: Vec<BookmarkRow>,
    pub highlights: Vec<HighlightRow>,
    pub notes: Vec<NoteRow>,
    #[serde(rename = "readingProgress")]
    pub reading_progress: ProgressSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BookmarkRow {
    pub book: i32,
    pub chapter: i32,
    pub verse: i32,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct HighlightRow {
    pub book: i32,
    pub chapter: i32,
    pub verse: i32,
    pub timestamp: i64,
    pub color: HighlightColor,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct NoteRow {
    pub book: i32,
    pub chapter: i32,
    pub verse: i32,
    pub timestamp: i64,
    pub text: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ProgressSnapshot {
    #[serde(rename = "perChapter")]
    pub per_chapter: Vec<ChapterRow>,
    #[serde(rename = "perDay")]
    pub per_day: Vec<DayRow>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ChapterRow {
    pub book: i32,
    pub chapter: i32,
    #[serde(rename = "timeSpentMs")]
    pub time_spent_ms: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DayRow {
    pub date: NaiveDate,
    #[serde(rename = "chaptersRead")]
    pub chapters_read: Vec<BookChapterRow>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BookChapterRow {
    pub book: i32,
    pub chapter: i32,
}
