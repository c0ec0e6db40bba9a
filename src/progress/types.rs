//! Reading progress aggregate

use chrono::NaiveDate;

/// Accumulated reading time for one chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterProgress {
    pub book_index: i32,
    pub chapter_index: i32,
    pub time_spent_ms: i64,
}

/// Chapters read on one calendar day (local midnight boundary)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyReading {
    pub day: NaiveDate,
    pub chapters_read: Vec<(i32, i32)>,
}

/// The full reading progress record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadingProgress {
    pub per_chapter: Vec<ChapterProgress>,
    pub per_day: Vec<DailyReading>,
}
