//! Table definitions and additive schema upgrades
//!
//! One logical table per entity. Upgrades never drop or rewrite existing
//! tables; each schema version only adds tables, keyed by the integer
//! version stored in `metadata`.

use sqlx::{Sqlite, Transaction};

use crate::error::Result;

/// Current schema version written by [`super::Database::init`]
pub const SCHEMA_VERSION: i64 = 3;

/// Tables present since the first release
const V1_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS translations (
        short_name TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        language TEXT NOT NULL,
        size INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS book_names (
        translation_short_name TEXT NOT NULL,
        book_index INTEGER NOT NULL,
        name TEXT NOT NULL,
        short_name TEXT NOT NULL,
        PRIMARY KEY (translation_short_name, book_index)
    );

    CREATE TABLE IF NOT EXISTS chapters (
        translation_short_name TEXT NOT NULL,
        book_index INTEGER NOT NULL,
        chapter_index INTEGER NOT NULL,
        verses TEXT NOT NULL,
        PRIMARY KEY (translation_short_name, book_index, chapter_index)
    );

    CREATE TABLE IF NOT EXISTS bookmarks (
        book_index INTEGER NOT NULL,
        chapter_index INTEGER NOT NULL,
        verse_index INTEGER NOT NULL,
        timestamp INTEGER NOT NULL,
        payload TEXT,
        PRIMARY KEY (book_index, chapter_index, verse_index)
    );
    CREATE INDEX IF NOT EXISTS idx_bookmarks_timestamp ON bookmarks(timestamp);

    CREATE TABLE IF NOT EXISTS notes (
        book_index INTEGER NOT NULL,
        chapter_index INTEGER NOT NULL,
        verse_index INTEGER NOT NULL,
        timestamp INTEGER NOT NULL,
        payload TEXT,
        PRIMARY KEY (book_index, chapter_index, verse_index)
    );
    CREATE INDEX IF NOT EXISTS idx_notes_timestamp ON notes(timestamp);

    CREATE TABLE IF NOT EXISTS reading_chapters (
        book_index INTEGER NOT NULL,
        chapter_index INTEGER NOT NULL,
        time_spent_ms INTEGER NOT NULL,
        PRIMARY KEY (book_index, chapter_index)
    );
"#;

/// Added in version 2
const V2_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS highlights (
        book_index INTEGER NOT NULL,
        chapter_index INTEGER NOT NULL,
        verse_index INTEGER NOT NULL,
        timestamp INTEGER NOT NULL,
        payload TEXT,
        PRIMARY KEY (book_index, chapter_index, verse_index)
    );
    CREATE INDEX IF NOT EXISTS idx_highlights_timestamp ON highlights(timestamp);
"#;

/// Added in version 3
const V3_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS reading_days (
        day TEXT NOT NULL,
        book_index INTEGER NOT NULL,
        chapter_index INTEGER NOT NULL,
        PRIMARY KEY (day, book_index, chapter_index)
    );
"#;

/// Every user-data table, in wipe order
pub(crate) const ALL_TABLES: [&str; 8] = [
    "translations",
    "book_names",
    "chapters",
    "bookmarks",
    "highlights",
    "notes",
    "reading_chapters",
    "reading_days",
];

/// Apply all table creations newer than `from_version`.
pub(crate) async fn upgrade(tx: &mut Transaction<'_, Sqlite>, from_version: i64) -> Result<()> {
    if from_version < 1 {
        sqlx::query(V1_TABLES).execute(&mut **tx).await?;
    }
    if from_version < 2 {
        sqlx::query(V2_TABLES).execute(&mut **tx).await?;
    }
    if from_version < 3 {
        sqlx::query(V3_TABLES).execute(&mut **tx).await?;
    }
    Ok(())
}
