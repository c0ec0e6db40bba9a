//! Backup and restore
//!
//! Backup serializes every annotation kind plus the reading progress
//! aggregate under one version tag. Restore is all-or-nothing: the snapshot
//! is parsed and validated in full, then the restored categories are
//! replaced inside a single transaction. Translations and reading state are
//! never touched.

use super::types::{
    BookChapterRow, BookmarkRow, ChapterRow, DayRow, HighlightRow, NoteRow, ProgressSnapshot,
    Snapshot, SNAPSHOT_VERSION,
};
use crate::annotations::{
    AnnotationRepository, Bookmark, BookmarkKind, Highlight, HighlightKind, Note, NoteKind,
};
use crate::content::VerseIndex;
use crate::error::{Error, Result};
use crate::progress::{ChapterProgress, DailyReading, ProgressRepository, ReadingProgress};
use crate::store::Database;

#[derive(serde::Deserialize)]
struct VersionProbe {
    version: i64,
}

/// Converts the union of all user data to and from snapshot bytes
#[derive(Debug, Clone)]
pub struct BackupManager {
    db: Database,
}

impl BackupManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Serialize all bookmarks, highlights, notes, and reading progress.
    pub async fn backup(&self) -> Result<Vec<u8>> {
        let bookmarks = AnnotationRepository::<BookmarkKind>::fetch_all(&self.db).await?;
        let highlights = AnnotationRepository::<HighlightKind>::fetch_all(&self.db).await?;
        let notes = AnnotationRepository::<NoteKind>::fetch_all(&self.db).await?;
        let progress = ProgressRepository::new(self.db.clone()).read().await?;

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            bookmarks: bookmarks
                .into_iter()
                .map(|b| BookmarkRow {
                    book: b.verse_index.book_index,
                    chapter: b.verse_index.chapter_index,
                    verse: b.verse_index.verse_index,
                    timestamp: b.timestamp,
                })
                .collect(),
            highlights: highlights
                .into_iter()
                .map(|h| HighlightRow {
                    book: h.verse_index.book_index,
                    chapter: h.verse_index.chapter_index,
                    verse: h.verse_index.verse_index,
                    timestamp: h.timestamp,
                    color: h.color,
                })
                .collect(),
            notes: notes
                .into_iter()
                .map(|n| NoteRow {
                    book: n.verse_index.book_index,
                    chapter: n.verse_index.chapter_index,
                    verse: n.verse_index.verse_index,
                    timestamp: n.timestamp,
                    text: n.text,
                })
                .collect(),
            reading_progress: ProgressSnapshot {
                per_chapter: progress
                    .per_chapter
                    .into_iter()
                    .map(|c| ChapterRow {
                        book: c.book_index,
                        chapter: c.chapter_index,
                        time_spent_ms: c.time_spent_ms,
                    })
                    .collect(),
                per_day: progress
                    .per_day
                    .into_iter()
                    .map(|d| DayRow {
                        date: d.day,
                        chapters_read: d
                            .chapters_read
                            .into_iter()
                            .map(|(book, chapter)| BookChapterRow { book, chapter })
                            .collect(),
                    })
                    .collect(),
            },
        };

        serde_json::to_vec_pretty(&snapshot).map_err(|e| Error::Format(format!("snapshot: {e}")))
    }

    /// Validate and apply a snapshot, replacing the restored categories.
    /// Nothing is written when the snapshot is invalid or from a newer
    /// engine.
    pub async fn restore(&self, bytes: &[u8]) -> Result<()> {
        let probe: VersionProbe = serde_json::from_slice(bytes)
            .map_err(|e| Error::Format(format!("snapshot: {e}")))?;
        if probe.version > SNAPSHOT_VERSION {
            return Err(Error::UnsupportedVersion(probe.version));
        }

        let snapshot: Snapshot = serde_json::from_slice(bytes)
            .map_err(|e| Error::Format(format!("snapshot: {e}")))?;

        let bookmarks: Vec<Bookmark> = snapshot
            .bookmarks
            .into_iter()
            .map(|row| {
                Ok(Bookmark {
                    verse_index: restored_verse_index(row.book, row.chapter, row.verse)?,
                    timestamp: row.timestamp,
                })
            })
            .collect::<Result<_>>()?;
        let highlights: Vec<Highlight> = snapshot
            .highlights
            .into_iter()
            .map(|row| {
                Ok(Highlight {
                    verse_index: restored_verse_index(row.book, row.chapter, row.verse)?,
                    color: row.color,
                    timestamp: row.timestamp,
                })
            })
            .collect::<Result<_>>()?;
        let notes: Vec<Note> = snapshot
            .notes
            .into_iter()
            .map(|row| {
                Ok(Note {
                    verse_index: restored_verse_index(row.book, row.chapter, row.verse)?,
                    text: row.text,
                    timestamp: row.timestamp,
                })
            })
            .collect::<Result<_>>()?;
        let progress = ReadingProgress {
            per_chapter: snapshot
                .reading_progress
                .per_chapter
                .into_iter()
                .map(|row| ChapterProgress {
                    book_index: row.book,
                    chapter_index: row.chapter,
                    time_spent_ms: row.time_spent_ms,
                })
                .collect(),
            per_day: snapshot
                .reading_progress
                .per_day
                .into_iter()
                .map(|row| DailyReading {
                    day: row.date,
                    chapters_read: row
                        .chapters_read
                        .into_iter()
                        .map(|c| (c.book, c.chapter))
                        .collect(),
                })
                .collect(),
        };

        let mut tx = self.db.begin().await?;
        AnnotationRepository::<BookmarkKind>::replace_all(&mut tx, &bookmarks).await?;
        AnnotationRepository::<HighlightKind>::replace_all(&mut tx, &highlights).await?;
        AnnotationRepository::<NoteKind>::replace_all(&mut tx, &notes).await?;
        ProgressRepository::replace_all(&mut tx, &progress).await?;
        tx.commit().await?;

        tracing::info!(
            bookmarks = bookmarks.len(),
            highlights = highlights.len(),
            notes = notes.len(),
            "restored snapshot"
        );
        Ok(())
    }
}

fn restored_verse_index(book: i32, chapter: i32, verse: i32) -> Result<VerseIndex> {
    let verse_index = VerseIndex::new(book, chapter, verse);
    if verse_index.is_valid() {
        Ok(verse_index)
    } else {
        Err(Error::Format(format!(
            "snapshot: invalid verse reference {book}:{chapter}:{verse}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{
        BookmarkRepository, HighlightColor, HighlightRepository, NoteRepository, SortOrder,
        VerseAnnotation,
    };
    use crate::state::VerseUpdateBus;

    async fn seeded_db() -> Database {
        let db = Database::connect_in_memory().await.unwrap();
        let bus = VerseUpdateBus::new();

        let bookmarks = BookmarkRepository::new(db.clone(), bus.clone()).await.unwrap();
        bookmarks
            .save(Bookmark {
                verse_index: VerseIndex::new(1, 2, 3),
                timestamp: 11,
            })
            .await
            .unwrap();
        bookmarks
            .save(Bookmark {
                verse_index: VerseIndex::new(4, 5, 6),
                timestamp: 22,
            })
            .await
            .unwrap();

        let highlights = HighlightRepository::new(db.clone(), bus.clone()).await.unwrap();
        highlights
            .save(Highlight {
                verse_index: VerseIndex::new(7, 8, 9),
                color: HighlightColor::Blue,
                timestamp: 33,
            })
            .await
            .unwrap();

        let notes = NoteRepository::new(db.clone(), bus).await.unwrap();
        notes
            .save(Note {
                verse_index: VerseIndex::new(0, 0, 0),
                text: "in the beginning".to_string(),
                timestamp: 44,
            })
            .await
            .unwrap();

        let progress = ProgressRepository::new(db.clone());
        progress.track(0, 0, 5_000, 1_600_000_000_000).await.unwrap();
        progress.track(1, 3, 7_000, 1_600_000_000_000).await.unwrap();

        db
    }

    #[tokio::test]
    async fn test_backup_restore_roundtrip() {
        let db = seeded_db().await;
        let bytes = BackupManager::new(db.clone()).backup().await.unwrap();

        let fresh = Database::connect_in_memory().await.unwrap();
        BackupManager::new(fresh.clone()).restore(&bytes).await.unwrap();

        let bus = VerseUpdateBus::new();
        let bookmarks = BookmarkRepository::new(fresh.clone(), bus.clone()).await.unwrap();
        let restored = bookmarks.read(SortOrder::ByBook).await.unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0].verse_index, VerseIndex::new(1, 2, 3));
        assert_eq!(restored[0].timestamp, 11);

        let highlights = HighlightRepository::new(fresh.clone(), bus.clone()).await.unwrap();
        let restored = highlights.read(SortOrder::ByBook).await.unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].color, HighlightColor::Blue);

        let notes = NoteRepository::new(fresh.clone(), bus).await.unwrap();
        let restored = notes.read(SortOrder::ByBook).await.unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].text, "in the beginning");

        let progress = ProgressRepository::new(fresh).read().await.unwrap();
        let original = ProgressRepository::new(db).read().await.unwrap();
        assert_eq!(progress, original);
    }

    #[tokio::test]
    async fn test_snapshot_field_shape() {
        let db = seeded_db().await;
        let bytes = BackupManager::new(db).backup().await.unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("\"version\": 1"));
        assert!(text.contains("\"readingProgress\""));
        assert!(text.contains("\"perChapter\""));
        assert!(text.contains("\"perDay\""));
        assert!(text.contains("\"chaptersRead\""));
        assert!(text.contains("\"timeSpentMs\""));
        assert!(text.contains("\"blue\""));
    }

    #[tokio::test]
    async fn test_newer_version_rejected_without_mutation() {
        let db = seeded_db().await;
        let manager = BackupManager::new(db.clone());

        let newer = serde_json::json!({
            "version": 2,
            "bookmarks": [],
            "highlights": [],
            "notes": [],
            "readingProgress": {"perChapter": [], "perDay": []},
        });
        let err = manager.restore(newer.to_string().as_bytes()).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(2)));

        let bookmarks = AnnotationRepository::<BookmarkKind>::fetch_all(&db).await.unwrap();
        assert_eq!(bookmarks.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_snapshot_rejected_without_mutation() {
        let db = seeded_db().await;
        let manager = BackupManager::new(db.clone());

        assert!(matches!(
            manager.restore(b"not json").await.unwrap_err(),
            Error::Format(_)
        ));

        let negative = serde_json::json!({
            "version": 1,
            "bookmarks": [{"book": -1, "chapter": 0, "verse": 0, "timestamp": 1}],
            "highlights": [],
            "notes": [],
            "readingProgress": {"perChapter": [], "perDay": []},
        });
        assert!(matches!(
            manager.restore(negative.to_string().as_bytes()).await.unwrap_err(),
            Error::Format(_)
        ));

        let bookmarks = AnnotationRepository::<BookmarkKind>::fetch_all(&db).await.unwrap();
        assert_eq!(bookmarks.len(), 2);
    }

    #[tokio::test]
    async fn test_restore_overwrites_but_spares_translations() {
        let db = seeded_db().await;
        sqlx::query("INSERT INTO translations (short_name, name, language, size) VALUES ('KJV', 'King James Version', 'en_gb', 1)")
            .execute(db.pool())
            .await
            .unwrap();
        let manager = BackupManager::new(db.clone());

        let empty = serde_json::json!({
            "version": 1,
            "bookmarks": [],
            "highlights": [],
            "notes": [],
            "readingProgress": {"perChapter": [], "perDay": []},
        });
        manager.restore(empty.to_string().as_bytes()).await.unwrap();

        // the restored categories were replaced wholesale
        let bookmarks = AnnotationRepository::<BookmarkKind>::fetch_all(&db).await.unwrap();
        assert!(bookmarks.is_empty());
        let bus = VerseUpdateBus::new();
        let notes = NoteRepository::new(db.clone(), bus).await.unwrap();
        assert!(!notes.read_verse(VerseIndex::new(0, 0, 0)).await.unwrap().is_valid());

        // translations are not part of the snapshot and survive
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM translations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
