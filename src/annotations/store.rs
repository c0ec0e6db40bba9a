//! Generic annotation persistence
//!
//! One repository implementation covers every annotation kind; the
//! [`AnnotationKind`] adapter supplies the table name, payload codec, and
//! event constructors. Writes are serialized by the store's transaction
//! discipline; reads see the latest committed write.

use std::marker::PhantomData;

use sqlx::{Sqlite, Transaction};
use tokio::sync::{watch, Mutex};

use super::types::{AnnotationKind, SortOrder, VerseAnnotation};
use crate::content::VerseIndex;
use crate::error::Result;
use crate::state::VerseUpdateBus;
use crate::store::Database;

/// CRUD + sort-order store for one annotation kind.
///
/// Create one instance per kind at startup; the sort-order stream is owned
/// by the instance.
pub struct AnnotationRepository<K: AnnotationKind> {
    db: Database,
    events: VerseUpdateBus,
    sort_order: watch::Sender<SortOrder>,
    sort_lock: Mutex<()>,
    _kind: PhantomData<K>,
}

pub type BookmarkRepository = AnnotationRepository<super::types::BookmarkKind>;
pub type HighlightRepository = AnnotationRepository<super::types::HighlightKind>;
pub type NoteRepository = AnnotationRepository<super::types::NoteKind>;

#[derive(sqlx::FromRow)]
struct AnnotationRow {
    book_index: i32,
    chapter_index: i32,
    verse_index: i32,
    timestamp: i64,
    payload: Option<String>,
}

impl AnnotationRow {
    fn into_value<K: AnnotationKind>(self) -> Result<K::Value> {
        K::decode(
            VerseIndex::new(self.book_index, self.chapter_index, self.verse_index),
            self.timestamp,
            self.payload.as_deref(),
        )
    }
}

impl<K: AnnotationKind> AnnotationRepository<K> {
    /// Create the repository, loading the persisted sort order.
    pub async fn new(db: Database, events: VerseUpdateBus) -> Result<Self> {
        let stored = db
            .read_metadata(K::SORT_ORDER_KEY, SortOrder::default().as_str())
            .await?;
        let (sort_order, _) = watch::channel(SortOrder::parse(&stored));
        Ok(Self {
            db,
            events,
            sort_order,
            sort_lock: Mutex::new(()),
            _kind: PhantomData,
        })
    }

    /// Read all annotations of this kind in the given display order.
    pub async fn read(&self, order: SortOrder) -> Result<Vec<K::Value>> {
        let order_clause = match order {
            SortOrder::ByDate => {
                "ORDER BY timestamp DESC, book_index ASC, chapter_index ASC, verse_index ASC"
            }
            SortOrder::ByBook => "ORDER BY book_index ASC, chapter_index ASC, verse_index ASC",
        };
        let sql = format!(
            "SELECT book_index, chapter_index, verse_index, timestamp, payload FROM {} {}",
            K::TABLE,
            order_clause
        );
        let rows = sqlx::query_as::<_, AnnotationRow>(&sql)
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(|r| r.into_value::<K>()).collect()
    }

    /// Read the annotations within one chapter, in verse order.
    pub async fn read_chapter(&self, book_index: i32, chapter_index: i32) -> Result<Vec<K::Value>> {
        let sql = format!(
            r#"
            SELECT book_index, chapter_index, verse_index, timestamp, payload
            FROM {}
            WHERE book_index = ? AND chapter_index = ?
            ORDER BY verse_index ASC
            "#,
            K::TABLE
        );
        let rows = sqlx::query_as::<_, AnnotationRow>(&sql)
            .bind(book_index)
            .bind(chapter_index)
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(|r| r.into_value::<K>()).collect()
    }

    /// Read the annotation at one verse. Returns the kind's empty sentinel
    /// when absent; test presence with
    /// [`VerseAnnotation::is_valid`].
    pub async fn read_verse(&self, verse_index: VerseIndex) -> Result<K::Value> {
        let sql = format!(
            r#"
            SELECT book_index, chapter_index, verse_index, timestamp, payload
            FROM {}
            WHERE book_index = ? AND chapter_index = ? AND verse_index = ?
            "#,
            K::TABLE
        );
        let row = sqlx::query_as::<_, AnnotationRow>(&sql)
            .bind(verse_index.book_index)
            .bind(verse_index.chapter_index)
            .bind(verse_index.verse_index)
            .fetch_optional(self.db.pool())
            .await?;
        match row {
            Some(row) => row.into_value::<K>(),
            None => Ok(K::empty(verse_index)),
        }
    }

    /// Upsert keyed by verse index: saving over an annotated verse
    /// overwrites the timestamp and payload, never duplicates.
    pub async fn save(&self, value: K::Value) -> Result<()> {
        let payload = K::encode_payload(&value)?;
        let verse_index = value.verse_index();
        let sql = format!(
            r#"
            INSERT INTO {} (book_index, chapter_index, verse_index, timestamp, payload)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(book_index, chapter_index, verse_index) DO UPDATE SET
                timestamp = excluded.timestamp,
                payload = excluded.payload
            "#,
            K::TABLE
        );
        sqlx::query(&sql)
            .bind(verse_index.book_index)
            .bind(verse_index.chapter_index)
            .bind(verse_index.verse_index)
            .bind(value.timestamp())
            .bind(&payload)
            .execute(self.db.pool())
            .await?;
        self.events.publish(K::saved_update(&value));
        Ok(())
    }

    /// Remove the annotation at one verse; no-op when absent.
    pub async fn remove(&self, verse_index: VerseIndex) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE book_index = ? AND chapter_index = ? AND verse_index = ?",
            K::TABLE
        );
        let result = sqlx::query(&sql)
            .bind(verse_index.book_index)
            .bind(verse_index.chapter_index)
            .bind(verse_index.verse_index)
            .execute(self.db.pool())
            .await?;
        if result.rows_affected() > 0 {
            self.events.publish(K::removed_update(verse_index));
        }
        Ok(())
    }

    /// Stream of this kind's display sort order.
    pub fn sort_order(&self) -> watch::Receiver<SortOrder> {
        self.sort_order.subscribe()
    }

    pub fn sort_order_value(&self) -> SortOrder {
        *self.sort_order.borrow()
    }

    /// Persist then publish a new sort order for this kind.
    pub async fn save_sort_order(&self, order: SortOrder) -> Result<()> {
        let _guard = self.sort_lock.lock().await;
        self.db
            .save_metadata(K::SORT_ORDER_KEY, order.as_str())
            .await?;
        self.sort_order.send_replace(order);
        Ok(())
    }

    /// All annotations in canonical order, for the backup codec.
    pub(crate) async fn fetch_all(db: &Database) -> Result<Vec<K::Value>> {
        let sql = format!(
            "SELECT book_index, chapter_index, verse_index, timestamp, payload FROM {} \
             ORDER BY book_index ASC, chapter_index ASC, verse_index ASC",
            K::TABLE
        );
        let rows = sqlx::query_as::<_, AnnotationRow>(&sql)
            .fetch_all(db.pool())
            .await?;
        rows.into_iter().map(|r| r.into_value::<K>()).collect()
    }

    /// Replace every row of this kind inside an open transaction.
    pub(crate) async fn replace_all(
        tx: &mut Transaction<'_, Sqlite>,
        values: &[K::Value],
    ) -> Result<()> {
        sqlx::query(&format!("DELETE FROM {}", K::TABLE))
            .execute(&mut **tx)
            .await?;
        let sql = format!(
            r#"
            INSERT INTO {} (book_index, chapter_index, verse_index, timestamp, payload)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(book_index, chapter_index, verse_index) DO UPDATE SET
                timestamp = excluded.timestamp,
                payload = excluded.payload
            "#,
            K::TABLE
        );
        for value in values {
            let payload = K::encode_payload(value)?;
            let verse_index = value.verse_index();
            sqlx::query(&sql)
                .bind(verse_index.book_index)
                .bind(verse_index.chapter_index)
                .bind(verse_index.verse_index)
                .bind(value.timestamp())
                .bind(&payload)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{Bookmark, Highlight, HighlightColor, Note};
    use crate::state::VerseUpdate;

    async fn setup() -> (Database, VerseUpdateBus) {
        let db = Database::connect_in_memory().await.unwrap();
        (db, VerseUpdateBus::new())
    }

    #[tokio::test]
    async fn test_save_read_roundtrip_per_kind() {
        let (db, bus) = setup().await;
        let verse = VerseIndex::new(1, 2, 3);

        let bookmarks = BookmarkRepository::new(db.clone(), bus.clone()).await.unwrap();
        let bookmark = Bookmark {
            verse_index: verse,
            timestamp: 100,
        };
        bookmarks.save(bookmark.clone()).await.unwrap();
        assert_eq!(bookmarks.read_verse(verse).await.unwrap(), bookmark);

        let highlights = HighlightRepository::new(db.clone(), bus.clone()).await.unwrap();
        let highlight = Highlight {
            verse_index: verse,
            color: HighlightColor::Green,
            timestamp: 200,
        };
        highlights.save(highlight.clone()).await.unwrap();
        assert_eq!(highlights.read_verse(verse).await.unwrap(), highlight);

        let notes = NoteRepository::new(db.clone(), bus).await.unwrap();
        let note = Note {
            verse_index: verse,
            text: "looked this up".to_string(),
            timestamp: 300,
        };
        notes.save(note.clone()).await.unwrap();
        assert_eq!(notes.read_verse(verse).await.unwrap(), note);
    }

    #[tokio::test]
    async fn test_save_overwrites_instead_of_duplicating() {
        let (db, bus) = setup().await;
        let repo = NoteRepository::new(db, bus).await.unwrap();
        let verse = VerseIndex::new(0, 1, 5);

        repo.save(Note {
            verse_index: verse,
            text: "first".to_string(),
            timestamp: 1,
        })
        .await
        .unwrap();
        repo.save(Note {
            verse_index: verse,
            text: "second".to_string(),
            timestamp: 2,
        })
        .await
        .unwrap();

        let in_chapter = repo.read_chapter(0, 1).await.unwrap();
        assert_eq!(in_chapter.len(), 1);
        assert_eq!(in_chapter[0].text, "second");
        assert_eq!(in_chapter[0].timestamp, 2);
    }

    #[tokio::test]
    async fn test_read_absent_returns_empty_sentinel() {
        let (db, bus) = setup().await;
        let repo = BookmarkRepository::new(db, bus).await.unwrap();
        let verse = VerseIndex::new(1, 2, 3);

        let absent = repo.read_verse(verse).await.unwrap();
        assert!(!absent.is_valid());
        assert_eq!(absent.verse_index, verse);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (db, bus) = setup().await;
        let repo = BookmarkRepository::new(db, bus).await.unwrap();
        let verse = VerseIndex::new(1, 2, 3);

        repo.save(Bookmark::new(verse)).await.unwrap();
        repo.remove(verse).await.unwrap();
        assert!(!repo.read_verse(verse).await.unwrap().is_valid());
        // removing again is a no-op, not an error
        repo.remove(verse).await.unwrap();
    }

    #[tokio::test]
    async fn test_sort_orders_are_total() {
        let (db, bus) = setup().await;
        let repo = BookmarkRepository::new(db, bus).await.unwrap();

        let entries = [
            (VerseIndex::new(2, 0, 0), 50),
            (VerseIndex::new(0, 3, 1), 50),
            (VerseIndex::new(1, 1, 1), 90),
            (VerseIndex::new(0, 0, 0), 10),
        ];
        for (verse_index, timestamp) in entries {
            repo.save(Bookmark {
                verse_index,
                timestamp,
            })
            .await
            .unwrap();
        }

        let by_book = repo.read(SortOrder::ByBook).await.unwrap();
        let book_order: Vec<_> = by_book.iter().map(|b| b.verse_index).collect();
        assert_eq!(
            book_order,
            vec![
                VerseIndex::new(0, 0, 0),
                VerseIndex::new(0, 3, 1),
                VerseIndex::new(1, 1, 1),
                VerseIndex::new(2, 0, 0),
            ]
        );

        let by_date = repo.read(SortOrder::ByDate).await.unwrap();
        let date_order: Vec<_> = by_date.iter().map(|b| (b.timestamp, b.verse_index)).collect();
        assert_eq!(
            date_order,
            vec![
                (90, VerseIndex::new(1, 1, 1)),
                // equal timestamps tie-break by ascending verse index
                (50, VerseIndex::new(0, 3, 1)),
                (50, VerseIndex::new(2, 0, 0)),
                (10, VerseIndex::new(0, 0, 0)),
            ]
        );
    }

    #[tokio::test]
    async fn test_sort_order_persists_across_instances() {
        let (db, bus) = setup().await;
        {
            let repo = NoteRepository::new(db.clone(), bus.clone()).await.unwrap();
            assert_eq!(repo.sort_order_value(), SortOrder::ByDate);
            repo.save_sort_order(SortOrder::ByBook).await.unwrap();
        }
        let repo = NoteRepository::new(db, bus).await.unwrap();
        assert_eq!(repo.sort_order_value(), SortOrder::ByBook);
    }

    #[tokio::test]
    async fn test_save_and_remove_publish_events() {
        let (db, bus) = setup().await;
        let repo = HighlightRepository::new(db, bus.clone()).await.unwrap();
        let mut updates = bus.subscribe();
        let verse = VerseIndex::new(4, 0, 7);

        repo.save(Highlight::new(verse, HighlightColor::Red)).await.unwrap();
        assert_eq!(
            updates.recv().await.unwrap(),
            VerseUpdate::HighlightUpdated(verse, Some(HighlightColor::Red))
        );

        repo.remove(verse).await.unwrap();
        assert_eq!(
            updates.recv().await.unwrap(),
            VerseUpdate::HighlightUpdated(verse, None)
        );
    }
}
