//! Translation and verse text persistence
//!
//! Verse text is stored per (translation, book, chapter) as an ordered JSON
//! array of strings; a [`Verse`] is assembled on read and never stored as
//! one row. Install and uninstall are atomic multi-table writes.

use std::collections::{BTreeMap, HashMap};

use futures::future::try_join_all;

use super::types::{TranslationInfo, Verse, VerseIndex, VerseText};
use crate::canon;
use crate::error::{Error, Result};
use crate::state::ReadingStateCache;
use crate::store::Database;

/// Whether a translation with the given short name is installed.
pub(crate) async fn translation_installed(db: &Database, short_name: &str) -> Result<bool> {
    let (found,): (i64,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM translations WHERE short_name = ?)")
            .bind(short_name)
            .fetch_one(db.pool())
            .await?;
    Ok(found != 0)
}

/// Query and install/uninstall surface over scripture content.
#[derive(Debug, Clone)]
pub struct ContentRepository {
    db: Database,
    state: ReadingStateCache,
}

impl ContentRepository {
    pub fn new(db: Database, state: ReadingStateCache) -> Self {
        Self { db, state }
    }

    /// All fully installed translations.
    pub async fn list_installed(&self) -> Result<Vec<TranslationInfo>> {
        let translations = sqlx::query_as::<_, TranslationInfo>(
            r#"
            SELECT short_name, name, language, size
            FROM translations
            ORDER BY language ASC, name ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(translations)
    }

    /// Live current-translation value; see [`ReadingStateCache`] for the
    /// stream form.
    pub fn current_translation(&self) -> String {
        self.state.current_translation_value()
    }

    /// Select the current translation. Persisted before the state stream
    /// publishes the new value.
    pub async fn save_current_translation(&self, short_name: &str) -> Result<()> {
        self.state.save_current_translation(short_name).await
    }

    /// The 66 book names of one translation, in canonical book order.
    pub async fn read_book_names(&self, short_name: &str) -> Result<Vec<String>> {
        self.read_book_name_column(short_name, "name").await
    }

    /// The 66 abbreviated book names of one translation.
    pub async fn read_book_short_names(&self, short_name: &str) -> Result<Vec<String>> {
        self.read_book_name_column(short_name, "short_name").await
    }

    async fn read_book_name_column(&self, short_name: &str, column: &str) -> Result<Vec<String>> {
        self.require_installed(short_name).await?;
        let sql = format!(
            "SELECT {column} FROM book_names WHERE translation_short_name = ? ORDER BY book_index ASC"
        );
        let rows: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(short_name)
            .fetch_all(self.db.pool())
            .await?;
        if rows.len() != canon::BOOK_COUNT {
            return Err(Error::DataCorruption(format!(
                "{short_name}: {} book name rows, expected {}",
                rows.len(),
                canon::BOOK_COUNT
            )));
        }
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// All verses of one chapter in the given translation.
    pub async fn read_verses(
        &self,
        short_name: &str,
        book_index: i32,
        chapter_index: i32,
    ) -> Result<Vec<Verse>> {
        self.require_installed(short_name).await?;
        let expected = canon::verse_count(book_index, chapter_index).ok_or_else(|| {
            Error::NotFound(format!("no chapter at book {book_index} chapter {chapter_index}"))
        })?;

        let (book_name, texts) = self
            .read_chapter_texts(short_name, book_index, chapter_index)
            .await?
            .ok_or_else(|| {
                Error::DataCorruption(format!(
                    "{short_name}: missing chapter {book_index}:{chapter_index}"
                ))
            })?;
        if texts.len() != expected {
            return Err(Error::DataCorruption(format!(
                "{short_name} {book_index}:{chapter_index}: {} verses stored, expected {expected}",
                texts.len()
            )));
        }

        Ok(texts
            .into_iter()
            .enumerate()
            .map(|(verse, text)| Verse {
                verse_index: VerseIndex::new(book_index, chapter_index, verse as i32),
                text: VerseText {
                    translation_short_name: short_name.to_string(),
                    book_name: book_name.clone(),
                    text,
                },
                parallel: Vec::new(),
            })
            .collect())
    }

    /// All verses of one chapter, zipping in parallel translations by verse
    /// position. A parallel translation missing the chapter contributes no
    /// text; that is not an error.
    pub async fn read_verses_with_parallel(
        &self,
        short_name: &str,
        parallel_short_names: &[String],
        book_index: i32,
        chapter_index: i32,
    ) -> Result<Vec<Verse>> {
        let mut verses = self.read_verses(short_name, book_index, chapter_index).await?;

        let fetches = parallel_short_names.iter().map(|parallel| async move {
            let texts = self
                .read_chapter_texts(parallel, book_index, chapter_index)
                .await?;
            Ok::<_, Error>(texts.map(|(book_name, texts)| (parallel.clone(), book_name, texts)))
        });
        let chapters: Vec<_> = try_join_all(fetches).await?.into_iter().flatten().collect();

        for (parallel, book_name, texts) in chapters {
            for (position, text) in texts.into_iter().enumerate() {
                if let Some(verse) = verses.get_mut(position) {
                    verse.parallel.push(VerseText {
                        translation_short_name: parallel.clone(),
                        book_name: book_name.clone(),
                        text,
                    });
                }
            }
        }
        Ok(verses)
    }

    /// Batch point lookup across chapters. Indices that cannot be resolved
    /// (outside the canon, or referencing text this translation does not
    /// have) are omitted from the result.
    pub async fn read_verses_at(
        &self,
        short_name: &str,
        verse_indexes: &[VerseIndex],
    ) -> Result<HashMap<VerseIndex, Verse>> {
        self.require_installed(short_name).await?;

        let mut by_chapter: BTreeMap<(i32, i32), Vec<i32>> = BTreeMap::new();
        for &verse_index in verse_indexes {
            if canon::contains(verse_index) {
                by_chapter
                    .entry((verse_index.book_index, verse_index.chapter_index))
                    .or_default()
                    .push(verse_index.verse_index);
            }
        }

        let mut result = HashMap::new();
        for ((book_index, chapter_index), positions) in by_chapter {
            let Some((book_name, texts)) = self
                .read_chapter_texts(short_name, book_index, chapter_index)
                .await?
            else {
                continue;
            };
            for verse in positions {
                let Some(text) = texts.get(verse as usize) else {
                    continue;
                };
                let verse_index = VerseIndex::new(book_index, chapter_index, verse);
                result.insert(
                    verse_index,
                    Verse {
                        verse_index,
                        text: VerseText {
                            translation_short_name: short_name.to_string(),
                            book_name: book_name.clone(),
                            text: text.clone(),
                        },
                        parallel: Vec::new(),
                    },
                );
            }
        }
        Ok(result)
    }

    /// Case-insensitive substring search over all stored verse text of one
    /// translation, in canonical order.
    pub async fn search(&self, short_name: &str, query: &str) -> Result<Vec<Verse>> {
        self.require_installed(short_name).await?;
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let book_names = self.read_book_names(short_name).await?;
        let rows: Vec<(i32, i32, String)> = sqlx::query_as(
            r#"
            SELECT book_index, chapter_index, verses
            FROM chapters
            WHERE translation_short_name = ?
            ORDER BY book_index ASC, chapter_index ASC
            "#,
        )
        .bind(short_name)
        .fetch_all(self.db.pool())
        .await?;

        let mut matches = Vec::new();
        for (book_index, chapter_index, raw) in rows {
            let texts = decode_verses(short_name, book_index, chapter_index, &raw)?;
            for (verse, text) in texts.into_iter().enumerate() {
                if text.to_lowercase().contains(&needle) {
                    matches.push(Verse {
                        verse_index: VerseIndex::new(book_index, chapter_index, verse as i32),
                        text: VerseText {
                            translation_short_name: short_name.to_string(),
                            book_name: book_names
                                .get(book_index as usize)
                                .cloned()
                                .unwrap_or_default(),
                            text,
                        },
                        parallel: Vec::new(),
                    });
                }
            }
        }
        Ok(matches)
    }

    /// Atomically write a complete translation: info row, 66 book name
    /// rows, and every chapter. Either all of it becomes visible or none.
    pub async fn save_translation(
        &self,
        info: &TranslationInfo,
        book_names: &[String],
        book_short_names: &[String],
        chapters: &BTreeMap<(i32, i32), Vec<String>>,
    ) -> Result<()> {
        write_translation(&self.db, info, book_names, book_short_names, chapters).await
    }

    /// Atomically delete a translation and its dependent rows, then repair
    /// application state: a removed current translation falls back to any
    /// remaining one, and the parallel set is pruned. Annotations are keyed
    /// by verse location only and survive.
    pub async fn remove_translation(&self, info: &TranslationInfo) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for table in ["chapters", "book_names", "translations"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE {} = ?", key_column(table)))
                .bind(&info.short_name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        tracing::info!(translation = %info.short_name, "removed translation");

        self.state
            .remove_parallel_translation(&info.short_name)
            .await?;
        if self.state.current_translation_value() == info.short_name {
            let fallback = self
                .list_installed()
                .await?
                .first()
                .map(|t| t.short_name.clone())
                .unwrap_or_default();
            self.state.save_current_translation(&fallback).await?;
        }
        Ok(())
    }

    async fn require_installed(&self, short_name: &str) -> Result<()> {
        if translation_installed(&self.db, short_name).await? {
            Ok(())
        } else {
            Err(Error::NotFound(format!("translation {short_name}")))
        }
    }

    /// Book name and decoded verse list of one chapter, or `None` when the
    /// chapter (or the whole translation) is absent.
    async fn read_chapter_texts(
        &self,
        short_name: &str,
        book_index: i32,
        chapter_index: i32,
    ) -> Result<Option<(String, Vec<String>)>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT verses FROM chapters
            WHERE translation_short_name = ? AND book_index = ? AND chapter_index = ?
            "#,
        )
        .bind(short_name)
        .bind(book_index)
        .bind(chapter_index)
        .fetch_optional(self.db.pool())
        .await?;
        let Some((raw,)) = row else {
            return Ok(None);
        };

        let book_name: Option<(String,)> = sqlx::query_as(
            "SELECT name FROM book_names WHERE translation_short_name = ? AND book_index = ?",
        )
        .bind(short_name)
        .bind(book_index)
        .fetch_optional(self.db.pool())
        .await?;
        let book_name = book_name
            .map(|(name,)| name)
            .ok_or_else(|| {
                Error::DataCorruption(format!("{short_name}: missing book name {book_index}"))
            })?;

        let texts = decode_verses(short_name, book_index, chapter_index, &raw)?;
        Ok(Some((book_name, texts)))
    }
}

/// Commit a complete translation in one transaction. Shared by
/// [`ContentRepository::save_translation`] and the installer.
pub(crate) async fn write_translation(
    db: &Database,
    info: &TranslationInfo,
    book_names: &[String],
    book_short_names: &[String],
    chapters: &BTreeMap<(i32, i32), Vec<String>>,
) -> Result<()> {
    let mut tx = db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO translations (short_name, name, language, size)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(short_name) DO UPDATE SET
            name = excluded.name,
            language = excluded.language,
            size = excluded.size
        "#,
    )
    .bind(&info.short_name)
    .bind(&info.name)
    .bind(&info.language)
    .bind(info.size)
    .execute(&mut *tx)
    .await?;

    for (book_index, (name, short)) in book_names.iter().zip(book_short_names).enumerate() {
        sqlx::query(
            r#"
            INSERT INTO book_names (translation_short_name, book_index, name, short_name)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(translation_short_name, book_index) DO UPDATE SET
                name = excluded.name,
                short_name = excluded.short_name
            "#,
        )
        .bind(&info.short_name)
        .bind(book_index as i32)
        .bind(name)
        .bind(short)
        .execute(&mut *tx)
        .await?;
    }

    for (&(book_index, chapter_index), verses) in chapters {
        let encoded = serde_json::to_string(verses)
            .map_err(|e| Error::Format(format!("chapter text: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO chapters (translation_short_name, book_index, chapter_index, verses)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(translation_short_name, book_index, chapter_index) DO UPDATE SET
                verses = excluded.verses
            "#,
        )
        .bind(&info.short_name)
        .bind(book_index)
        .bind(chapter_index)
        .bind(&encoded)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

fn decode_verses(
    short_name: &str,
    book_index: i32,
    chapter_index: i32,
    raw: &str,
) -> Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| {
        Error::DataCorruption(format!(
            "{short_name} {book_index}:{chapter_index}: undecodable verse list: {e}"
        ))
    })
}

fn key_column(table: &str) -> &'static str {
    match table {
        "translations" => "short_name",
        _ => "translation_short_name",
    }
}
