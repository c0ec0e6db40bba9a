//! Reading progress persistence

use chrono::{Local, NaiveDate, TimeZone};
use sqlx::{Sqlite, Transaction};

use super::types::{ChapterProgress, DailyReading, ReadingProgress};
use crate::canon;
use crate::error::{Error, Result};
use crate::store::Database;

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Store for per-chapter reading time and the per-day read-chapter log
#[derive(Debug, Clone)]
pub struct ProgressRepository {
    db: Database,
}

impl ProgressRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record time spent reading one chapter. Accumulates onto any prior
    /// time for that chapter and logs the chapter as read on the local
    /// calendar day of `timestamp_ms`.
    pub async fn track(
        &self,
        book_index: i32,
        chapter_index: i32,
        time_spent_ms: i64,
        timestamp_ms: i64,
    ) -> Result<()> {
        if canon::verse_count(book_index, chapter_index).is_none() {
            tracing::warn!(book_index, chapter_index, "ignoring progress outside the canon");
            return Ok(());
        }
        let Some(moment) = Local.timestamp_millis_opt(timestamp_ms).single() else {
            tracing::warn!(timestamp_ms, "ignoring progress with unrepresentable timestamp");
            return Ok(());
        };
        let day = moment.date_naive().format(DAY_FORMAT).to_string();

        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO reading_chapters (book_index, chapter_index, time_spent_ms)
            VALUES (?, ?, ?)
            ON CONFLICT(book_index, chapter_index) DO UPDATE SET
                time_spent_ms = time_spent_ms + excluded.time_spent_ms
            "#,
        )
        .bind(book_index)
        .bind(chapter_index)
        .bind(time_spent_ms)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO reading_days (day, book_index, chapter_index)
            VALUES (?, ?, ?)
            ON CONFLICT(day, book_index, chapter_index) DO NOTHING
            "#,
        )
        .bind(&day)
        .bind(book_index)
        .bind(chapter_index)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// The full reading progress aggregate.
    pub async fn read(&self) -> Result<ReadingProgress> {
        let per_chapter: Vec<(i32, i32, i64)> = sqlx::query_as(
            r#"
            SELECT book_index, chapter_index, time_spent_ms
            FROM reading_chapters
            ORDER BY book_index ASC, chapter_index ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        let day_rows: Vec<(String, i32, i32)> = sqlx::query_as(
            r#"
            SELECT day, book_index, chapter_index
            FROM reading_days
            ORDER BY day ASC, book_index ASC, chapter_index ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        let mut per_day: Vec<DailyReading> = Vec::new();
        for (raw_day, book_index, chapter_index) in day_rows {
            let day = NaiveDate::parse_from_str(&raw_day, DAY_FORMAT)
                .map_err(|e| Error::DataCorruption(format!("reading day {raw_day}: {e}")))?;
            match per_day.last_mut() {
                Some(last) if last.day == day => last.chapters_read.push((book_index, chapter_index)),
                _ => per_day.push(DailyReading {
                    day,
                    chapters_read: vec![(book_index, chapter_index)],
                }),
            }
        }

        Ok(ReadingProgress {
            per_chapter: per_chapter
                .into_iter()
                .map(|(book_index, chapter_index, time_spent_ms)| ChapterProgress {
                    book_index,
                    chapter_index,
                    time_spent_ms,
                })
                .collect(),
            per_day,
        })
    }

    /// Replace the whole aggregate inside an open transaction (restore path).
    pub(crate) async fn replace_all(
        tx: &mut Transaction<'_, Sqlite>,
        progress: &ReadingProgress,
    ) -> Result<()> {
        sqlx::query("DELETE FROM reading_chapters")
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM reading_days")
            .execute(&mut **tx)
            .await?;

        for chapter in &progress.per_chapter {
            sqlx::query(
                r#"
                INSERT INTO reading_chapters (book_index, chapter_index, time_spent_ms)
                VALUES (?, ?, ?)
                ON CONFLICT(book_index, chapter_index) DO UPDATE SET
                    time_spent_ms = excluded.time_spent_ms
                "#,
            )
            .bind(chapter.book_index)
            .bind(chapter.chapter_index)
            .bind(chapter.time_spent_ms)
            .execute(&mut **tx)
            .await?;
        }

        for daily in &progress.per_day {
            let day = daily.day.format(DAY_FORMAT).to_string();
            for &(book_index, chapter_index) in &daily.chapters_read {
                sqlx::query(
                    r#"
                    INSERT INTO reading_days (day, book_index, chapter_index)
                    VALUES (?, ?, ?)
                    ON CONFLICT(day, book_index, chapter_index) DO NOTHING
                    "#,
                )
                .bind(&day)
                .bind(book_index)
                .bind(chapter_index)
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }
}
