//! Translation installation
//!
//! Drives one install attempt through its stages: catalog fetch, per-chapter
//! download and validation, and a single atomic commit. Nothing is written
//! until every chapter has been fetched and validated, so a failed or
//! cancelled install leaves the store exactly as it was.

use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::parser;
use super::remote::{books_resource, chapter_resource, RemoteSource, CATALOG_RESOURCE};
use crate::canon;
use crate::content::{self, TranslationInfo};
use crate::error::{Error, Result};
use crate::store::Database;

const KEY_CATALOG_REFRESHED_AT: &str = "catalog_refreshed_at";

/// Stage of one install attempt.
///
/// `Failed` and `Cancelled` are absorbing: the stream ends with exactly one
/// of `Installed`, `Failed`, or `Cancelled`, and that terminal event is
/// delivered even when the attempt is aborted mid-download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    FetchingCatalog,
    CatalogReady,
    /// Percentage of all chapters downloaded, monotonically non-decreasing
    Downloading(u8),
    Parsing,
    Committing,
    Installed,
    Failed,
    Cancelled,
}

/// Orchestrates translation installs from a remote source
pub struct TranslationInstaller<S: RemoteSource> {
    source: S,
    db: Database,
}

impl<S: RemoteSource> TranslationInstaller<S> {
    pub fn new(source: S, db: Database) -> Self {
        Self { source, db }
    }

    /// Fetch and parse the remote catalog, recording the refresh time.
    pub async fn fetch_catalog(&self) -> Result<Vec<TranslationInfo>> {
        let bytes = self.source.fetch(CATALOG_RESOURCE).await?;
        let catalog = parser::parse_catalog(&bytes)?;
        self.db
            .save_metadata(
                KEY_CATALOG_REFRESHED_AT,
                &Utc::now().timestamp_millis().to_string(),
            )
            .await?;
        tracing::info!(translations = catalog.len(), "fetched translation catalog");
        Ok(catalog)
    }

    /// When the catalog was last fetched (epoch millis), zero if never.
    pub async fn catalog_refreshed_at(&self) -> Result<i64> {
        let raw = self.db.read_metadata(KEY_CATALOG_REFRESHED_AT, "0").await?;
        Ok(raw.parse().unwrap_or(0))
    }

    /// Install one translation, reporting stages through `progress`.
    ///
    /// The progress channel is the backpressure boundary: when the consumer
    /// stops pulling, the installer suspends rather than dropping events,
    /// and a dropped receiver cancels the install.
    pub async fn install(
        &self,
        info: &TranslationInfo,
        progress: &mpsc::Sender<InstallPhase>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let result = self.download_and_commit(info, progress, cancel).await;
        self.finish(info, progress, result).await
    }

    /// Full state machine for one attempt: resolve the translation from the
    /// catalog by short name, then install it.
    pub async fn install_by_name(
        &self,
        short_name: &str,
        progress: &mpsc::Sender<InstallPhase>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let result = self.resolve_and_install(short_name, progress, cancel).await;
        let terminal = terminal_phase(&result);
        let _ = progress.send(terminal).await;
        result
    }

    async fn resolve_and_install(
        &self,
        short_name: &str,
        progress: &mpsc::Sender<InstallPhase>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        emit(progress, InstallPhase::FetchingCatalog).await?;
        let catalog = self.fetch_catalog().await?;
        emit(progress, InstallPhase::CatalogReady).await?;
        let info = catalog
            .into_iter()
            .find(|t| t.short_name == short_name)
            .ok_or_else(|| Error::NotFound(format!("translation {short_name}")))?;
        self.download_and_commit(&info, progress, cancel).await
    }

    async fn finish(
        &self,
        info: &TranslationInfo,
        progress: &mpsc::Sender<InstallPhase>,
        result: Result<()>,
    ) -> Result<()> {
        match &result {
            Ok(()) => {
                tracing::info!(translation = %info.short_name, "installed translation")
            }
            Err(e) if e.is_cancelled() => {
                tracing::info!(translation = %info.short_name, "install cancelled")
            }
            Err(e) => {
                tracing::error!(translation = %info.short_name, error = %e, "install failed")
            }
        }
        // Terminal event delivery is best-effort only when the consumer is
        // already gone; a live consumer always receives it.
        let _ = progress.send(terminal_phase(&result)).await;
        result
    }

    async fn download_and_commit(
        &self,
        info: &TranslationInfo,
        progress: &mpsc::Sender<InstallPhase>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        emit(progress, InstallPhase::Downloading(0)).await?;

        let bytes = self
            .fetch_cancellable(&books_resource(&info.short_name), cancel)
            .await?;
        let (book_names, book_short_names) = parser::parse_book_names(&bytes)?;

        let mut chapters: BTreeMap<(i32, i32), Vec<String>> = BTreeMap::new();
        let mut completed = 0usize;
        let mut last_percent = 0u8;
        for book_index in 0..canon::BOOK_COUNT as i32 {
            let chapter_count = canon::chapter_count(book_index).unwrap_or(0) as i32;
            for chapter_index in 0..chapter_count {
                let path = chapter_resource(&info.short_name, book_index, chapter_index);
                let bytes = self.fetch_cancellable(&path, cancel).await?;
                let verses = parser::parse_chapter(&bytes)?;

                let expected = canon::verse_count(book_index, chapter_index).unwrap_or(0);
                if verses.len() != expected {
                    return Err(Error::Format(format!(
                        "{} {book_index}:{chapter_index}: {} verses, expected {expected}",
                        info.short_name,
                        verses.len()
                    )));
                }
                chapters.insert((book_index, chapter_index), verses);

                completed += 1;
                let percent = (completed * 100 / canon::TOTAL_CHAPTER_COUNT) as u8;
                if percent > last_percent {
                    last_percent = percent;
                    emit(progress, InstallPhase::Downloading(percent)).await?;
                }
            }
        }

        emit(progress, InstallPhase::Parsing).await?;
        emit(progress, InstallPhase::Committing).await?;
        content::store::write_translation(
            &self.db,
            info,
            &book_names,
            &book_short_names,
            &chapters,
        )
        .await
    }

    async fn fetch_cancellable(&self, path: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            bytes = self.source.fetch(path) => bytes,
        }
    }
}

/// Send one progress event; a dropped receiver counts as cancellation.
async fn emit(progress: &mpsc::Sender<InstallPhase>, phase: InstallPhase) -> Result<()> {
    progress.send(phase).await.map_err(|_| Error::Cancelled)
}

fn terminal_phase(result: &Result<()>) -> InstallPhase {
    match result {
        Ok(()) => InstallPhase::Installed,
        Err(e) if e.is_cancelled() => InstallPhase::Cancelled,
        Err(_) => InstallPhase::Failed,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::content::test_support::{chapter_texts, kjv_info};
    use crate::content::{ContentRepository, VerseIndex};
    use crate::state::ReadingStateCache;

    /// In-memory remote with a canned response per resource path
    struct FakeSource {
        responses: HashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl RemoteSource for FakeSource {
        async fn fetch(&self, path: &str) -> crate::error::Result<Vec<u8>> {
            self.responses
                .get(path)
                .cloned()
                .ok_or_else(|| Error::Format(format!("no resource at {path}")))
        }
    }

    fn catalog_json() -> Vec<u8> {
        serde_json::json!({
            "translations": [{
                "shortName": "KJV",
                "name": "King James Version",
                "language": "en_gb",
                "size": 1_860_978,
            }]
        })
        .to_string()
        .into_bytes()
    }

    /// A complete, valid remote copy of the KJV fixture
    fn kjv_source() -> FakeSource {
        let mut responses = HashMap::new();
        responses.insert(CATALOG_RESOURCE.to_string(), catalog_json());

        let names: Vec<String> = crate::content::test_support::book_names();
        let shorts: Vec<String> = crate::content::test_support::book_short_names();
        responses.insert(
            books_resource("KJV"),
            serde_json::json!({ "bookNames": names, "bookShortNames": shorts })
                .to_string()
                .into_bytes(),
        );

        for book_index in 0..canon::BOOK_COUNT as i32 {
            for chapter_index in 0..canon::chapter_count(book_index).unwrap() as i32 {
                responses.insert(
                    chapter_resource("KJV", book_index, chapter_index),
                    serde_json::json!({
                        "verses": chapter_texts("KJV", book_index, chapter_index)
                    })
                    .to_string()
                    .into_bytes(),
                );
            }
        }
        FakeSource { responses }
    }

    async fn setup(source: FakeSource) -> (Database, TranslationInstaller<FakeSource>) {
        tracing_subscriber::fmt()
            .with_env_filter("warn")
            .with_test_writer()
            .try_init()
            .ok();
        let db = Database::connect_in_memory().await.unwrap();
        let installer = TranslationInstaller::new(source, db.clone());
        (db, installer)
    }

    async fn stored_row_counts(db: &Database) -> (i64, i64, i64) {
        let (translations,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM translations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        let (books,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM book_names")
            .fetch_one(db.pool())
            .await
            .unwrap();
        let (chapters,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chapters")
            .fetch_one(db.pool())
            .await
            .unwrap();
        (translations, books, chapters)
    }

    fn drain(rx: &mut mpsc::Receiver<InstallPhase>) -> Vec<InstallPhase> {
        let mut phases = Vec::new();
        while let Ok(phase) = rx.try_recv() {
            phases.push(phase);
        }
        phases
    }

    #[tokio::test]
    async fn test_fetch_catalog_records_refresh_time() {
        let (_db, installer) = setup(kjv_source()).await;
        assert_eq!(installer.catalog_refreshed_at().await.unwrap(), 0);

        let catalog = installer.fetch_catalog().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].short_name, "KJV");
        assert!(installer.catalog_refreshed_at().await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_install_commits_whole_translation() {
        let (db, installer) = setup(kjv_source()).await;
        let (tx, mut rx) = mpsc::channel(256);

        installer
            .install(&kjv_info(), &tx, &CancellationToken::new())
            .await
            .unwrap();

        let (translations, books, chapters) = stored_row_counts(&db).await;
        assert_eq!(translations, 1);
        assert_eq!(books, canon::BOOK_COUNT as i64);
        assert_eq!(chapters, canon::TOTAL_CHAPTER_COUNT as i64);

        let phases = drain(&mut rx);
        assert_eq!(phases.first(), Some(&InstallPhase::Downloading(0)));
        assert_eq!(phases.last(), Some(&InstallPhase::Installed));
        let tail = &phases[phases.len() - 3..];
        assert_eq!(
            tail,
            [InstallPhase::Parsing, InstallPhase::Committing, InstallPhase::Installed]
        );

        // download progress is monotone and reaches 100
        let mut last = 0u8;
        let mut peak = 0u8;
        for phase in &phases {
            if let InstallPhase::Downloading(percent) = phase {
                assert!(*percent >= last);
                last = *percent;
                peak = peak.max(*percent);
            }
        }
        assert_eq!(peak, 100);

        // the installed text is readable through the content repository
        let state = ReadingStateCache::new(db.clone()).await.unwrap();
        let content = ContentRepository::new(db, state);
        let verses = content.read_verses("KJV", 0, 0).await.unwrap();
        assert_eq!(verses.len(), 31);
        assert_eq!(verses[0].verse_index, VerseIndex::new(0, 0, 0));
        assert_eq!(
            verses[0].text.text,
            "In the beginning God created the heaven and the earth."
        );
    }

    #[tokio::test]
    async fn test_short_chapter_aborts_with_no_rows() {
        let mut source = kjv_source();
        // Genesis 3 loses a verse
        source.responses.insert(
            chapter_resource("KJV", 0, 2),
            serde_json::json!({ "verses": ["only one"] })
                .to_string()
                .into_bytes(),
        );
        let (db, installer) = setup(source).await;
        let (tx, mut rx) = mpsc::channel(256);

        let err = installer
            .install(&kjv_info(), &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert_eq!(stored_row_counts(&db).await, (0, 0, 0));
        assert_eq!(drain(&mut rx).last(), Some(&InstallPhase::Failed));
    }

    #[tokio::test]
    async fn test_wrong_book_name_count_aborts_before_download() {
        let mut source = kjv_source();
        source.responses.insert(
            books_resource("KJV"),
            serde_json::json!({
                "bookNames": ["Genesis"],
                "bookShortNames": ["Gen."],
            })
            .to_string()
            .into_bytes(),
        );
        let (db, installer) = setup(source).await;
        let (tx, _rx) = mpsc::channel(256);

        let err = installer
            .install(&kjv_info(), &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert_eq!(stored_row_counts(&db).await, (0, 0, 0));
    }

    #[tokio::test]
    async fn test_cancellation_discards_partial_download() {
        let (db, installer) = setup(kjv_source()).await;
        let (tx, mut rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = installer.install(&kjv_info(), &tx, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(stored_row_counts(&db).await, (0, 0, 0));
        assert_eq!(drain(&mut rx).last(), Some(&InstallPhase::Cancelled));
    }

    #[tokio::test]
    async fn test_dropped_consumer_cancels_install() {
        let (db, installer) = setup(kjv_source()).await;
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let err = installer
            .install(&kjv_info(), &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(stored_row_counts(&db).await, (0, 0, 0));
    }

    #[tokio::test]
    async fn test_install_by_name_runs_full_state_machine() {
        let (_db, installer) = setup(kjv_source()).await;
        let (tx, mut rx) = mpsc::channel(256);

        installer
            .install_by_name("KJV", &tx, &CancellationToken::new())
            .await
            .unwrap();

        let phases = drain(&mut rx);
        assert_eq!(phases[0], InstallPhase::FetchingCatalog);
        assert_eq!(phases[1], InstallPhase::CatalogReady);
        assert_eq!(phases.last(), Some(&InstallPhase::Installed));
    }

    #[tokio::test]
    async fn test_install_by_name_unknown_translation_fails() {
        let (db, installer) = setup(kjv_source()).await;
        let (tx, mut rx) = mpsc::channel(256);

        let err = installer
            .install_by_name("NIV", &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(stored_row_counts(&db).await, (0, 0, 0));
        assert_eq!(drain(&mut rx).last(), Some(&InstallPhase::Failed));
    }
}
