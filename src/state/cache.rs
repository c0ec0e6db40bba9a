//! Process-wide reactive reading state
//!
//! Current translation, current verse, and the parallel-translation set,
//! each exposed as a watch stream replaying the latest value to new
//! subscribers. Values are persisted to the durable store before they are
//! published, so observers never see a value fresher than what is stored
//! by its own publish.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::content::{self, VerseIndex};
use crate::error::{Error, Result};
use crate::store::Database;

const KEY_CURRENT_TRANSLATION: &str = "current_translation";
const KEY_CURRENT_VERSE_INDEX: &str = "current_verse_index";
const KEY_PARALLEL_TRANSLATIONS: &str = "parallel_translations";

/// One reactive field: a latest-value stream plus a lock serializing
/// persist-then-publish for that field only. Mutations to different fields
/// never contend.
#[derive(Debug)]
struct StateField<T> {
    lock: Mutex<()>,
    tx: watch::Sender<T>,
}

impl<T: Clone> StateField<T> {
    fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            lock: Mutex::new(()),
            tx,
        }
    }

    fn value(&self) -> T {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

/// Reactive cache of "current application state".
///
/// Constructed once at startup; initial values are loaded from the durable
/// store and healed against the installed translation set.
#[derive(Debug, Clone)]
pub struct ReadingStateCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    db: Database,
    translation: StateField<String>,
    verse: StateField<VerseIndex>,
    parallel: StateField<BTreeSet<String>>,
}

impl ReadingStateCache {
    pub async fn new(db: Database) -> Result<Self> {
        let stored_translation = db.read_metadata(KEY_CURRENT_TRANSLATION, "").await?;
        let translation = if stored_translation.is_empty()
            || content::store::translation_installed(&db, &stored_translation).await?
        {
            stored_translation
        } else {
            // A crash between uninstall and state fixup can leave a stale
            // selection behind; heal it on load.
            tracing::warn!(
                translation = %stored_translation,
                "stored current translation is not installed, resetting"
            );
            db.save_metadata(KEY_CURRENT_TRANSLATION, "").await?;
            String::new()
        };

        let verse = db
            .read_metadata(KEY_CURRENT_VERSE_INDEX, "")
            .await
            .map(|raw| {
                serde_json::from_str::<VerseIndex>(&raw)
                    .map(VerseIndex::normalized)
                    .unwrap_or(VerseIndex::INVALID)
            })?;

        let stored_parallel = db.read_metadata(KEY_PARALLEL_TRANSLATIONS, "[]").await?;
        let mut parallel: BTreeSet<String> =
            serde_json::from_str(&stored_parallel).unwrap_or_default();
        parallel.remove(&translation);
        let mut healed = BTreeSet::new();
        for short_name in parallel {
            if content::store::translation_installed(&db, &short_name).await? {
                healed.insert(short_name);
            }
        }
        db.save_metadata(KEY_PARALLEL_TRANSLATIONS, &encode_set(&healed))
            .await?;

        Ok(Self {
            inner: Arc::new(CacheInner {
                db,
                translation: StateField::new(translation),
                verse: StateField::new(verse),
                parallel: StateField::new(healed),
            }),
        })
    }

    // ------------------------------------------------------------------
    // Current translation
    // ------------------------------------------------------------------

    /// Stream of the current translation short name; empty string when none
    /// is selected.
    pub fn current_translation(&self) -> watch::Receiver<String> {
        self.inner.translation.subscribe()
    }

    pub fn current_translation_value(&self) -> String {
        self.inner.translation.value()
    }

    /// Select a translation. Pass an empty string to clear the selection;
    /// a non-empty name must refer to an installed translation. The new
    /// current translation is pruned from the parallel set.
    pub async fn save_current_translation(&self, short_name: &str) -> Result<()> {
        if !short_name.is_empty()
            && !content::store::translation_installed(&self.inner.db, short_name).await?
        {
            return Err(Error::NotFound(short_name.to_string()));
        }

        let _guard = self.inner.translation.lock.lock().await;
        self.inner
            .db
            .save_metadata(KEY_CURRENT_TRANSLATION, short_name)
            .await?;
        self.inner.translation.tx.send_replace(short_name.to_string());
        drop(_guard);

        if !short_name.is_empty() {
            self.remove_parallel_translation(short_name).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Current verse
    // ------------------------------------------------------------------

    /// Raw stream of the current verse index. May carry
    /// [`VerseIndex::INVALID`], representing "nothing selected".
    pub fn current_verse_index(&self) -> watch::Receiver<VerseIndex> {
        self.inner.verse.subscribe()
    }

    pub fn current_verse_index_value(&self) -> VerseIndex {
        self.inner.verse.value()
    }

    /// Filtered read path: the current verse only when it is a concrete
    /// canon location.
    pub fn current_valid_verse_index(&self) -> Option<VerseIndex> {
        let verse = self.inner.verse.value();
        verse.is_valid().then_some(verse)
    }

    /// Publish a new current verse. An index outside the canon decays to
    /// [`VerseIndex::INVALID`] before it is stored or published.
    pub async fn save_current_verse_index(&self, verse_index: VerseIndex) -> Result<()> {
        let normalized = verse_index.normalized();
        let _guard = self.inner.verse.lock.lock().await;
        let encoded = serde_json::to_string(&normalized)
            .map_err(|e| Error::Format(format!("verse index: {e}")))?;
        self.inner
            .db
            .save_metadata(KEY_CURRENT_VERSE_INDEX, &encoded)
            .await?;
        self.inner.verse.tx.send_replace(normalized);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Parallel translations
    // ------------------------------------------------------------------

    /// Stream of the parallel-translation set.
    pub fn parallel_translations(&self) -> watch::Receiver<BTreeSet<String>> {
        self.inner.parallel.subscribe()
    }

    pub fn parallel_translations_value(&self) -> BTreeSet<String> {
        self.inner.parallel.value()
    }

    /// Add a translation to the parallel set. No-op when it is already
    /// present, equals the current translation, or is not installed.
    pub async fn request_parallel_translation(&self, short_name: &str) -> Result<()> {
        if short_name == self.current_translation_value() {
            return Ok(());
        }
        if !content::store::translation_installed(&self.inner.db, short_name).await? {
            tracing::warn!(translation = %short_name, "ignoring parallel request for uninstalled translation");
            return Ok(());
        }

        let _guard = self.inner.parallel.lock.lock().await;
        let mut set = self.inner.parallel.value();
        if !set.insert(short_name.to_string()) {
            return Ok(());
        }
        self.inner
            .db
            .save_metadata(KEY_PARALLEL_TRANSLATIONS, &encode_set(&set))
            .await?;
        self.inner.parallel.tx.send_replace(set);
        Ok(())
    }

    /// Remove a translation from the parallel set; no-op when absent.
    pub async fn remove_parallel_translation(&self, short_name: &str) -> Result<()> {
        let _guard = self.inner.parallel.lock.lock().await;
        let mut set = self.inner.parallel.value();
        if !set.remove(short_name) {
            return Ok(());
        }
        self.inner
            .db
            .save_metadata(KEY_PARALLEL_TRANSLATIONS, &encode_set(&set))
            .await?;
        self.inner.parallel.tx.send_replace(set);
        Ok(())
    }

    /// Empty the parallel set.
    pub async fn clear_parallel_translations(&self) -> Result<()> {
        let _guard = self.inner.parallel.lock.lock().await;
        self.inner
            .db
            .save_metadata(KEY_PARALLEL_TRANSLATIONS, "[]")
            .await?;
        self.inner.parallel.tx.send_replace(BTreeSet::new());
        Ok(())
    }
}

fn encode_set(set: &BTreeSet<String>) -> String {
    serde_json::to_string(set).unwrap_or_else(|_| "[]".to_string())
}
