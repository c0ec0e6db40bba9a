//! Reading session tracking
//!
//! Accumulates the time a reader spends in the current chapter. The flush
//! on stop is dispatched as a detached task so it runs to completion even
//! when the initiating caller is torn down mid-session.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::store::ProgressRepository;
use crate::state::ReadingStateCache;

/// Sessions shorter than this are noise (page flips, accidental taps) and
/// are not recorded.
const TRACKING_THRESHOLD_MS: i64 = 2_500;

/// Tracks one reading session at a time against the current verse's chapter
#[derive(Debug, Clone)]
pub struct ReadingTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug)]
struct TrackerInner {
    state: ReadingStateCache,
    progress: ProgressRepository,
    session_started_at: Mutex<Option<i64>>,
}

impl ReadingTracker {
    pub fn new(state: ReadingStateCache, progress: ProgressRepository) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                state,
                progress,
                session_started_at: Mutex::new(None),
            }),
        }
    }

    /// Begin a reading session. No-op when one is already running.
    pub async fn start_tracking(&self) {
        let mut session = self.inner.session_started_at.lock().await;
        if session.is_none() {
            *session = Some(Utc::now().timestamp_millis());
        }
    }

    /// End the session and flush the elapsed time for the chapter of the
    /// current verse. The flush runs on a detached task: the returned handle
    /// may be awaited, but dropping it does not cancel the flush.
    pub fn stop_tracking(&self) -> JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let started_at = inner.session_started_at.lock().await.take();
            let Some(started_at) = started_at else {
                return;
            };
            let now = Utc::now().timestamp_millis();
            let elapsed = now - started_at;
            if elapsed < TRACKING_THRESHOLD_MS {
                return;
            }
            let Some(verse) = inner.state.current_valid_verse_index() else {
                return;
            };
            if let Err(error) = inner
                .progress
                .track(verse.book_index, verse.chapter_index, elapsed, now)
                .await
            {
                tracing::error!(%error, "failed to flush reading progress");
            }
        })
    }

    #[cfg(test)]
    async fn force_session_start(&self, started_at_ms: i64) {
        *self.inner.session_started_at.lock().await = Some(started_at_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::VerseIndex;
    use crate::store::Database;

    async fn setup() -> (ReadingTracker, ProgressRepository, ReadingStateCache) {
        let db = Database::connect_in_memory().await.unwrap();
        let state = ReadingStateCache::new(db.clone()).await.unwrap();
        let progress = ProgressRepository::new(db);
        let tracker = ReadingTracker::new(state.clone(), progress.clone());
        (tracker, progress, state)
    }

    #[tokio::test]
    async fn test_stop_flushes_elapsed_time() {
        let (tracker, progress, state) = setup().await;
        state
            .save_current_verse_index(VerseIndex::new(0, 1, 4))
            .await
            .unwrap();

        tracker.start_tracking().await;
        tracker
            .force_session_start(Utc::now().timestamp_millis() - 10_000)
            .await;
        tracker.stop_tracking().await.unwrap();

        let recorded = progress.read().await.unwrap();
        assert_eq!(recorded.per_chapter.len(), 1);
        assert_eq!(recorded.per_chapter[0].book_index, 0);
        assert_eq!(recorded.per_chapter[0].chapter_index, 1);
        assert!(recorded.per_chapter[0].time_spent_ms >= 10_000);
    }

    #[tokio::test]
    async fn test_short_sessions_are_dropped() {
        let (tracker, progress, state) = setup().await;
        state
            .save_current_verse_index(VerseIndex::new(0, 0, 0))
            .await
            .unwrap();

        tracker.start_tracking().await;
        tracker.stop_tracking().await.unwrap();

        assert!(progress.read().await.unwrap().per_chapter.is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_selection_records_nothing() {
        let (tracker, progress, _state) = setup().await;
        tracker.start_tracking().await;
        tracker
            .force_session_start(Utc::now().timestamp_millis() - 10_000)
            .await;
        tracker.stop_tracking().await.unwrap();

        assert!(progress.read().await.unwrap().per_chapter.is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let (tracker, progress, _state) = setup().await;
        tracker.stop_tracking().await.unwrap();
        assert!(progress.read().await.unwrap().per_chapter.is_empty());
    }
}
