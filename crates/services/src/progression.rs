use std::collections::BTreeSet;
use std::sync::Arc;

use academy_core::model::{
    LessonCard, LessonCatalog, LessonId, ProgressError, ProgressRecord, ProgressSummary,
};
use storage::repository::{ProgressRepository, ProgressSnapshot};

/// Sole owner and writer of the learner's `ProgressRecord`.
///
/// Reads that fail fall back to the zero record and writes are best effort:
/// storage trouble is logged and never reaches the learner.
pub struct ProgressionStore {
    catalog: Arc<LessonCatalog>,
    repo: Arc<dyn ProgressRepository>,
    record: ProgressRecord,
}

impl ProgressionStore {
    /// Load progress from `repo`, repairing or discarding what cannot be trusted.
    pub async fn load(catalog: Arc<LessonCatalog>, repo: Arc<dyn ProgressRepository>) -> Self {
        let record = read_record(repo.as_ref(), &catalog).await;
        tracing::debug!(
            completed = record.completed_count(),
            reward_points = record.reward_points(),
            "progress loaded"
        );
        Self {
            catalog,
            repo,
            record,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &LessonCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    #[must_use]
    pub fn is_unlocked(&self, id: LessonId) -> bool {
        self.catalog.contains(id) && self.record.is_unlocked(id)
    }

    #[must_use]
    pub fn is_completed(&self, id: LessonId) -> bool {
        self.record.is_completed(id)
    }

    #[must_use]
    pub fn completed_lesson_ids(&self) -> &BTreeSet<LessonId> {
        self.record.completed_lesson_ids()
    }

    #[must_use]
    pub fn reward_points(&self) -> u32 {
        self.record.reward_points()
    }

    #[must_use]
    pub fn is_graduated(&self) -> bool {
        self.record.is_graduated(&self.catalog)
    }

    #[must_use]
    pub fn summary(&self) -> ProgressSummary {
        self.record.summary(&self.catalog)
    }

    #[must_use]
    pub fn lesson_cards(&self) -> Vec<LessonCard> {
        self.record.lesson_cards(&self.catalog)
    }

    /// Mark `id` complete and persist. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownLesson` if the catalog has no such lesson.
    pub async fn record_completion(&mut self, id: LessonId) -> Result<bool, ProgressError> {
        if !self.catalog.contains(id) {
            return Err(ProgressError::UnknownLesson(id));
        }
        if !self.record.record_completion(id) {
            tracing::debug!(lesson_id = %id, "lesson already completed");
            return Ok(false);
        }
        tracing::info!(
            lesson_id = %id,
            reward_points = self.record.reward_points(),
            "lesson completed"
        );
        if self.is_graduated() {
            tracing::info!(lessons = self.catalog.len(), "all lessons completed");
        }
        self.save().await;
        Ok(true)
    }

    /// Forget all progress and persist the zero record.
    pub async fn reset(&mut self) {
        self.record = ProgressRecord::new();
        tracing::info!("progress reset");
        self.save().await;
    }

    async fn save(&self) {
        let snapshot = ProgressSnapshot::from_record(&self.record);
        if let Err(err) = self.repo.save_progress(&snapshot).await {
            tracing::warn!(error = %err, "failed to save progress");
        }
    }
}

async fn read_record(repo: &dyn ProgressRepository, catalog: &LessonCatalog) -> ProgressRecord {
    let snapshot = match repo.load_progress().await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return ProgressRecord::new(),
        Err(err) => {
            tracing::warn!(error = %err, "stored progress unreadable, starting fresh");
            return ProgressRecord::new();
        }
    };

    let all_known = snapshot.lesson_ids().all(|id| catalog.contains(id));
    match ProgressRecord::from_persisted(snapshot.lesson_ids(), snapshot.reward_points) {
        Ok(record) if all_known => record,
        _ => {
            let repaired = ProgressRecord::repaired(snapshot.lesson_ids(), catalog);
            tracing::warn!(
                stored_ids = ?snapshot.completed_lesson_ids,
                stored_points = snapshot.reward_points,
                completed = repaired.completed_count(),
                reward_points = repaired.reward_points(),
                "stored progress violated invariants and was repaired"
            );
            repaired
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::catalog::bundled_catalog;
    use storage::repository::{InMemoryRepository, PROGRESS_KEY};

    async fn store_with(repo: &InMemoryRepository) -> ProgressionStore {
        let catalog = Arc::new(bundled_catalog().unwrap());
        ProgressionStore::load(catalog, Arc::new(repo.clone())).await
    }

    #[tokio::test]
    async fn fresh_store_unlocks_only_first_lesson() {
        let store = store_with(&InMemoryRepository::new()).await;
        assert!(store.is_unlocked(LessonId::new(0)));
        for id in 1..6 {
            assert!(!store.is_unlocked(LessonId::new(id)));
        }
        assert!(!store.is_unlocked(LessonId::new(6)));
        assert_eq!(store.reward_points(), 0);
        assert!(!store.is_graduated());
    }

    #[tokio::test]
    async fn completion_is_idempotent_and_persisted() {
        let repo = InMemoryRepository::new();
        let mut store = store_with(&repo).await;

        assert!(store.record_completion(LessonId::new(0)).await.unwrap());
        assert!(!store.record_completion(LessonId::new(0)).await.unwrap());
        assert_eq!(store.reward_points(), 3);
        assert!(store.is_unlocked(LessonId::new(1)));

        let reloaded = store_with(&repo).await;
        assert_eq!(reloaded.record(), store.record());
    }

    #[tokio::test]
    async fn unknown_lesson_is_rejected() {
        let mut store = store_with(&InMemoryRepository::new()).await;
        assert_eq!(
            store.record_completion(LessonId::new(42)).await,
            Err(ProgressError::UnknownLesson(LessonId::new(42)))
        );
        assert_eq!(store.reward_points(), 0);
    }

    #[tokio::test]
    async fn corrupt_storage_yields_zero_record() {
        let repo = InMemoryRepository::new();
        repo.put_raw(PROGRESS_KEY, "]]garbage").unwrap();
        let store = store_with(&repo).await;
        assert_eq!(store.record(), &ProgressRecord::new());
    }

    #[tokio::test]
    async fn inconsistent_storage_is_repaired() {
        let repo = InMemoryRepository::new();
        repo.put_raw(PROGRESS_KEY, r#"{"completedLessonIds":[0,1,99],"rewardPoints":50}"#)
            .unwrap();
        let store = store_with(&repo).await;
        let ids: Vec<u32> = store
            .completed_lesson_ids()
            .iter()
            .map(LessonId::value)
            .collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(store.reward_points(), 6);
    }

    #[tokio::test]
    async fn completing_every_lesson_graduates() {
        let mut store = store_with(&InMemoryRepository::new()).await;
        for id in 0..6 {
            store.record_completion(LessonId::new(id)).await.unwrap();
        }
        assert!(store.is_graduated());
        let summary = store.summary();
        assert_eq!(summary.completed, 6);
        assert_eq!(summary.reward_points, 18);
        assert_eq!(summary.current_lesson, None);
    }

    #[tokio::test]
    async fn reset_persists_zero_record() {
        let repo = InMemoryRepository::new();
        let mut store = store_with(&repo).await;
        store.record_completion(LessonId::new(0)).await.unwrap();
        store.reset().await;
        assert_eq!(
            repo.get_raw(PROGRESS_KEY).unwrap().as_deref(),
            Some(r#"{"completedLessonIds":[],"rewardPoints":0}"#)
        );
        assert!(!store.is_unlocked(LessonId::new(1)));
    }
}
