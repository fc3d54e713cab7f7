use async_trait::async_trait;
use academy_core::model::{LessonId, ProgressRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Key under which learner progress is stored.
pub const PROGRESS_KEY: &str = "academy.progress";

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape of learner progress.
///
/// Written as `{"completedLessonIds": [...], "rewardPoints": n}`. The older
/// `completedLessons` / `stars` names are accepted on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    #[serde(alias = "completedLessons")]
    pub completed_lesson_ids: Vec<u32>,
    #[serde(alias = "stars")]
    pub reward_points: u32,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn from_record(record: &ProgressRecord) -> Self {
        Self {
            completed_lesson_ids: record
                .completed_lesson_ids()
                .iter()
                .map(LessonId::value)
                .collect(),
            reward_points: record.reward_points(),
        }
    }

    /// Completed ids as domain identifiers.
    pub fn lesson_ids(&self) -> impl Iterator<Item = LessonId> + '_ {
        self.completed_lesson_ids.iter().copied().map(LessonId::new)
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the snapshot cannot be encoded.
    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(|err| StorageError::Serialization(err.to_string()))
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for malformed or mistyped JSON.
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw).map_err(|err| StorageError::Serialization(err.to_string()))
    }
}

/// Repository contract for the single progress record.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the stored snapshot, or `None` if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored value is corrupt, or
    /// `StorageError::Connection` if the backend cannot be reached.
    async fn load_progress(&self) -> Result<Option<ProgressSnapshot>, StorageError>;

    /// Persist the snapshot, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save_progress(&self, snapshot: &ProgressSnapshot) -> Result<(), StorageError>;

    /// Remove the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects the delete.
    async fn clear_progress(&self) -> Result<(), StorageError>;
}

/// Simple in-memory key/value repository for tests and ephemeral runs.
///
/// Values are kept as JSON text, like the durable backend, so corrupt data can
/// be injected with [`InMemoryRepository::put_raw`].
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw text under `key`, bypassing serialization.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    /// Raw text stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load_progress(&self) -> Result<Option<ProgressSnapshot>, StorageError> {
        self.get_raw(PROGRESS_KEY)?
            .map(|raw| ProgressSnapshot::from_json(&raw))
            .transpose()
    }

    async fn save_progress(&self, snapshot: &ProgressSnapshot) -> Result<(), StorageError> {
        self.put_raw(PROGRESS_KEY, &snapshot.to_json()?)
    }

    async fn clear_progress(&self) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(PROGRESS_KEY);
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_repository(repo: impl ProgressRepository + 'static) -> Self {
        Self {
            progress: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_snapshot() {
        let repo = InMemoryRepository::new();
        assert_eq!(repo.load_progress().await.unwrap(), None);

        let mut record = ProgressRecord::new();
        record.record_completion(LessonId::new(0));
        record.record_completion(LessonId::new(1));
        let snapshot = ProgressSnapshot::from_record(&record);
        repo.save_progress(&snapshot).await.unwrap();

        let loaded = repo.load_progress().await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.reward_points, 6);
        assert_eq!(
            repo.get_raw(PROGRESS_KEY).unwrap().as_deref(),
            Some(r#"{"completedLessonIds":[0,1],"rewardPoints":6}"#)
        );
    }

    #[tokio::test]
    async fn accepts_legacy_field_names() {
        let repo = InMemoryRepository::new();
        repo.put_raw(PROGRESS_KEY, r#"{"completedLessons":[0],"stars":3}"#)
            .unwrap();
        let loaded = repo.load_progress().await.unwrap().unwrap();
        assert_eq!(loaded.completed_lesson_ids, vec![0]);
        assert_eq!(loaded.reward_points, 3);
    }

    #[tokio::test]
    async fn corrupt_value_is_a_serialization_error() {
        let repo = InMemoryRepository::new();
        repo.put_raw(PROGRESS_KEY, "{not json").unwrap();
        assert!(matches!(
            repo.load_progress().await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn clear_removes_snapshot() {
        let storage = Storage::in_memory();
        storage
            .progress
            .save_progress(&ProgressSnapshot::default())
            .await
            .unwrap();
        storage.progress.clear_progress().await.unwrap();
        assert_eq!(storage.progress.load_progress().await.unwrap(), None);
    }
}
