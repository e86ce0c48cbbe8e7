use async_trait::async_trait;
use lingua_core::model::{LessonFlags, Profile, Progress, TestResults};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::records::{
    self, LESSONS_KEY, LessonFlagsRecord, PROFILE_KEY, PROGRESS_KEY, ProfileRecord,
    ProgressRecord, TEST_RESULTS_KEY, TestResultsRecord,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RAW RECORD STORE ──────────────────────────────────────────────────────────
//

/// Key/value store of serialized records. Backends implement this; the typed
/// repositories below are provided for every `RecordStore`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the raw document stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the backend cannot be read.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the document stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the backend cannot be written.
    async fn put_raw(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the document under `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the backend cannot be written.
    async fn delete_raw(&self, key: &str) -> Result<(), StorageError>;
}

//
// ─── TYPED REPOSITORIES ────────────────────────────────────────────────────────
//

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a stored profile cannot be
    /// decoded, or other storage errors.
    async fn get_profile(&self) -> Result<Option<Profile>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn save_profile(&self, profile: &Profile) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if stored progress cannot be
    /// decoded or violates the unlock invariant, or other storage errors.
    async fn get_progress(&self) -> Result<Option<Progress>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the progress cannot be stored.
    async fn save_progress(&self, progress: &Progress) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be removed.
    async fn delete_progress(&self) -> Result<(), StorageError>;
}

#[async_trait]
pub trait TestResultRepository: Send + Sync {
    /// All stored results; empty when nothing was recorded yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored map cannot be decoded.
    async fn get_test_results(&self) -> Result<TestResults, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the results cannot be stored.
    async fn save_test_results(&self, results: &TestResults) -> Result<(), StorageError>;
}

#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored flags cannot be decoded.
    async fn get_lesson_flags(&self) -> Result<LessonFlags, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the flags cannot be stored.
    async fn save_lesson_flags(&self, flags: &LessonFlags) -> Result<(), StorageError>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> ProfileRepository for S {
    async fn get_profile(&self) -> Result<Option<Profile>, StorageError> {
        let Some(raw) = self.get_raw(PROFILE_KEY).await? else {
            return Ok(None);
        };
        let record: ProfileRecord = records::decode(PROFILE_KEY, &raw)?;
        record.into_profile().map(Some)
    }

    async fn save_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let raw = records::encode(&ProfileRecord::from_profile(profile))?;
        self.put_raw(PROFILE_KEY, &raw).await
    }
}

#[async_trait]
impl<S: RecordStore + ?Sized> ProgressRepository for S {
    async fn get_progress(&self) -> Result<Option<Progress>, StorageError> {
        let Some(raw) = self.get_raw(PROGRESS_KEY).await? else {
            return Ok(None);
        };
        let record: ProgressRecord = records::decode(PROGRESS_KEY, &raw)?;
        record.into_progress().map(Some)
    }

    async fn save_progress(&self, progress: &Progress) -> Result<(), StorageError> {
        let raw = records::encode(&ProgressRecord::from_progress(progress))?;
        self.put_raw(PROGRESS_KEY, &raw).await
    }

    async fn delete_progress(&self) -> Result<(), StorageError> {
        self.delete_raw(PROGRESS_KEY).await
    }
}

#[async_trait]
impl<S: RecordStore + ?Sized> TestResultRepository for S {
    async fn get_test_results(&self) -> Result<TestResults, StorageError> {
        let Some(raw) = self.get_raw(TEST_RESULTS_KEY).await? else {
            return Ok(TestResults::new());
        };
        let record: TestResultsRecord = records::decode(TEST_RESULTS_KEY, &raw)?;
        records::test_results_from_record(record)
    }

    async fn save_test_results(&self, results: &TestResults) -> Result<(), StorageError> {
        let raw = records::encode(&records::test_results_to_record(results))?;
        self.put_raw(TEST_RESULTS_KEY, &raw).await
    }
}

#[async_trait]
impl<S: RecordStore + ?Sized> LessonRepository for S {
    async fn get_lesson_flags(&self) -> Result<LessonFlags, StorageError> {
        let Some(raw) = self.get_raw(LESSONS_KEY).await? else {
            return Ok(LessonFlags::new());
        };
        let record: LessonFlagsRecord = records::decode(LESSONS_KEY, &raw)?;
        Ok(records::lesson_flags_from_record(record))
    }

    async fn save_lesson_flags(&self, flags: &LessonFlags) -> Result<(), StorageError> {
        let raw = records::encode(&records::lesson_flags_to_record(flags))?;
        self.put_raw(LESSONS_KEY, &raw).await
    }
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRepository {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn put_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete_raw(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the record repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub profiles: Arc<dyn ProfileRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub test_results: Arc<dyn TestResultRepository>,
    pub lessons: Arc<dyn LessonRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryRepository::new()))
    }

    /// Route every repository to the same record store.
    #[must_use]
    pub fn from_store<S: RecordStore + 'static>(store: Arc<S>) -> Self {
        let profiles: Arc<dyn ProfileRepository> = store.clone();
        let progress: Arc<dyn ProgressRepository> = store.clone();
        let test_results: Arc<dyn TestResultRepository> = store.clone();
        let lessons: Arc<dyn LessonRepository> = store;
        Self {
            profiles,
            progress,
            test_results,
            lessons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_core::model::{ChapterId, ProfileDraft, Score, TestResult};
    use lingua_core::time::fixed_now;

    #[tokio::test]
    async fn round_trips_progress() {
        let repo = InMemoryRepository::new();
        assert!(repo.get_progress().await.unwrap().is_none());

        let mut progress = Progress::new(fixed_now());
        progress.award_xp(20, fixed_now());
        progress.mark_completed(ChapterId::new(1), fixed_now());
        progress.enter_chapter(ChapterId::new(2), fixed_now()).unwrap();
        progress.set_scene(1, fixed_now());
        repo.save_progress(&progress).await.unwrap();

        let loaded = repo.get_progress().await.unwrap().unwrap();
        assert_eq!(loaded, progress);
    }

    #[tokio::test]
    async fn delete_progress_clears_record() {
        let repo = InMemoryRepository::new();
        repo.save_progress(&Progress::new(fixed_now())).await.unwrap();
        repo.delete_progress().await.unwrap();
        assert!(repo.get_progress().await.unwrap().is_none());
        repo.delete_progress().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_record_is_serialization_error() {
        let repo = InMemoryRepository::new();
        repo.put_raw(PROGRESS_KEY, "{ not json").await.unwrap();
        assert!(matches!(
            repo.get_progress().await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn missing_maps_default_to_empty() {
        let storage = Storage::in_memory();
        assert!(storage.test_results.get_test_results().await.unwrap().is_empty());
        assert_eq!(
            storage.lessons.get_lesson_flags().await.unwrap().completed_count(),
            0
        );
        assert!(storage.profiles.get_profile().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn storage_handles_share_one_store() {
        let store = Arc::new(InMemoryRepository::new());
        let storage = Storage::from_store(store.clone());

        let profile = ProfileDraft::new().validate(fixed_now()).unwrap();
        storage.profiles.save_profile(&profile).await.unwrap();

        let mut results = TestResults::new();
        results.record(
            ChapterId::new(1),
            TestResult::new(Score::new(90).unwrap(), 70, fixed_now(), 12),
        );
        storage.test_results.save_test_results(&results).await.unwrap();

        assert!(store.get_raw(PROFILE_KEY).await.unwrap().is_some());
        assert_eq!(store.get_test_results().await.unwrap(), results);
    }
}
