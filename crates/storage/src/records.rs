//! On-disk JSON shapes for each persisted record and their conversion to and
//! from domain types.

use std::collections::BTreeMap;

use lingua_core::model::{
    CefrLevel, ChapterId, LessonFlags, Profile, Progress, TestResult, TestResults,
};
use lingua_core::time::from_epoch_ms;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::repository::StorageError;

pub const PROFILE_KEY: &str = "user-profile";
pub const PROGRESS_KEY: &str = "story-progress";
pub const TEST_RESULTS_KEY: &str = "test-results";
pub const LESSONS_KEY: &str = "lesson-progress";

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn timestamp(field: &'static str, ms: i64) -> Result<chrono::DateTime<chrono::Utc>, StorageError> {
    from_epoch_ms(ms).ok_or_else(|| StorageError::Serialization(format!("{field} out of range")))
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization(format!("{key}: {e}")))
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

//
// ─── PROFILE ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    pub name: String,
    pub native_language: String,
    pub target_language_code: String,
    pub level: CefrLevel,
    pub learning_goal: String,
    pub daily_goal_minutes: u32,
    pub created_at_epoch_ms: i64,
    pub onboarding_complete: bool,
}

impl ProfileRecord {
    #[must_use]
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            name: profile.name().to_owned(),
            native_language: profile.native_language().to_owned(),
            target_language_code: profile.target_language().to_owned(),
            level: profile.level(),
            learning_goal: profile.learning_goal().to_owned(),
            daily_goal_minutes: profile.daily_goal_minutes(),
            created_at_epoch_ms: profile.created_at().timestamp_millis(),
            onboarding_complete: profile.onboarding_complete(),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored values fail domain validation.
    pub fn into_profile(self) -> Result<Profile, StorageError> {
        Profile::from_persisted(
            self.name,
            self.native_language,
            self.target_language_code,
            self.level,
            self.learning_goal,
            self.daily_goal_minutes,
            timestamp("createdAtEpochMs", self.created_at_epoch_ms)?,
            self.onboarding_complete,
        )
        .map_err(ser)
    }
}

//
// ─── STORY PROGRESS ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub current_chapter_id: u32,
    pub current_scene_index: usize,
    #[serde(rename = "totalXP")]
    pub total_xp: u32,
    pub completed_chapter_ids: Vec<u32>,
    pub last_updated_epoch_ms: i64,
}

impl ProgressRecord {
    #[must_use]
    pub fn from_progress(progress: &Progress) -> Self {
        Self {
            current_chapter_id: progress.current_chapter().value(),
            current_scene_index: progress.current_scene(),
            total_xp: progress.total_xp(),
            completed_chapter_ids: progress.completed().iter().map(ChapterId::value).collect(),
            last_updated_epoch_ms: progress.last_updated().timestamp_millis(),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the record points at a locked
    /// chapter or carries an invalid id or timestamp.
    pub fn into_progress(self) -> Result<Progress, StorageError> {
        Progress::from_persisted(
            ChapterId::new(self.current_chapter_id),
            self.current_scene_index,
            self.total_xp,
            self.completed_chapter_ids.into_iter().map(ChapterId::new),
            timestamp("lastUpdatedEpochMs", self.last_updated_epoch_ms)?,
        )
        .map_err(ser)
    }
}

//
// ─── TEST RESULTS ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultRecord {
    pub score: u32,
    pub passed: bool,
    pub date_epoch_ms: i64,
    pub time_spent_seconds: u64,
}

/// Keyed by the chapter id rendered as a string.
pub type TestResultsRecord = BTreeMap<String, TestResultRecord>;

#[must_use]
pub fn test_results_to_record(results: &TestResults) -> TestResultsRecord {
    results
        .iter()
        .map(|(chapter, result)| {
            (
                chapter.to_string(),
                TestResultRecord {
                    score: u32::from(result.score().value()),
                    passed: result.passed(),
                    date_epoch_ms: result.taken_at().timestamp_millis(),
                    time_spent_seconds: result.time_spent_secs(),
                },
            )
        })
        .collect()
}

/// # Errors
///
/// Returns `StorageError::Serialization` for non-numeric keys, scores above
/// 100, or out-of-range dates.
pub fn test_results_from_record(record: TestResultsRecord) -> Result<TestResults, StorageError> {
    record
        .into_iter()
        .map(|(key, r)| {
            let chapter = key.parse::<ChapterId>().map_err(ser)?;
            let result = TestResult::from_persisted(
                r.score,
                r.passed,
                timestamp("dateEpochMs", r.date_epoch_ms)?,
                r.time_spent_seconds,
            )
            .map_err(ser)?;
            Ok((chapter, result))
        })
        .collect()
}

//
// ─── LESSONS ───────────────────────────────────────────────────────────────────
//

pub type LessonFlagsRecord = BTreeMap<String, bool>;

#[must_use]
pub fn lesson_flags_to_record(flags: &LessonFlags) -> LessonFlagsRecord {
    flags.as_map().clone()
}

#[must_use]
pub fn lesson_flags_from_record(record: LessonFlagsRecord) -> LessonFlags {
    LessonFlags::from_map(record)
}
