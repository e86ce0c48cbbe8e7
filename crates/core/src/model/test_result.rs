use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::ids::ChapterId;
use crate::time::to_millis;

/// Minimum percentage needed to pass a chapter test.
pub const PASS_THRESHOLD: u8 = 70;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TestResultError {
    #[error("score must be between 0 and 100, got {0}")]
    ScoreOutOfRange(u32),

    #[error("correct answers ({correct}) exceed question count ({total})")]
    CountMismatch { correct: usize, total: usize },
}

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

/// Percentage score in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Score(u8);

impl Score {
    /// # Errors
    ///
    /// Returns `TestResultError::ScoreOutOfRange` above 100.
    pub fn new(value: u32) -> Result<Self, TestResultError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Self)
            .ok_or(TestResultError::ScoreOutOfRange(value))
    }

    /// `round(100 * correct / total)`, rounding halves up.
    ///
    /// An empty test counts as a full score so it never blocks progression.
    ///
    /// # Errors
    ///
    /// Returns `TestResultError::CountMismatch` if `correct > total`.
    pub fn from_counts(correct: usize, total: usize) -> Result<Self, TestResultError> {
        if correct > total {
            return Err(TestResultError::CountMismatch { correct, total });
        }
        if total == 0 {
            return Ok(Self(100));
        }
        let pct = (correct * 200 + total) / (total * 2);
        u8::try_from(pct)
            .map(Self)
            .map_err(|_| TestResultError::CountMismatch { correct, total })
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn passes(self, threshold: u8) -> bool {
        self.0 >= threshold
    }
}

//
// ─── TEST RESULT ───────────────────────────────────────────────────────────────
//

/// Outcome of the most recent test attempt for one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    score: Score,
    passed: bool,
    taken_at: DateTime<Utc>,
    time_spent_secs: u64,
}

impl TestResult {
    #[must_use]
    pub fn new(score: Score, threshold: u8, taken_at: DateTime<Utc>, time_spent_secs: u64) -> Self {
        Self {
            score,
            passed: score.passes(threshold),
            taken_at: to_millis(taken_at),
            time_spent_secs,
        }
    }

    /// Rehydrate a stored result. The stored pass flag is kept as recorded.
    ///
    /// # Errors
    ///
    /// Returns `TestResultError::ScoreOutOfRange` for scores above 100.
    pub fn from_persisted(
        score: u32,
        passed: bool,
        taken_at: DateTime<Utc>,
        time_spent_secs: u64,
    ) -> Result<Self, TestResultError> {
        Ok(Self {
            score: Score::new(score)?,
            passed,
            taken_at: to_millis(taken_at),
            time_spent_secs,
        })
    }

    #[must_use]
    pub fn score(&self) -> Score {
        self.score
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    #[must_use]
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    #[must_use]
    pub fn time_spent_secs(&self) -> u64 {
        self.time_spent_secs
    }
}

/// One result slot per chapter; recording a chapter again overwrites its slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestResults(BTreeMap<ChapterId, TestResult>);

impl TestResults {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, chapter: ChapterId, result: TestResult) {
        self.0.insert(chapter, result);
    }

    #[must_use]
    pub fn get(&self, chapter: ChapterId) -> Option<&TestResult> {
        self.0.get(&chapter)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChapterId, &TestResult)> {
        self.0.iter().map(|(id, r)| (*id, r))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.0.values().filter(|r| r.passed()).count()
    }
}

impl FromIterator<(ChapterId, TestResult)> for TestResults {
    fn from_iter<I: IntoIterator<Item = (ChapterId, TestResult)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
