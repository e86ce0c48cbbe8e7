use std::sync::Arc;

use lingua_core::model::{LessonFlags, Progress, TestResults};
use storage::repository::{LessonRepository, ProgressRepository, TestResultRepository};
use tracing::{info, warn};

use crate::Clock;
use crate::error::ProgressServiceError;

/// Number of standalone lessons the dashboard measures against.
pub const DEFAULT_TOTAL_LESSONS: usize = 15;

/// Aggregated numbers for the learner dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardSummary {
    pub lessons_completed: usize,
    pub total_lessons: usize,
    pub lesson_percentage: u8,
    pub story_xp: u32,
    pub chapters_completed: usize,
    pub tests_taken: usize,
    pub tests_passed: usize,
}

/// Reads and writes story progress, test results and lesson flags.
///
/// Reads never fail: a missing or unreadable record yields the default value
/// and a warning. Writes surface storage errors.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
    results: Arc<dyn TestResultRepository>,
    lessons: Arc<dyn LessonRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        results: Arc<dyn TestResultRepository>,
        lessons: Arc<dyn LessonRepository>,
    ) -> Self {
        Self {
            clock,
            progress,
            results,
            lessons,
        }
    }

    pub async fn load_progress(&self) -> Progress {
        match self.progress.get_progress().await {
            Ok(Some(progress)) => progress,
            Ok(None) => Progress::new(self.clock.now()),
            Err(err) => {
                warn!(error = %err, "stored story progress unreadable, starting from defaults");
                Progress::new(self.clock.now())
            }
        }
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the write fails.
    pub async fn save_progress(&self, progress: &Progress) -> Result<(), ProgressServiceError> {
        self.progress.save_progress(progress).await?;
        Ok(())
    }

    /// Forget story progress. Test results and lesson flags are kept.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the record cannot be removed.
    pub async fn reset_story(&self) -> Result<(), ProgressServiceError> {
        self.progress.delete_progress().await?;
        info!("story progress reset");
        Ok(())
    }

    pub async fn load_test_results(&self) -> TestResults {
        self.results.get_test_results().await.unwrap_or_else(|err| {
            warn!(error = %err, "stored test results unreadable, starting empty");
            TestResults::new()
        })
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the write fails.
    pub async fn save_test_results(
        &self,
        results: &TestResults,
    ) -> Result<(), ProgressServiceError> {
        self.results.save_test_results(results).await?;
        Ok(())
    }

    pub async fn lesson_flags(&self) -> LessonFlags {
        self.lessons.get_lesson_flags().await.unwrap_or_else(|err| {
            warn!(error = %err, "stored lesson progress unreadable, starting empty");
            LessonFlags::new()
        })
    }

    /// Flag a lesson as done and persist the whole flag map.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the write fails.
    pub async fn mark_lesson_complete(
        &self,
        lesson: &str,
    ) -> Result<LessonFlags, ProgressServiceError> {
        let mut flags = self.lesson_flags().await;
        flags.set(lesson, true);
        self.lessons.save_lesson_flags(&flags).await?;
        Ok(flags)
    }

    pub async fn dashboard(&self, total_lessons: usize) -> DashboardSummary {
        let flags = self.lesson_flags().await;
        let progress = self.load_progress().await;
        let results = self.load_test_results().await;

        DashboardSummary {
            lessons_completed: flags.completed_count(),
            total_lessons,
            lesson_percentage: flags.completion_percentage(total_lessons),
            story_xp: progress.total_xp(),
            chapters_completed: progress.completed().len(),
            tests_taken: results.len(),
            tests_passed: results.passed_count(),
        }
    }
}
