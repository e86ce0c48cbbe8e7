use chrono::{DateTime, Duration, Utc};
use lingua_core::model::{
    CefrLevel, ChapterId, Question, QuestionId, Score, TestResultError,
};

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// How the learner did on one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOutcome {
    pub question: QuestionId,
    pub given: String,
    pub accepted: String,
    pub correct: bool,
    pub skipped: bool,
    pub time_spent: Duration,
}

/// Full result of a finished chapter test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestReport {
    pub chapter: ChapterId,
    pub level: CefrLevel,
    pub score: Score,
    pub passed: bool,
    pub correct: usize,
    pub incorrect: usize,
    pub total: usize,
    pub time_spent_secs: u64,
    pub outcomes: Vec<QuestionOutcome>,
    /// Passing unlocks the next proficiency tier; there is none after C2.
    pub next_level_unlocked: bool,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One pass through a level's question bank, in catalog order.
#[derive(Debug, Clone)]
pub struct TestSession {
    chapter: ChapterId,
    level: CefrLevel,
    questions: Vec<Question>,
    outcomes: Vec<QuestionOutcome>,
    started_at: DateTime<Utc>,
    shown_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl TestSession {
    #[must_use]
    pub fn new(
        chapter: ChapterId,
        level: CefrLevel,
        questions: Vec<Question>,
        now: DateTime<Utc>,
    ) -> Self {
        let finished_at = questions.is_empty().then_some(now);
        Self {
            chapter,
            level,
            questions,
            outcomes: Vec::new(),
            started_at: now,
            shown_at: now,
            finished_at,
        }
    }

    #[must_use]
    pub fn chapter(&self) -> ChapterId {
        self.chapter
    }

    #[must_use]
    pub fn level(&self) -> CefrLevel {
        self.level
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    /// Zero-based index of the question currently shown.
    #[must_use]
    pub fn position(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.outcomes.len())
    }

    #[must_use]
    pub fn correct_so_far(&self) -> usize {
        self.outcomes.iter().filter(|o| o.correct).count()
    }

    #[must_use]
    pub fn outcomes(&self) -> &[QuestionOutcome] {
        &self.outcomes
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Grade `given` against the current question and move to the next one.
    ///
    /// Returns `None` once every question has been answered.
    pub fn answer(
        &mut self,
        given: &str,
        skipped: bool,
        now: DateTime<Utc>,
    ) -> Option<&QuestionOutcome> {
        let question = self.questions.get(self.outcomes.len())?;
        let elapsed = now.signed_duration_since(self.shown_at).max(Duration::zero());
        self.outcomes.push(QuestionOutcome {
            question: question.id(),
            given: given.to_owned(),
            accepted: question.answer().to_owned(),
            correct: !skipped && question.accepts(given),
            skipped,
            time_spent: elapsed,
        });
        self.shown_at = now;
        if self.outcomes.len() == self.questions.len() {
            self.finished_at = Some(now);
        }
        self.outcomes.last()
    }

    /// Score the finished session. An empty bank scores 100.
    ///
    /// # Errors
    ///
    /// Returns `TestResultError` if the tallies are inconsistent.
    pub fn report(&self, pass_threshold: u8) -> Result<TestReport, TestResultError> {
        let total = self.questions.len();
        let correct = self.correct_so_far();
        let score = Score::from_counts(correct, total)?;
        let passed = score.passes(pass_threshold);
        let finished_at = self.finished_at.unwrap_or(self.shown_at);
        let elapsed_ms = finished_at
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0);
        let time_spent_secs = u64::try_from((elapsed_ms + 500) / 1000).unwrap_or(0);

        Ok(TestReport {
            chapter: self.chapter,
            level: self.level,
            score,
            passed,
            correct,
            incorrect: total - correct,
            total,
            time_spent_secs,
            outcomes: self.outcomes.clone(),
            next_level_unlocked: passed && self.level.next().is_some(),
        })
    }
}
