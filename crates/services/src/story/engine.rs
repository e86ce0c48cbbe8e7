use std::sync::Arc;

use lingua_core::Catalog;
use lingua_core::model::{Chapter, ChapterId, Progress, TestResult, TestResults};
use tracing::{debug, info};

use crate::Clock;
use crate::error::EngineError;
use crate::progress_service::ProgressService;
use crate::settings::EngineSettings;

use super::events::{CommandOutcome, FeedbackTicket, StoryEvent};
use super::state::{ChapterMapEntry, PendingFeedback, QuestionView, StorySnapshot, StoryState};
use super::test_session::{TestReport, TestSession};

/// Story-mode progression state machine.
///
/// Commands that do not apply in the current state are no-ops and return an
/// empty `CommandOutcome`. Every effective command starts a new generation,
/// which invalidates any feedback ticket issued before it. Progress is saved
/// after each command that changes it; if saving fails the transition has
/// still happened in memory and the error is returned.
pub struct StoryEngine {
    catalog: Arc<Catalog>,
    store: Arc<ProgressService>,
    clock: Clock,
    settings: EngineSettings,
    state: StoryState,
    progress: Progress,
    results: TestResults,
    test: Option<TestSession>,
    last_report: Option<TestReport>,
    generation: u64,
}

impl StoryEngine {
    /// Build an engine at the map, restoring saved progress and test results.
    pub async fn load(
        catalog: Arc<Catalog>,
        store: Arc<ProgressService>,
        clock: Clock,
        settings: EngineSettings,
    ) -> Self {
        let progress = store.load_progress().await;
        let results = store.load_test_results().await;
        debug!(
            chapter = %progress.current_chapter(),
            scene = progress.current_scene(),
            xp = progress.total_xp(),
            "story engine loaded"
        );
        Self {
            catalog,
            store,
            clock,
            settings,
            state: StoryState::AtMap,
            progress,
            results,
            test: None,
            last_report: None,
            generation: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &StoryState {
        &self.state
    }

    #[must_use]
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    #[must_use]
    pub fn test_results(&self) -> &TestResults {
        &self.results
    }

    #[must_use]
    pub fn last_report(&self) -> Option<&TestReport> {
        self.last_report.as_ref()
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Mutable access to the clock, for stepping time between commands.
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    #[must_use]
    pub fn test_session(&self) -> Option<&TestSession> {
        self.test.as_ref()
    }

    #[must_use]
    pub fn snapshot(&self) -> StorySnapshot {
        let question = self.test.as_ref().and_then(|session| {
            session.current_question().map(|q| QuestionView {
                index: session.position(),
                total: session.total(),
                question: q.clone(),
            })
        });
        let pending_feedback = match &self.state {
            StoryState::AwaitingChoiceFeedback { feedback, .. } => Some(feedback.clone()),
            _ => None,
        };

        StorySnapshot {
            state: self.state.clone(),
            current_chapter: self.progress.current_chapter(),
            current_scene: self.progress.current_scene(),
            total_xp: self.progress.total_xp(),
            question,
            correct_so_far: self.test.as_ref().map_or(0, TestSession::correct_so_far),
            pending_feedback,
            last_report: self.last_report.clone(),
        }
    }

    /// Every chapter with its lock state, ordered by level then id.
    #[must_use]
    pub fn chapter_map(&self) -> Vec<ChapterMapEntry> {
        let mut entries: Vec<ChapterMapEntry> = self
            .catalog
            .chapters()
            .iter()
            .map(|chapter| ChapterMapEntry {
                id: chapter.id(),
                level: chapter.level(),
                title: chapter.title().to_owned(),
                xp_reward: chapter.xp_reward(),
                unlocked: self.progress.is_unlocked(chapter.id()),
                completed: self.progress.is_completed(chapter.id()),
                current: chapter.id() == self.progress.current_chapter(),
            })
            .collect();
        entries.sort_by_key(|entry| (entry.level, entry.id));
        entries
    }

    //
    // ─── COMMANDS ──────────────────────────────────────────────────────────────────
    //

    /// Enter an unlocked chapter at its first scene.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the new progress cannot be saved.
    pub async fn select_chapter(&mut self, id: ChapterId) -> Result<CommandOutcome, EngineError> {
        if !self.state.is_at_map() {
            return Ok(CommandOutcome::noop());
        }
        let catalog = Arc::clone(&self.catalog);
        let Some(chapter) = catalog.chapter(id) else {
            debug!(chapter = %id, "ignoring unknown chapter");
            return Ok(CommandOutcome::noop());
        };
        if self.progress.enter_chapter(id, self.clock.now()).is_err() {
            debug!(chapter = %id, "ignoring locked chapter");
            return Ok(CommandOutcome::noop());
        }

        self.bump();
        let mut events = vec![StoryEvent::ChapterEntered {
            chapter: id,
            scene: 0,
        }];
        let results_changed = self.enter_scene(chapter, 0, &mut events)?;
        self.persist(results_changed).await?;
        Ok(CommandOutcome::from_events(events))
    }

    /// Re-enter the saved chapter at the saved scene.
    ///
    /// A saved scene past the end of the chapter restarts it from scene 0.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the new progress cannot be saved.
    pub async fn resume(&mut self) -> Result<CommandOutcome, EngineError> {
        if !self.state.is_at_map() || !self.progress.has_started() {
            return Ok(CommandOutcome::noop());
        }
        let id = self.progress.current_chapter();
        let catalog = Arc::clone(&self.catalog);
        let Some(chapter) = catalog.chapter(id) else {
            debug!(chapter = %id, "saved chapter missing from catalog");
            return Ok(CommandOutcome::noop());
        };
        if !self.progress.is_unlocked(id) {
            return Ok(CommandOutcome::noop());
        }

        let saved = self.progress.current_scene();
        let start = if saved < chapter.scenes().len() { saved } else { 0 };

        self.bump();
        let mut events = vec![StoryEvent::ChapterEntered {
            chapter: id,
            scene: start,
        }];
        let results_changed = self.enter_scene(chapter, start, &mut events)?;
        self.persist(results_changed).await?;
        Ok(CommandOutcome::from_events(events))
    }

    /// Pick a choice in the current scene. Correct choices award their xp now.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if awarded xp cannot be saved.
    pub async fn select_choice(&mut self, index: usize) -> Result<CommandOutcome, EngineError> {
        let StoryState::InScene { chapter, scene } = self.state else {
            return Ok(CommandOutcome::noop());
        };
        let catalog = Arc::clone(&self.catalog);
        let Some(choice) = catalog
            .chapter(chapter)
            .and_then(|c| c.scene(scene))
            .and_then(|s| s.choice(index))
        else {
            debug!(chapter = %chapter, scene, index, "ignoring out-of-range choice");
            return Ok(CommandOutcome::noop());
        };

        let ticket = self.next_ticket();
        let xp = choice.earned_xp();
        if xp > 0 {
            self.progress.award_xp(xp, self.clock.now());
        }
        self.state = StoryState::AwaitingChoiceFeedback {
            chapter,
            scene,
            feedback: PendingFeedback {
                choice: index,
                correct: choice.correct,
                message: choice.feedback.clone(),
                xp_awarded: xp,
                ticket,
            },
        };
        debug!(chapter = %chapter, scene, index, correct = choice.correct, xp, "choice selected");

        let events = vec![
            StoryEvent::ChoiceSelected {
                chapter,
                scene,
                choice: index,
                correct: choice.correct,
                xp_awarded: xp,
            },
            StoryEvent::FeedbackScheduled {
                ticket,
                delay: self.settings.feedback_delay(),
            },
        ];
        if xp > 0 {
            self.persist(false).await?;
        }
        Ok(CommandOutcome::from_events(events))
    }

    /// Advance past choice feedback. A ticket from an earlier generation is ignored.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the new scene index cannot be saved.
    pub async fn complete_feedback(
        &mut self,
        ticket: FeedbackTicket,
    ) -> Result<CommandOutcome, EngineError> {
        let (chapter, scene) = match &self.state {
            StoryState::AwaitingChoiceFeedback {
                chapter,
                scene,
                feedback,
            } if feedback.ticket == ticket && ticket.0 == self.generation => (*chapter, *scene),
            _ => {
                debug!(ticket = ticket.0, "ignoring stale feedback ticket");
                return Ok(CommandOutcome::noop());
            }
        };
        let catalog = Arc::clone(&self.catalog);
        let Some(chapter) = catalog.chapter(chapter) else {
            return Ok(CommandOutcome::noop());
        };

        self.bump();
        let mut events = Vec::new();
        let results_changed = self.enter_scene(chapter, scene + 1, &mut events)?;
        self.persist(results_changed).await?;
        Ok(CommandOutcome::from_events(events))
    }

    /// Answer the current test question.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if a finished test result cannot be saved.
    pub async fn submit_answer(&mut self, answer: &str) -> Result<CommandOutcome, EngineError> {
        self.answer(answer, false).await
    }

    /// Skip the current test question; it counts as an empty, incorrect answer.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if a finished test result cannot be saved.
    pub async fn skip_question(&mut self) -> Result<CommandOutcome, EngineError> {
        self.answer("", true).await
    }

    /// Leave whatever is on screen and go back to the chapter map.
    ///
    /// Abandons an unfinished test and cancels pending feedback. Progress is
    /// left as it was.
    pub fn return_to_map(&mut self) -> CommandOutcome {
        if self.state.is_at_map() {
            return CommandOutcome::noop();
        }
        self.bump();
        self.test = None;
        self.state = StoryState::AtMap;
        debug!("returned to map");
        CommandOutcome::from_events(vec![StoryEvent::ReturnedToMap])
    }

    /// After a test: a pass opens conversation practice, a fail goes back to the map.
    pub fn continue_after_test(&mut self) -> CommandOutcome {
        let StoryState::TestComplete { chapter } = self.state else {
            return CommandOutcome::noop();
        };
        let passed = self.last_report.as_ref().is_some_and(|report| report.passed);

        self.bump();
        if passed {
            self.state = StoryState::ConversationPractice { chapter };
            debug!(chapter = %chapter, "conversation practice started");
            CommandOutcome::from_events(vec![StoryEvent::PracticeStarted { chapter }])
        } else {
            self.state = StoryState::AtMap;
            CommandOutcome::from_events(vec![StoryEvent::ReturnedToMap])
        }
    }

    /// End conversation practice and point progress at the next chapter, if any.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the new progress cannot be saved.
    pub async fn finish_practice(&mut self) -> Result<CommandOutcome, EngineError> {
        let StoryState::ConversationPractice { chapter } = self.state else {
            return Ok(CommandOutcome::noop());
        };

        self.bump();
        let next = self.catalog.next_chapter(chapter).map(Chapter::id);
        if let Some(next) = next {
            self.progress.enter_chapter(next, self.clock.now())?;
        }
        self.state = StoryState::AtMap;
        debug!(chapter = %chapter, next = ?next, "conversation practice finished");

        self.persist(false).await?;
        Ok(CommandOutcome::from_events(vec![
            StoryEvent::PracticeFinished { chapter, next },
            StoryEvent::ReturnedToMap,
        ]))
    }

    /// Start the finished chapter's test again from the first question.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if an automatically passed test cannot be saved.
    pub async fn retake_test(&mut self) -> Result<CommandOutcome, EngineError> {
        let StoryState::TestComplete { chapter } = self.state else {
            return Ok(CommandOutcome::noop());
        };
        let catalog = Arc::clone(&self.catalog);
        let Some(chapter) = catalog.chapter(chapter) else {
            return Ok(CommandOutcome::noop());
        };

        self.bump();
        let mut events = Vec::new();
        if self.start_test(chapter, &mut events)? {
            self.store.save_test_results(&self.results).await?;
        }
        Ok(CommandOutcome::from_events(events))
    }

    //
    // ─── TRANSITIONS ───────────────────────────────────────────────────────────────
    //

    fn bump(&mut self) {
        self.generation += 1;
    }

    fn next_ticket(&mut self) -> FeedbackTicket {
        self.bump();
        FeedbackTicket(self.generation)
    }

    /// Show scene `start`, passing through choice-less scenes. Running off the
    /// end completes the chapter, leaving the saved scene on the last one.
    /// Returns whether test results changed.
    fn enter_scene(
        &mut self,
        chapter: &Chapter,
        start: usize,
        events: &mut Vec<StoryEvent>,
    ) -> Result<bool, EngineError> {
        let id = chapter.id();
        let mut index = start;
        while let Some(scene) = chapter.scene(index) {
            self.progress.set_scene(index, self.clock.now());
            events.push(StoryEvent::SceneEntered {
                chapter: id,
                scene: index,
            });
            if !scene.is_pass_through() {
                self.state = StoryState::InScene {
                    chapter: id,
                    scene: index,
                };
                debug!(chapter = %id, scene = index, "entered scene");
                return Ok(false);
            }
            index += 1;
        }

        self.progress
            .set_scene(chapter.scenes().len().saturating_sub(1), self.clock.now());
        self.complete_chapter(chapter, events)
    }

    fn complete_chapter(
        &mut self,
        chapter: &Chapter,
        events: &mut Vec<StoryEvent>,
    ) -> Result<bool, EngineError> {
        let id = chapter.id();
        let now = self.clock.now();
        self.state = StoryState::ChapterComplete { chapter: id };

        let first_completion = self.progress.mark_completed(id, now);
        let xp_awarded = if first_completion {
            chapter.xp_reward()
        } else {
            0
        };
        if xp_awarded > 0 {
            self.progress.award_xp(xp_awarded, now);
        }
        info!(chapter = %id, first_completion, xp_awarded, "chapter complete");
        events.push(StoryEvent::ChapterCompleted {
            chapter: id,
            first_completion,
            xp_awarded,
        });

        self.start_test(chapter, events)
    }

    /// Returns `true` when the bank was empty and the test finished at once.
    fn start_test(
        &mut self,
        chapter: &Chapter,
        events: &mut Vec<StoryEvent>,
    ) -> Result<bool, EngineError> {
        let questions = self.catalog.test_bank(chapter.level()).to_vec();
        let session = TestSession::new(chapter.id(), chapter.level(), questions, self.clock.now());
        events.push(StoryEvent::TestStarted {
            chapter: chapter.id(),
            level: chapter.level(),
            questions: session.total(),
        });
        debug!(chapter = %chapter.id(), questions = session.total(), "test started");

        let finished = session.is_finished();
        self.state = StoryState::InTest {
            chapter: chapter.id(),
        };
        self.last_report = None;
        self.test = Some(session);
        if finished {
            self.finish_test(events)?;
        }
        Ok(finished)
    }

    async fn answer(&mut self, given: &str, skipped: bool) -> Result<CommandOutcome, EngineError> {
        if !matches!(self.state, StoryState::InTest { .. }) {
            return Ok(CommandOutcome::noop());
        }
        let now = self.clock.now();
        let Some(session) = self.test.as_mut() else {
            return Ok(CommandOutcome::noop());
        };
        let Some(outcome) = session.answer(given, skipped, now) else {
            return Ok(CommandOutcome::noop());
        };
        let event = StoryEvent::AnswerRecorded {
            question: outcome.question,
            correct: outcome.correct,
            skipped,
        };
        let finished = session.is_finished();

        self.bump();
        let mut events = vec![event];
        if finished {
            self.finish_test(&mut events)?;
            self.store.save_test_results(&self.results).await?;
        }
        Ok(CommandOutcome::from_events(events))
    }

    fn finish_test(&mut self, events: &mut Vec<StoryEvent>) -> Result<(), EngineError> {
        let Some(session) = self.test.take() else {
            return Ok(());
        };
        let threshold = self.settings.pass_threshold();
        let report = session.report(threshold)?;
        self.results.record(
            report.chapter,
            TestResult::new(
                report.score,
                threshold,
                self.clock.now(),
                report.time_spent_secs,
            ),
        );
        info!(
            chapter = %report.chapter,
            score = report.score.value(),
            passed = report.passed,
            secs = report.time_spent_secs,
            "test complete"
        );
        events.push(StoryEvent::TestCompleted {
            chapter: report.chapter,
            score: report.score,
            passed: report.passed,
        });
        self.state = StoryState::TestComplete {
            chapter: report.chapter,
        };
        self.last_report = Some(report);
        Ok(())
    }

    async fn persist(&self, results_changed: bool) -> Result<(), EngineError> {
        self.store.save_progress(&self.progress).await?;
        if results_changed {
            self.store.save_test_results(&self.results).await?;
        }
        Ok(())
    }
}
