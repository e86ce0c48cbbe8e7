use std::time::Duration;

use lingua_core::model::{CefrLevel, ChapterId, QuestionId, Score};

/// Identifies one scheduled feedback advance.
///
/// Every effective command issues a new generation, so a ticket from before
/// the latest command no longer matches and firing it does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedbackTicket(pub(crate) u64);

impl FeedbackTicket {
    #[must_use]
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// Something that happened while handling a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryEvent {
    ChapterEntered {
        chapter: ChapterId,
        scene: usize,
    },
    SceneEntered {
        chapter: ChapterId,
        scene: usize,
    },
    ChoiceSelected {
        chapter: ChapterId,
        scene: usize,
        choice: usize,
        correct: bool,
        xp_awarded: u32,
    },
    FeedbackScheduled {
        ticket: FeedbackTicket,
        delay: Duration,
    },
    ChapterCompleted {
        chapter: ChapterId,
        first_completion: bool,
        xp_awarded: u32,
    },
    TestStarted {
        chapter: ChapterId,
        level: CefrLevel,
        questions: usize,
    },
    AnswerRecorded {
        question: QuestionId,
        correct: bool,
        skipped: bool,
    },
    TestCompleted {
        chapter: ChapterId,
        score: Score,
        passed: bool,
    },
    PracticeStarted {
        chapter: ChapterId,
    },
    PracticeFinished {
        chapter: ChapterId,
        next: Option<ChapterId>,
    },
    ReturnedToMap,
}

/// Events produced by one command. Empty means the command was a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    events: Vec<StoryEvent>,
}

impl CommandOutcome {
    #[must_use]
    pub fn noop() -> Self {
        Self::default()
    }

    pub(crate) fn from_events(events: Vec<StoryEvent>) -> Self {
        Self { events }
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn events(&self) -> &[StoryEvent] {
        &self.events
    }

    /// The feedback advance this command scheduled, if any.
    #[must_use]
    pub fn feedback_ticket(&self) -> Option<(FeedbackTicket, Duration)> {
        self.events.iter().find_map(|event| match event {
            StoryEvent::FeedbackScheduled { ticket, delay } => Some((*ticket, *delay)),
            _ => None,
        })
    }
}
