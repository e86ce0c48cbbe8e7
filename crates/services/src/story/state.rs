use lingua_core::model::{CefrLevel, ChapterId, Question};

use super::events::FeedbackTicket;
use super::test_session::TestReport;

/// Where the learner is in story mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoryState {
    #[default]
    AtMap,
    InScene {
        chapter: ChapterId,
        scene: usize,
    },
    AwaitingChoiceFeedback {
        chapter: ChapterId,
        scene: usize,
        feedback: PendingFeedback,
    },
    /// Transient: the engine moves on to the chapter test within the same command.
    ChapterComplete {
        chapter: ChapterId,
    },
    InTest {
        chapter: ChapterId,
    },
    TestComplete {
        chapter: ChapterId,
    },
    ConversationPractice {
        chapter: ChapterId,
    },
}

impl StoryState {
    #[must_use]
    pub fn chapter(&self) -> Option<ChapterId> {
        match self {
            StoryState::AtMap => None,
            StoryState::InScene { chapter, .. }
            | StoryState::AwaitingChoiceFeedback { chapter, .. }
            | StoryState::ChapterComplete { chapter }
            | StoryState::InTest { chapter }
            | StoryState::TestComplete { chapter }
            | StoryState::ConversationPractice { chapter } => Some(*chapter),
        }
    }

    #[must_use]
    pub fn is_at_map(&self) -> bool {
        matches!(self, StoryState::AtMap)
    }
}

/// Feedback shown after a choice, until its ticket fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFeedback {
    pub choice: usize,
    pub correct: bool,
    pub message: String,
    pub xp_awarded: u32,
    pub ticket: FeedbackTicket,
}

/// The question on screen during a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub index: usize,
    pub total: usize,
    pub question: Question,
}

/// Read-only view of the engine for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorySnapshot {
    pub state: StoryState,
    pub current_chapter: ChapterId,
    pub current_scene: usize,
    pub total_xp: u32,
    pub question: Option<QuestionView>,
    pub correct_so_far: usize,
    pub pending_feedback: Option<PendingFeedback>,
    pub last_report: Option<TestReport>,
}

/// One row of the chapter map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterMapEntry {
    pub id: ChapterId,
    pub level: CefrLevel,
    pub title: String,
    pub xp_reward: u32,
    pub unlocked: bool,
    pub completed: bool,
    pub current: bool,
}
