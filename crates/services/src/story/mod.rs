//! Story mode: chapters of scripted scenes, branching choices with timed
//! feedback, and a level test gating conversation practice.

mod engine;
mod events;
mod state;
mod test_session;
mod timer;

pub use engine::StoryEngine;
pub use events::{CommandOutcome, FeedbackTicket, StoryEvent};
pub use state::{ChapterMapEntry, PendingFeedback, QuestionView, StorySnapshot, StoryState};
pub use test_session::{QuestionOutcome, TestReport, TestSession};
pub use timer::FeedbackTimer;
