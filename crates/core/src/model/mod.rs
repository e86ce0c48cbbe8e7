mod ids;
mod level;
mod profile;
mod progress;
mod question;
mod story;
mod test_result;

pub use ids::{ChapterId, ParseIdError, QuestionId};
pub use level::{CefrLevel, LevelParseError};
pub use profile::{Profile, ProfileDraft, ProfileError};
pub use progress::{LessonFlags, Progress, ProgressError};
pub use question::{Question, QuestionDraft, QuestionError, QuestionKind};
pub use story::{
    Chapter, ChapterDraft, Choice, ChoiceDraft, DialogueLine, DialogueLineDraft, Scene,
    SceneDraft, StoryError,
};
pub use test_result::{PASS_THRESHOLD, Score, TestResult, TestResultError, TestResults};
