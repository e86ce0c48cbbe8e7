#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod profile_service;
pub mod progress_service;
pub mod settings;
pub mod story;

pub use lingua_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, EngineError, ProfileServiceError, ProgressServiceError};
pub use profile_service::ProfileService;
pub use progress_service::{DEFAULT_TOTAL_LESSONS, DashboardSummary, ProgressService};
pub use settings::EngineSettings;
pub use story::{
    ChapterMapEntry, CommandOutcome, FeedbackTicket, FeedbackTimer, StoryEngine, StoryEvent,
    StorySnapshot, StoryState, TestReport,
};
