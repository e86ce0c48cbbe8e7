use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::level::CefrLevel;
use crate::time::to_millis;

const DEFAULT_NAME: &str = "Learner";
const DEFAULT_NATIVE_LANGUAGE: &str = "en";
const DEFAULT_TARGET_LANGUAGE: &str = "it";
const DEFAULT_GOAL: &str = "general";
const DEFAULT_DAILY_MINUTES: u32 = 15;
const MAX_DAILY_MINUTES: u32 = 240;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("invalid language code: {0}")]
    InvalidLanguageCode(String),

    #[error("daily goal must be between 1 and {MAX_DAILY_MINUTES} minutes, got {0}")]
    InvalidDailyGoal(u32),
}

/// Learner identity and study preferences.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    name: String,
    native_language: String,
    target_language: String,
    level: CefrLevel,
    learning_goal: String,
    daily_goal_minutes: u32,
    created_at: DateTime<Utc>,
    onboarding_complete: bool,
}

/// Onboarding form values. Blank fields fall back to defaults.
#[derive(Clone, Debug, Default)]
pub struct ProfileDraft {
    pub name: Option<String>,
    pub native_language: Option<String>,
    pub target_language: Option<String>,
    pub level: Option<CefrLevel>,
    pub learning_goal: Option<String>,
    pub daily_goal_minutes: Option<u32>,
}

impl ProfileDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and normalize into a completed profile created at `now`.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` for malformed language codes or an out-of-range daily goal.
    pub fn validate(self, now: DateTime<Utc>) -> Result<Profile, ProfileError> {
        let native_language = normalize_optional(self.native_language)
            .unwrap_or_else(|| DEFAULT_NATIVE_LANGUAGE.into());
        let target_language = normalize_optional(self.target_language)
            .unwrap_or_else(|| DEFAULT_TARGET_LANGUAGE.into());

        Profile::from_persisted(
            normalize_optional(self.name).unwrap_or_else(|| DEFAULT_NAME.into()),
            native_language,
            target_language,
            self.level.unwrap_or(CefrLevel::A1),
            normalize_optional(self.learning_goal).unwrap_or_else(|| DEFAULT_GOAL.into()),
            self.daily_goal_minutes.unwrap_or(DEFAULT_DAILY_MINUTES),
            now,
            true,
        )
    }
}

impl Profile {
    /// Rehydrate a profile from storage.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` if language codes or the daily goal are invalid.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        name: String,
        native_language: String,
        target_language: String,
        level: CefrLevel,
        learning_goal: String,
        daily_goal_minutes: u32,
        created_at: DateTime<Utc>,
        onboarding_complete: bool,
    ) -> Result<Self, ProfileError> {
        let native_language = validate_language_code(native_language)?;
        let target_language = validate_language_code(target_language)?;
        if daily_goal_minutes == 0 || daily_goal_minutes > MAX_DAILY_MINUTES {
            return Err(ProfileError::InvalidDailyGoal(daily_goal_minutes));
        }

        Ok(Self {
            name,
            native_language,
            target_language,
            level,
            learning_goal,
            daily_goal_minutes,
            created_at: to_millis(created_at),
            onboarding_complete,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn native_language(&self) -> &str {
        &self.native_language
    }

    #[must_use]
    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    #[must_use]
    pub fn level(&self) -> CefrLevel {
        self.level
    }

    #[must_use]
    pub fn learning_goal(&self) -> &str {
        &self.learning_goal
    }

    #[must_use]
    pub fn daily_goal_minutes(&self) -> u32 {
        self.daily_goal_minutes
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn onboarding_complete(&self) -> bool {
        self.onboarding_complete
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

// ISO 639 style: two or three ASCII letters, stored lowercase.
fn validate_language_code(code: String) -> Result<String, ProfileError> {
    let trimmed = code.trim();
    let valid = (2..=3).contains(&trimmed.len()) && trimmed.chars().all(|c| c.is_ascii_alphabetic());
    if valid {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(ProfileError::InvalidLanguageCode(code))
    }
}
