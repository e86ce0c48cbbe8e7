use std::sync::Arc;

use lingua_core::model::{Profile, ProfileDraft, Progress};
use storage::repository::{ProfileRepository, ProgressRepository};
use tracing::{info, warn};

use crate::Clock;
use crate::error::ProfileServiceError;

/// Loads and saves the learner profile, and seeds story progress on onboarding.
#[derive(Clone)]
pub struct ProfileService {
    clock: Clock,
    profiles: Arc<dyn ProfileRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProfileService {
    #[must_use]
    pub fn new(
        clock: Clock,
        profiles: Arc<dyn ProfileRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            profiles,
            progress,
        }
    }

    /// The stored profile, or `None` if missing or unreadable.
    pub async fn load_profile(&self) -> Option<Profile> {
        match self.profiles.get_profile().await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(error = %err, "stored profile unreadable, treating learner as new");
                None
            }
        }
    }

    pub async fn has_completed_onboarding(&self) -> bool {
        self.load_profile()
            .await
            .is_some_and(|profile| profile.onboarding_complete())
    }

    /// Validate the onboarding answers, persist the profile, and create default
    /// story progress if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns `ProfileServiceError::Profile` for invalid answers and
    /// `ProfileServiceError::Storage` if persistence fails.
    pub async fn complete_onboarding(
        &self,
        draft: ProfileDraft,
    ) -> Result<Profile, ProfileServiceError> {
        let now = self.clock.now();
        let profile = draft.validate(now)?;
        self.profiles.save_profile(&profile).await?;

        if self.progress.get_progress().await.ok().flatten().is_none() {
            self.progress.save_progress(&Progress::new(now)).await?;
        }

        info!(
            level = %profile.level(),
            target = profile.target_language(),
            "onboarding complete"
        );
        Ok(profile)
    }
}
