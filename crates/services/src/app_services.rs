use std::sync::Arc;

use lingua_core::Catalog;
use storage::repository::Storage;
use tracing::info;

use crate::Clock;
use crate::error::AppServicesError;
use crate::profile_service::ProfileService;
use crate::progress_service::ProgressService;
use crate::settings::EngineSettings;
use crate::story::StoryEngine;

/// Assembles app-facing services over one storage backend and catalog.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    settings: EngineSettings,
    catalog: Arc<Catalog>,
    profiles: Arc<ProfileService>,
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        catalog: Catalog,
        settings: EngineSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        info!(
            db = db_url,
            chapters = catalog.chapters().len(),
            "storage ready"
        );
        Ok(Self::with_storage(&storage, clock, catalog, settings))
    }

    /// Build services over an existing storage aggregate.
    #[must_use]
    pub fn with_storage(
        storage: &Storage,
        clock: Clock,
        catalog: Catalog,
        settings: EngineSettings,
    ) -> Self {
        let profiles = Arc::new(ProfileService::new(
            clock,
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.progress),
        ));
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.test_results),
            Arc::clone(&storage.lessons),
        ));

        Self {
            clock,
            settings,
            catalog: Arc::new(catalog),
            profiles,
            progress,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn profiles(&self) -> Arc<ProfileService> {
        Arc::clone(&self.profiles)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    /// A story engine positioned at the map with the saved progress.
    pub async fn story_engine(&self) -> StoryEngine {
        StoryEngine::load(
            Arc::clone(&self.catalog),
            Arc::clone(&self.progress),
            self.clock,
            self.settings,
        )
        .await
    }
}
