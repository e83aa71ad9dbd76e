use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::playground::{CodeRunner, PlaygroundClient, PlaygroundConfig, PlaygroundSession};
use crate::progress_service::ProgressService;
use crate::quiz::QuizRunner;
use crate::theme_service::ThemeService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    progress: Arc<ProgressService>,
    theme: Arc<ThemeService>,
    quizzes: Arc<QuizRunner>,
    playground: Arc<PlaygroundClient>,
    playground_session: Arc<PlaygroundSession>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the
    /// playground URL is invalid.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        playground: &PlaygroundConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(&storage, clock, playground)
    }

    /// Build services over an already opened backend.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Playground` if the playground URL is invalid.
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        playground: &PlaygroundConfig,
    ) -> Result<Self, AppServicesError> {
        let progress = Arc::new(ProgressService::new(clock, Arc::clone(&storage.kv)));
        let theme = Arc::new(ThemeService::new(Arc::clone(&storage.kv)));
        let quizzes = Arc::new(QuizRunner::new(clock, Arc::clone(&progress)));
        let playground = Arc::new(PlaygroundClient::new(playground)?);
        let runner: Arc<dyn CodeRunner> = playground.clone();
        let playground_session = Arc::new(PlaygroundSession::new(runner));

        Ok(Self {
            progress,
            theme,
            quizzes,
            playground,
            playground_session,
        })
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn theme(&self) -> Arc<ThemeService> {
        Arc::clone(&self.theme)
    }

    #[must_use]
    pub fn quizzes(&self) -> Arc<QuizRunner> {
        Arc::clone(&self.quizzes)
    }

    #[must_use]
    pub fn playground(&self) -> Arc<PlaygroundClient> {
        Arc::clone(&self.playground)
    }

    #[must_use]
    pub fn playground_session(&self) -> Arc<PlaygroundSession> {
        Arc::clone(&self.playground_session)
    }
}
