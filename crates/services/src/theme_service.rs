use std::sync::Arc;

use course_core::model::Theme;
use storage::repository::{KeyValueStore, StorageError};
use tracing::warn;

/// Storage key holding the theme preference as its plain name.
pub const THEME_KEY: &str = "rust-learning-theme";

#[derive(Clone)]
pub struct ThemeService {
    store: Arc<dyn KeyValueStore>,
}

impl ThemeService {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored preference, or `Theme::System` when unset or unreadable.
    pub async fn theme(&self) -> Theme {
        match self.store.get(THEME_KEY).await {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|err| {
                warn!(error = %err, "ignoring stored theme");
                Theme::System
            }),
            Ok(None) | Err(StorageError::Unavailable) => Theme::System,
            Err(err) => {
                warn!(error = %err, "failed to load theme");
                Theme::System
            }
        }
    }

    pub async fn set_theme(&self, theme: Theme) {
        match self.store.set(THEME_KEY, theme.as_str()).await {
            Ok(()) | Err(StorageError::Unavailable) => {}
            Err(err) => warn!(error = %err, "failed to save theme"),
        }
    }
}
