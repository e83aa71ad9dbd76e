//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{QuestionId, QuizDefinitionError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService` when loading or saving explicitly.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("stored progress is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Errors emitted by the quiz attempt state machine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz already completed")]
    Completed,
    #[error("question {0} is not part of this quiz")]
    UnknownQuestion(QuestionId),
    #[error("no question at position {0}")]
    NoQuestionAt(usize),
    #[error(transparent)]
    Definition(#[from] QuizDefinitionError),
}

/// Errors emitted by `PlaygroundClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlaygroundError {
    #[error("invalid playground URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("playground request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("playground returned an empty share id")]
    EmptyShareId,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Playground(#[from] PlaygroundError),
}
