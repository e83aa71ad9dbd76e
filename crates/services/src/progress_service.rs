use std::sync::Arc;

use course_core::model::{Answers, CourseProgress, LessonId, QuizId, QuizProgress};
use storage::repository::{KeyValueStore, StorageError};
use tracing::{debug, warn};

use crate::Clock;
use crate::error::ProgressError;

/// Storage key holding the serialized `CourseProgress`.
pub const PROGRESS_KEY: &str = "rust-learning-progress";

const MAX_SCORE: u8 = 100;

/// Read-modify-write access to the learner's progress document.
///
/// Every mutating call loads the whole aggregate, applies one change and writes
/// it back. Failures never reach the caller: reads fall back to an empty
/// aggregate and writes are logged. Use [`ProgressService::try_load`] and
/// [`ProgressService::try_save`] when the caller wants to decide.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            clock,
            store,
            key: PROGRESS_KEY.to_owned(),
        }
    }

    /// Use a different storage key, e.g. one per product.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the aggregate, reporting why it could not be read.
    ///
    /// A missing key is not an error and yields the empty aggregate.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the backend fails and
    /// `ProgressError::Corrupt` if the stored document does not parse.
    pub async fn try_load(&self) -> Result<CourseProgress, ProgressError> {
        match self.store.get(&self.key).await? {
            Some(raw) => Ok(CourseProgress::from_json(&raw)?),
            None => Ok(CourseProgress::empty()),
        }
    }

    /// Load the aggregate, falling back to the empty one on any failure.
    pub async fn load(&self) -> CourseProgress {
        match self.try_load().await {
            Ok(progress) => progress,
            Err(ProgressError::Storage(StorageError::Unavailable)) => {
                debug!(key = %self.key, "storage unavailable, using empty progress");
                CourseProgress::empty()
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "failed to load progress, using empty progress");
                CourseProgress::empty()
            }
        }
    }

    /// Persist the aggregate.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if serialization or the write fails.
    pub async fn try_save(&self, progress: &CourseProgress) -> Result<(), ProgressError> {
        let raw = progress.to_json()?;
        self.store.set(&self.key, &raw).await?;
        Ok(())
    }

    /// Persist the aggregate. Silently skipped when storage is unavailable;
    /// other failures are logged.
    pub async fn save(&self, progress: &CourseProgress) {
        match self.try_save(progress).await {
            Ok(()) | Err(ProgressError::Storage(StorageError::Unavailable)) => {}
            Err(err) => warn!(key = %self.key, error = %err, "failed to save progress"),
        }
    }

    pub async fn mark_lesson_complete(&self, lesson_id: &LessonId) {
        let mut progress = self.load().await;
        progress.mark_lesson_complete(lesson_id, self.clock.now());
        self.save(&progress).await;
    }

    /// Clears completion for `lesson_id`. Nothing is written when the lesson
    /// was never toggled.
    pub async fn mark_lesson_incomplete(&self, lesson_id: &LessonId) {
        let mut progress = self.load().await;
        if progress.mark_lesson_incomplete(lesson_id) {
            self.save(&progress).await;
        }
    }

    pub async fn is_lesson_complete(&self, lesson_id: &LessonId) -> bool {
        self.load().await.is_lesson_complete(lesson_id)
    }

    /// Record a finished attempt. Returns `true` when it became the stored best.
    pub async fn save_quiz_result(
        &self,
        quiz_id: &QuizId,
        score: u8,
        total_questions: u32,
        answers: Answers,
    ) -> bool {
        self.record_quiz_progress(QuizProgress {
            quiz_id: quiz_id.clone(),
            score,
            total_questions,
            completed_at: self.clock.now(),
            answers,
        })
        .await
    }

    /// Record an already stamped attempt as-is. Scores above 100 are clamped.
    /// Returns `true` when it became the stored best.
    pub async fn record_quiz_progress(&self, mut result: QuizProgress) -> bool {
        result.score = result.score.min(MAX_SCORE);
        let mut progress = self.load().await;
        let stored = progress.record_quiz_result(result);
        if stored {
            self.save(&progress).await;
        }
        stored
    }

    pub async fn quiz_result(&self, quiz_id: &QuizId) -> Option<QuizProgress> {
        self.load().await.quiz_result(quiz_id).cloned()
    }

    pub async fn completion_percentage(&self, total_lessons: u32) -> u32 {
        self.load().await.completion_percentage(total_lessons)
    }

    pub async fn last_visited(&self) -> Option<LessonId> {
        self.load().await.last_visited().cloned()
    }

    /// Delete the stored aggregate entirely.
    pub async fn reset_progress(&self) {
        match self.store.delete(&self.key).await {
            Ok(()) | Err(StorageError::Unavailable) => {}
            Err(err) => warn!(key = %self.key, error = %err, "failed to reset progress"),
        }
    }
}
