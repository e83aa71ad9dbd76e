use std::sync::Arc;

use course_core::model::{Quiz, QuizId, QuizProgress};
use tracing::debug;

use super::attempt::{QuizAttempt, QuizOutcome, Tick};
use crate::Clock;
use crate::error::QuizError;
use crate::progress_service::ProgressService;

/// Result of finishing an attempt through the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSubmission {
    pub outcome: QuizOutcome,
    /// The attempt replaced the stored best score (or was the first one).
    pub new_best: bool,
}

/// What a runner tick did to the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownTick {
    Untimed,
    Remaining(u32),
    /// Time ran out; the attempt was graded and stored.
    Expired(QuizSubmission),
}

/// Drives attempts against the progress store.
///
/// Completing an attempt, by submitting or by running out of time, records
/// the result with best-score-wins semantics. Retrying never touches the
/// stored result.
#[derive(Clone)]
pub struct QuizRunner {
    clock: Clock,
    progress: Arc<ProgressService>,
}

impl QuizRunner {
    #[must_use]
    pub fn new(clock: Clock, progress: Arc<ProgressService>) -> Self {
        Self { clock, progress }
    }

    /// Start a fresh attempt.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Definition` if the quiz cannot be attempted.
    pub fn start(&self, quiz: Arc<Quiz>) -> Result<QuizAttempt, QuizError> {
        QuizAttempt::start(quiz)
    }

    /// Grade and persist the attempt.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` if the attempt already finished.
    pub async fn submit(&self, attempt: &mut QuizAttempt) -> Result<QuizSubmission, QuizError> {
        let outcome = attempt.submit(self.clock.now())?.clone();
        let new_best = self.persist(attempt).await;
        Ok(QuizSubmission { outcome, new_best })
    }

    /// Advance the countdown, persisting the result if time ran out.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` if the attempt already finished.
    pub async fn tick(&self, attempt: &mut QuizAttempt) -> Result<CountdownTick, QuizError> {
        match attempt.tick(self.clock.now())? {
            Tick::Untimed => Ok(CountdownTick::Untimed),
            Tick::Remaining(secs) => Ok(CountdownTick::Remaining(secs)),
            Tick::Expired(outcome) => {
                debug!(quiz_id = %attempt.quiz().id, "quiz countdown expired");
                let new_best = self.persist(attempt).await;
                Ok(CountdownTick::Expired(QuizSubmission { outcome, new_best }))
            }
        }
    }

    /// Best stored result for a quiz, if any attempt was recorded.
    pub async fn best_result(&self, quiz_id: &QuizId) -> Option<QuizProgress> {
        self.progress.quiz_result(quiz_id).await
    }

    async fn persist(&self, attempt: &QuizAttempt) -> bool {
        let Some(record) = attempt.to_progress_record() else {
            return false;
        };
        self.progress.record_quiz_progress(record).await
    }
}
