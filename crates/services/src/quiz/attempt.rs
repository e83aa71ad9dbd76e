use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use course_core::model::{Answers, QuestionId, Quiz, QuizProgress, QuizQuestion};
use course_core::scoring::{self, QuestionReview, QuizScore};

use crate::error::QuizError;

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// Graded result of a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOutcome {
    pub score: QuizScore,
    pub passed: bool,
    pub reviews: Vec<QuestionReview>,
    /// The countdown ran out before the learner submitted.
    pub timed_out: bool,
    pub completed_at: DateTime<Utc>,
}

/// Result of one countdown step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// The quiz has no time limit; nothing happened.
    Untimed,
    Remaining(u32),
    /// Time ran out on this tick and the attempt was graded.
    Expired(QuizOutcome),
}

/// Snapshot of where the learner is, useful for a progress bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptProgress {
    /// Zero-based index of the question on screen.
    pub position: usize,
    pub total: usize,
    pub answered: usize,
    pub is_complete: bool,
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// In-memory state machine for one pass through a quiz.
///
/// `InProgress` accepts answers, navigation and countdown ticks. Submitting, or
/// the countdown reaching zero, grades the answers and moves to `Complete`.
/// From `Complete` only [`QuizAttempt::retry`] is accepted.
pub struct QuizAttempt {
    quiz: Arc<Quiz>,
    current: usize,
    answers: Answers,
    time_remaining: Option<u32>,
    outcome: Option<QuizOutcome>,
}

impl QuizAttempt {
    /// Begin an attempt on the first question with the full time limit.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Definition` if the quiz fails validation, e.g. has no
    /// questions to score.
    pub fn start(quiz: Arc<Quiz>) -> Result<Self, QuizError> {
        quiz.validate()?;
        let time_remaining = countdown_start(&quiz);
        Ok(Self {
            quiz,
            current: 0,
            answers: Answers::new(),
            time_remaining,
            outcome: None,
        })
    }

    #[must_use]
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.quiz.question(self.current)
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.current + 1 >= self.quiz.question_count()
    }

    #[must_use]
    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    #[must_use]
    pub fn answer_for(&self, question_id: &QuestionId) -> Option<&str> {
        self.answers.get(question_id).map(String::as_str)
    }

    /// Whether the question on screen has an answer. The UI gates `next` on this;
    /// the state machine itself does not.
    #[must_use]
    pub fn has_answered_current(&self) -> bool {
        self.current_question()
            .is_some_and(|q| self.answers.contains_key(&q.id))
    }

    /// Seconds left on the countdown; `None` for untimed quizzes.
    #[must_use]
    pub fn time_remaining(&self) -> Option<u32> {
        self.time_remaining
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&QuizOutcome> {
        self.outcome.as_ref()
    }

    /// Score of the finished attempt, 0 while in progress.
    #[must_use]
    pub fn score(&self) -> u8 {
        self.outcome.as_ref().map_or(0, |o| o.score.percent)
    }

    #[must_use]
    pub fn progress(&self) -> AttemptProgress {
        AttemptProgress {
            position: self.current,
            total: self.quiz.question_count(),
            answered: self.answers.len(),
            is_complete: self.is_complete(),
        }
    }

    /// Record (or replace) the answer for a question. Does not move position.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` after completion and
    /// `QuizError::UnknownQuestion` for ids outside this quiz.
    pub fn answer(
        &mut self,
        question_id: &QuestionId,
        value: impl Into<String>,
    ) -> Result<(), QuizError> {
        self.ensure_in_progress()?;
        if !self.quiz.questions.iter().any(|q| &q.id == question_id) {
            return Err(QuizError::UnknownQuestion(question_id.clone()));
        }
        self.answers.insert(question_id.clone(), value.into());
        Ok(())
    }

    /// Answer the question currently on screen.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` after completion and
    /// `QuizError::NoQuestionAt` if the position is past the last question.
    pub fn answer_current(&mut self, value: impl Into<String>) -> Result<(), QuizError> {
        self.ensure_in_progress()?;
        let id = self
            .current_question()
            .map(|q| q.id.clone())
            .ok_or(QuizError::NoQuestionAt(self.current))?;
        self.answers.insert(id, value.into());
        Ok(())
    }

    /// Move to the next question. Returns `false` on the last question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` after completion.
    pub fn next(&mut self) -> Result<bool, QuizError> {
        self.ensure_in_progress()?;
        if self.is_last_question() {
            return Ok(false);
        }
        self.current += 1;
        Ok(true)
    }

    /// Move to the previous question. Returns `false` on the first question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` after completion.
    pub fn previous(&mut self) -> Result<bool, QuizError> {
        self.ensure_in_progress()?;
        if self.current == 0 {
            return Ok(false);
        }
        self.current -= 1;
        Ok(true)
    }

    /// Advance the countdown by one second.
    ///
    /// When the countdown reaches zero the attempt is graded on the answers
    /// given so far, the same way [`QuizAttempt::submit`] grades them.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` after completion.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<Tick, QuizError> {
        self.ensure_in_progress()?;
        let Some(remaining) = self.time_remaining else {
            return Ok(Tick::Untimed);
        };
        let remaining = remaining.saturating_sub(1);
        self.time_remaining = Some(remaining);
        if remaining > 0 {
            return Ok(Tick::Remaining(remaining));
        }
        Ok(Tick::Expired(self.finish(now, true).clone()))
    }

    /// Grade the answers and complete the attempt. Valid on any question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` if the attempt is already complete.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<&QuizOutcome, QuizError> {
        self.ensure_in_progress()?;
        Ok(self.finish(now, false))
    }

    /// Start over: first question, no answers, full time limit.
    pub fn retry(&mut self) {
        self.current = 0;
        self.answers.clear();
        self.time_remaining = countdown_start(&self.quiz);
        self.outcome = None;
    }

    /// The record to persist for a completed attempt.
    #[must_use]
    pub fn to_progress_record(&self) -> Option<QuizProgress> {
        let outcome = self.outcome.as_ref()?;
        Some(QuizProgress {
            quiz_id: self.quiz.id.clone(),
            score: outcome.score.percent,
            total_questions: outcome.score.total,
            completed_at: outcome.completed_at,
            answers: self.answers.clone(),
        })
    }

    fn finish(&mut self, now: DateTime<Utc>, timed_out: bool) -> &QuizOutcome {
        let (score, reviews) = scoring::grade(&self.quiz, &self.answers);
        let passed = self.quiz.passes(score.percent);
        self.outcome.insert(QuizOutcome {
            score,
            passed,
            reviews,
            timed_out,
            completed_at: now,
        })
    }

    fn ensure_in_progress(&self) -> Result<(), QuizError> {
        if self.is_complete() {
            return Err(QuizError::Completed);
        }
        Ok(())
    }
}

/// A zero time limit means untimed, like an absent one.
fn countdown_start(quiz: &Quiz) -> Option<u32> {
    quiz.time_limit.filter(|&secs| secs > 0)
}

impl fmt::Debug for QuizAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizAttempt")
            .field("quiz_id", &self.quiz.id)
            .field("current", &self.current)
            .field("answers_len", &self.answers.len())
            .field("time_remaining", &self.time_remaining)
            .field("score", &self.score())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
