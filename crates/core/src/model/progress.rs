use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::ids::{LessonId, QuestionId, QuizId};

/// Answers captured during a quiz attempt, keyed by question.
pub type Answers = BTreeMap<QuestionId, String>;

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Completion state of a single lesson.
///
/// One record exists per lesson that was ever toggled. Records are flipped in
/// place and only disappear through a full progress reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    pub lesson_id: LessonId,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Best recorded attempt for a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizProgress {
    pub quiz_id: QuizId,
    /// Percentage in `0..=100`.
    pub score: u8,
    pub total_questions: u32,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub answers: Answers,
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Everything the learner has done, persisted as one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    #[serde(default)]
    lessons_completed: Vec<LessonProgress>,
    #[serde(default)]
    quizzes_completed: Vec<QuizProgress>,
    #[serde(
        default,
        deserialize_with = "blank_lesson_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    last_visited: Option<LessonId>,
}

/// Older documents store `"lastVisited": ""` for a learner with no history.
fn blank_lesson_as_none<'de, D>(deserializer: D) -> Result<Option<LessonId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|id| !id.trim().is_empty()).map(LessonId::new))
}

impl CourseProgress {
    /// The state of a learner who has not done anything yet.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a persisted document.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the document is not a valid aggregate.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Serialize for persistence.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    #[must_use]
    pub fn lessons(&self) -> &[LessonProgress] {
        &self.lessons_completed
    }

    #[must_use]
    pub fn quizzes(&self) -> &[QuizProgress] {
        &self.quizzes_completed
    }

    #[must_use]
    pub fn last_visited(&self) -> Option<&LessonId> {
        self.last_visited.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lessons_completed.is_empty()
            && self.quizzes_completed.is_empty()
            && self.last_visited.is_none()
    }

    /// Marks the lesson complete at `at` and remembers it as the last visited lesson.
    pub fn mark_lesson_complete(&mut self, lesson_id: &LessonId, at: DateTime<Utc>) {
        match self.lesson_mut(lesson_id) {
            Some(existing) => {
                existing.completed = true;
                existing.completed_at = Some(at);
            }
            None => self.lessons_completed.push(LessonProgress {
                lesson_id: lesson_id.clone(),
                completed: true,
                completed_at: Some(at),
            }),
        }
        self.last_visited = Some(lesson_id.clone());
    }

    /// Clears completion for a lesson that has a record.
    ///
    /// Returns `false` when no record exists; nothing is created in that case.
    pub fn mark_lesson_incomplete(&mut self, lesson_id: &LessonId) -> bool {
        let Some(existing) = self.lesson_mut(lesson_id) else {
            return false;
        };
        existing.completed = false;
        existing.completed_at = None;
        true
    }

    #[must_use]
    pub fn is_lesson_complete(&self, lesson_id: &LessonId) -> bool {
        self.lessons_completed
            .iter()
            .any(|l| &l.lesson_id == lesson_id && l.completed)
    }

    #[must_use]
    pub fn completed_lesson_count(&self) -> usize {
        self.lessons_completed.iter().filter(|l| l.completed).count()
    }

    /// Share of `total_lessons` that is complete, rounded to the nearest percent.
    ///
    /// Zero lessons yields 0 rather than a division by zero. Stale records for
    /// lessons no longer in the course can push the value above 100.
    #[must_use]
    pub fn completion_percentage(&self, total_lessons: u32) -> u32 {
        if total_lessons == 0 {
            return 0;
        }
        let completed = self.completed_lesson_count() as f64;
        let pct = (completed / f64::from(total_lessons) * 100.0).round();
        pct as u32
    }

    /// Best-score-wins upsert.
    ///
    /// A result for a new quiz is always stored. For a known quiz the record is
    /// replaced only when `result.score` is strictly higher; ties keep the
    /// earlier attempt. Returns whether the aggregate changed.
    pub fn record_quiz_result(&mut self, result: QuizProgress) -> bool {
        match self
            .quizzes_completed
            .iter_mut()
            .find(|q| q.quiz_id == result.quiz_id)
        {
            Some(existing) if result.score > existing.score => {
                *existing = result;
                true
            }
            Some(_) => false,
            None => {
                self.quizzes_completed.push(result);
                true
            }
        }
    }

    #[must_use]
    pub fn quiz_result(&self, quiz_id: &QuizId) -> Option<&QuizProgress> {
        self.quizzes_completed.iter().find(|q| &q.quiz_id == quiz_id)
    }

    fn lesson_mut(&mut self, lesson_id: &LessonId) -> Option<&mut LessonProgress> {
        self.lessons_completed
            .iter_mut()
            .find(|l| &l.lesson_id == lesson_id)
    }
}
