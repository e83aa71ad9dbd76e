use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizDefinitionError {
    #[error("quiz has no questions")]
    NoQuestions,

    #[error("passing score must be between 0 and 100, got {0}")]
    PassingScoreOutOfRange(u8),

    #[error("duplicate question id: {0}")]
    DuplicateQuestion(QuestionId),

    #[error("invalid quiz document: {0}")]
    Json(#[from] serde_json::Error),
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice,
    CodeOutput,
    FillBlank,
    TrueFalse,
}

/// Accepted answer(s) for a question.
///
/// A list means any one of the values is accepted; it is not a multi-select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Single(String),
    AnyOf(Vec<String>),
}

impl CorrectAnswer {
    /// Whether `given` is an accepted answer. An unanswered question never is.
    #[must_use]
    pub fn accepts(&self, given: Option<&str>) -> bool {
        let Some(given) = given else {
            return false;
        };
        match self {
            CorrectAnswer::Single(expected) => expected == given,
            CorrectAnswer::AnyOf(accepted) => accepted.iter().any(|a| a == given),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: CorrectAnswer,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl QuizQuestion {
    #[must_use]
    pub fn is_correct(&self, given: Option<&str>) -> bool {
        self.correct_answer.accepts(given)
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// Immutable quiz definition, authored alongside the course content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: QuizId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub module_id: String,
    /// Countdown length in seconds. `None` means untimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u32>,
    pub passing_score: u8,
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    /// Parse and validate a quiz document.
    ///
    /// # Errors
    ///
    /// Returns `QuizDefinitionError` if the JSON is malformed or the definition
    /// fails [`Quiz::validate`].
    pub fn from_json(raw: &str) -> Result<Self, QuizDefinitionError> {
        let quiz: Quiz = serde_json::from_str(raw)?;
        quiz.validate()?;
        Ok(quiz)
    }

    /// Check the invariants an attempt relies on.
    ///
    /// # Errors
    ///
    /// Returns `QuizDefinitionError` for an empty question list, a passing score
    /// above 100, or repeated question ids.
    pub fn validate(&self) -> Result<(), QuizDefinitionError> {
        if self.questions.is_empty() {
            return Err(QuizDefinitionError::NoQuestions);
        }
        if self.passing_score > 100 {
            return Err(QuizDefinitionError::PassingScoreOutOfRange(
                self.passing_score,
            ));
        }
        let mut seen = HashSet::with_capacity(self.questions.len());
        for q in &self.questions {
            if !seen.insert(&q.id) {
                return Err(QuizDefinitionError::DuplicateQuestion(q.id.clone()));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&QuizQuestion> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn passes(&self, score: u8) -> bool {
        score >= self.passing_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "module-1-quiz",
        "title": "Les bases",
        "description": "Variables et types",
        "moduleId": "module-1",
        "timeLimit": 300,
        "passingScore": 70,
        "questions": [
            {
                "id": "q1",
                "type": "multiple-choice",
                "question": "Which keyword declares a variable?",
                "options": ["let", "var", "const"],
                "correctAnswer": "let",
                "explanation": "Bindings are introduced with let."
            },
            {
                "id": "q2",
                "type": "code-output",
                "question": "What does this print?",
                "code": "fn main() { println!(\"{}\", 1 + 1); }",
                "options": ["2", "11"],
                "correctAnswer": ["2", "2\n"],
                "explanation": "Integer addition.",
                "hint": "No string concatenation here."
            }
        ]
    }"#;

    #[test]
    fn parses_sample_document() {
        let quiz = Quiz::from_json(SAMPLE).unwrap();
        assert_eq!(quiz.id, QuizId::new("module-1-quiz"));
        assert_eq!(quiz.time_limit, Some(300));
        assert_eq!(quiz.question_count(), 2);
        assert_eq!(quiz.questions[1].kind, QuestionKind::CodeOutput);
        assert_eq!(
            quiz.questions[1].correct_answer,
            CorrectAnswer::AnyOf(vec!["2".into(), "2\n".into()])
        );
    }

    #[test]
    fn single_answer_uses_equality() {
        let answer = CorrectAnswer::Single("let".into());
        assert!(answer.accepts(Some("let")));
        assert!(!answer.accepts(Some("Let")));
        assert!(!answer.accepts(None));
    }

    #[test]
    fn any_of_accepts_each_value() {
        let answer = CorrectAnswer::AnyOf(vec!["a".into(), "b".into()]);
        assert!(answer.accepts(Some("a")));
        assert!(answer.accepts(Some("b")));
        assert!(!answer.accepts(Some("c")));
        assert!(!answer.accepts(None));
    }

    #[test]
    fn rejects_empty_quiz() {
        let raw = r#"{"id":"x","title":"t","moduleId":"m","passingScore":50,"questions":[]}"#;
        assert!(matches!(
            Quiz::from_json(raw),
            Err(QuizDefinitionError::NoQuestions)
        ));
    }

    #[test]
    fn rejects_duplicate_question_ids() {
        let mut quiz = Quiz::from_json(SAMPLE).unwrap();
        quiz.questions[1].id = QuestionId::new("q1");
        assert!(matches!(
            quiz.validate(),
            Err(QuizDefinitionError::DuplicateQuestion(id)) if id.as_str() == "q1"
        ));
    }

    #[test]
    fn rejects_passing_score_above_hundred() {
        let mut quiz = Quiz::from_json(SAMPLE).unwrap();
        quiz.passing_score = 101;
        assert!(quiz.validate().is_err());
    }

    #[test]
    fn passes_at_threshold() {
        let quiz = Quiz::from_json(SAMPLE).unwrap();
        assert!(quiz.passes(70));
        assert!(!quiz.passes(69));
    }
}
