//! Quiz grading.
//!
//! Grading is a pure function of the question list and the captured answers;
//! the attempt state machine and persistence live in the services crate.

use crate::model::{Answers, QuestionId, Quiz, QuizQuestion};

/// Per-question verdict, used to render the review screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    pub question_id: QuestionId,
    pub given: Option<String>,
    pub correct: bool,
}

/// Result of grading a full set of answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizScore {
    pub correct: u32,
    pub total: u32,
    /// Rounded percentage in `0..=100`.
    pub percent: u8,
}

/// Rounded percentage of `correct` over `total`; 0 when `total` is 0.
#[must_use]
pub fn percent(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (f64::from(correct) / f64::from(total) * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

#[must_use]
pub fn review_question(question: &QuizQuestion, answers: &Answers) -> QuestionReview {
    let given = answers.get(&question.id).cloned();
    QuestionReview {
        question_id: question.id.clone(),
        correct: question.is_correct(given.as_deref()),
        given,
    }
}

/// Grades every question of `quiz`. Unanswered questions count as wrong.
#[must_use]
pub fn grade(quiz: &Quiz, answers: &Answers) -> (QuizScore, Vec<QuestionReview>) {
    let reviews: Vec<QuestionReview> = quiz
        .questions
        .iter()
        .map(|q| review_question(q, answers))
        .collect();
    let correct = u32::try_from(reviews.iter().filter(|r| r.correct).count()).unwrap_or(u32::MAX);
    let total = u32::try_from(reviews.len()).unwrap_or(u32::MAX);
    let score = QuizScore {
        correct,
        total,
        percent: percent(correct, total),
    };
    (score, reviews)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CorrectAnswer, QuestionKind, QuizId};

    fn question(id: &str, answer: CorrectAnswer) -> QuizQuestion {
        QuizQuestion {
            id: QuestionId::new(id),
            kind: QuestionKind::MultipleChoice,
            question: format!("question {id}"),
            code: None,
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_answer: answer,
            explanation: String::new(),
            hint: None,
        }
    }

    fn quiz(questions: Vec<QuizQuestion>) -> Quiz {
        Quiz {
            id: QuizId::new("quiz"),
            title: "Quiz".into(),
            description: String::new(),
            module_id: "module-1".into(),
            time_limit: None,
            passing_score: 70,
            questions,
        }
    }

    fn answers(pairs: &[(&str, &str)]) -> Answers {
        pairs
            .iter()
            .map(|(q, a)| (QuestionId::new(*q), (*a).to_string()))
            .collect()
    }

    #[test]
    fn half_right_scores_fifty() {
        let quiz = quiz(vec![
            question("q1", CorrectAnswer::Single("a".into())),
            question("q2", CorrectAnswer::Single("b".into())),
        ]);
        let (score, reviews) = grade(&quiz, &answers(&[("q1", "a"), ("q2", "c")]));
        assert_eq!(score.percent, 50);
        assert_eq!(score.correct, 1);
        assert!(reviews[0].correct);
        assert!(!reviews[1].correct);
        assert_eq!(reviews[1].given.as_deref(), Some("c"));
    }

    #[test]
    fn any_of_answers_count() {
        let quiz = quiz(vec![question(
            "q1",
            CorrectAnswer::AnyOf(vec!["a".into(), "b".into()]),
        )]);
        assert_eq!(grade(&quiz, &answers(&[("q1", "a")])).0.percent, 100);
        assert_eq!(grade(&quiz, &answers(&[("q1", "b")])).0.percent, 100);
        assert_eq!(grade(&quiz, &answers(&[("q1", "c")])).0.percent, 0);
    }

    #[test]
    fn unanswered_questions_are_wrong() {
        let quiz = quiz(vec![
            question("q1", CorrectAnswer::Single("a".into())),
            question("q2", CorrectAnswer::Single("a".into())),
            question("q3", CorrectAnswer::Single("a".into())),
        ]);
        let (score, reviews) = grade(&quiz, &answers(&[("q1", "a")]));
        assert_eq!(score.percent, 33);
        assert_eq!(reviews[2].given, None);
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(5, 5), 100);
    }
}
