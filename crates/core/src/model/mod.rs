mod ids;
mod progress;
mod quiz;
mod theme;

pub use ids::{LessonId, ParseIdError, QuestionId, QuizId};
pub use progress::{Answers, CourseProgress, LessonProgress, QuizProgress};
pub use quiz::{CorrectAnswer, QuestionKind, Quiz, QuizDefinitionError, QuizQuestion};
pub use theme::{ParseThemeError, Theme};
