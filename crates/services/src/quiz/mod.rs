mod attempt;
mod runner;

pub use crate::error::QuizError;
pub use attempt::{AttemptProgress, QuizAttempt, QuizOutcome, Tick};
pub use runner::{CountdownTick, QuizRunner, QuizSubmission};
