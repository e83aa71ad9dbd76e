#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod playground;
pub mod progress_service;
pub mod quiz;
pub mod theme_service;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, PlaygroundError, ProgressError, QuizError};
pub use playground::{
    Channel, CodeRunner, CrateType, Edition, ExecuteOptions, ExecutionOutput, Mode,
    PlaygroundClient, PlaygroundConfig, PlaygroundSession,
};
pub use progress_service::{PROGRESS_KEY, ProgressService};
pub use quiz::{
    AttemptProgress, CountdownTick, QuizAttempt, QuizOutcome, QuizRunner, QuizSubmission, Tick,
};
pub use theme_service::{THEME_KEY, ThemeService};
