mod age_group;
mod difficulty;
mod ids;
mod progress;
mod question;
mod session;

pub use age_group::{AgeGroup, AgeGroupError};
pub use difficulty::{Difficulty, DifficultyConfig, DifficultyError};
pub use ids::{QuestionId, SessionId};
pub use progress::UserProgress;
pub use question::{AnswerError, AnswerRecord, MathQuestion, Operation, QuestionKind};
pub use session::{LearningSession, LearningSessionError, LearningSessionRecord};
