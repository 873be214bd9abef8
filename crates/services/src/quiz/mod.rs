mod session;
mod workflow;

// Public API of the quiz subsystem.
pub use crate::error::QuizError;
pub use session::{AnswerPolicy, QuizProgress, QuizSession, SubmitOutcome};
pub use workflow::{QuizAnswerResult, QuizLoopService};
