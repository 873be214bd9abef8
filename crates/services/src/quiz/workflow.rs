use std::sync::Arc;

use tracing::debug;

use mathkids_core::QuestionGenerator;
use mathkids_core::model::{AgeGroup, AnswerRecord, Difficulty, LearningSession};

use super::session::{AnswerPolicy, QuizSession};
use crate::Clock;
use crate::error::QuizError;
use crate::progress_store::ProgressStore;

/// Result of answering the current question of a quiz.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizAnswerResult {
    pub record: AnswerRecord,
    pub advanced: bool,
    pub is_complete: bool,
    /// The saved session, set only on the answer that completed the quiz.
    pub saved: Option<LearningSession>,
}

/// Orchestrates quiz start and persisted answering.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    store: Arc<ProgressStore>,
    policy: AnswerPolicy,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(clock: Clock, store: Arc<ProgressStore>) -> Self {
        Self {
            clock,
            store,
            policy: AnswerPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: AnswerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Start a quiz of the group's default length at the lowest difficulty.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Empty` if the group's session length is zero.
    pub fn start_quiz(&self, age_group: AgeGroup) -> Result<QuizSession, QuizError> {
        let count = usize::try_from(age_group.default_session_length()).unwrap_or(usize::MAX);
        self.start_quiz_with(age_group, count, Difficulty::default())
    }

    /// Start a quiz of `count` freshly generated questions.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Empty` if `count` is zero.
    pub fn start_quiz_with(
        &self,
        age_group: AgeGroup,
        count: usize,
        difficulty: Difficulty,
    ) -> Result<QuizSession, QuizError> {
        let questions = QuestionGenerator::new()
            .with_clock(self.clock)
            .generate_questions(age_group, count, difficulty);
        debug!(age_group = %age_group, count, difficulty = difficulty.value(), "quiz started");
        QuizSession::new(age_group, questions, self.policy, self.clock.now())
    }

    /// Answer the current question and save the session when the quiz completes.
    ///
    /// The session is saved once. If saving fails the quiz stays complete but
    /// unsaved; call `persist_outcome` to retry.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` for rejected input or persistence failures.
    pub async fn answer_current(
        &self,
        quiz: &mut QuizSession,
        raw: &str,
    ) -> Result<QuizAnswerResult, QuizError> {
        let outcome = quiz.submit_answer(raw, self.clock.now())?;
        let saved = self.persist_outcome(quiz).await?;

        Ok(QuizAnswerResult {
            record: outcome.record,
            advanced: outcome.advanced,
            is_complete: outcome.is_complete,
            saved,
        })
    }

    /// Save a completed quiz that has not been saved yet.
    ///
    /// Returns the saved session, or `None` when the quiz is still running or
    /// was already saved.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Store` if the session cannot be written; the quiz
    /// stays unsaved so the call can be repeated.
    pub async fn persist_outcome(
        &self,
        quiz: &mut QuizSession,
    ) -> Result<Option<LearningSession>, QuizError> {
        if quiz.is_persisted() {
            return Ok(None);
        }
        let Some(session) = quiz.outcome() else {
            return Ok(None);
        };

        self.store.save_session(session).await?;
        let saved = session.clone();
        quiz.mark_persisted();
        Ok(Some(saved))
    }
}
