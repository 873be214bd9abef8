use chrono::{DateTime, Utc};

use mathkids_core::model::{AgeGroup, AnswerRecord, LearningSession, MathQuestion, SessionId};

use crate::error::QuizError;

/// What happens after an answer is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnswerPolicy {
    /// Every answer moves on to the next question.
    #[default]
    SingleAttempt,
    /// Wrong answers stay on the question until it is answered correctly.
    RetryUntilCorrect,
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Snapshot of how far a quiz has come.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

/// Result of submitting one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub record: AnswerRecord,
    pub advanced: bool,
    pub is_complete: bool,
}

//
// ─── QUIZ SESSION ──────────────────────────────────────────────────────────────
//

/// In-memory run over a generated batch of questions.
///
/// Steps through the questions in order. Once the last one is passed the
/// quiz is complete and `outcome()` holds the finished `LearningSession`.
pub struct QuizSession {
    id: SessionId,
    age_group: AgeGroup,
    policy: AnswerPolicy,
    questions: Vec<MathQuestion>,
    current: usize,
    started_at: DateTime<Utc>,
    question_started_at: DateTime<Utc>,
    outcome: Option<LearningSession>,
    persisted: bool,
}

impl QuizSession {
    /// Start a quiz over `questions`.
    ///
    /// `started_at` should come from the services layer clock.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Empty` if no questions are provided.
    pub fn new(
        age_group: AgeGroup,
        questions: Vec<MathQuestion>,
        policy: AnswerPolicy,
        started_at: DateTime<Utc>,
    ) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::Empty);
        }

        Ok(Self {
            id: SessionId::random(),
            age_group,
            policy,
            questions,
            current: 0,
            started_at,
            question_started_at: started_at,
            outcome: None,
            persisted: false,
        })
    }

    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn age_group(&self) -> AgeGroup {
        self.age_group
    }

    #[must_use]
    pub fn policy(&self) -> AnswerPolicy {
        self.policy
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn questions(&self) -> &[MathQuestion] {
        &self.questions
    }

    /// Zero-based position of the question being asked.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&MathQuestion> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    /// The finished session, once every question has been passed.
    #[must_use]
    pub fn outcome(&self) -> Option<&LearningSession> {
        self.outcome.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        let total = self.questions.len();
        QuizProgress {
            total,
            answered: self.current.min(total),
            remaining: total.saturating_sub(self.current),
            is_complete: self.is_complete(),
        }
    }

    /// Whether the finished session has been written to the progress store.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    /// Check `raw` against the current question and advance per the policy.
    ///
    /// Time spent is measured from when the question was first shown, so
    /// retries accumulate.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Completed` after the last question,
    /// `QuizError::EmptyAnswer` for blank input, and
    /// `QuizError::InvalidAnswer` for input that is not a whole number.
    pub fn submit_answer(&mut self, raw: &str, at: DateTime<Utc>) -> Result<SubmitOutcome, QuizError> {
        if self.is_complete() {
            return Err(QuizError::Completed);
        }
        let value = parse_answer(raw)?;

        let elapsed = (at - self.question_started_at).num_milliseconds();
        let time_spent_ms = u64::try_from(elapsed).unwrap_or(0);

        let Some(question) = self.questions.get_mut(self.current) else {
            return Err(QuizError::Completed);
        };
        let record = question.record_answer(value, time_spent_ms, at)?.clone();

        let advanced = match self.policy {
            AnswerPolicy::SingleAttempt => true,
            AnswerPolicy::RetryUntilCorrect => record.is_correct,
        };
        if advanced {
            self.current += 1;
            self.question_started_at = at;
            if self.current >= self.questions.len() {
                self.outcome = Some(self.finalize(at)?);
            }
        }

        Ok(SubmitOutcome {
            record,
            advanced,
            is_complete: self.is_complete(),
        })
    }

    fn finalize(&self, ended_at: DateTime<Utc>) -> Result<LearningSession, QuizError> {
        let total = u32::try_from(self.questions.len()).unwrap_or(u32::MAX);
        let mut session =
            LearningSession::start(self.id.clone(), self.age_group, total, self.started_at);
        for answer in self.questions.iter().filter_map(MathQuestion::answer) {
            session.record_answer(answer.clone())?;
        }
        session.finish(ended_at)?;
        Ok(session)
    }
}

fn parse_answer(raw: &str) -> Result<i64, QuizError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(QuizError::EmptyAnswer);
    }
    trimmed
        .parse()
        .map_err(|_| QuizError::InvalidAnswer(trimmed.to_owned()))
}
