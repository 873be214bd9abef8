use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AgeGroup, Difficulty, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("question {question_id} already has a correct answer")]
    AlreadyCorrect { question_id: QuestionId },
}

//
// ─── OPERATION / KIND ──────────────────────────────────────────────────────────
//

/// Arithmetic operation a question exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Addition,
    Subtraction,
    Multiplication,
    Division,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Addition,
        Operation::Subtraction,
        Operation::Multiplication,
        Operation::Division,
    ];

    /// Symbol used in numerical prompts.
    #[must_use]
    pub fn symbol(self) -> char {
        match self {
            Operation::Addition => '+',
            Operation::Subtraction => '-',
            Operation::Multiplication => '×',
            Operation::Division => '÷',
        }
    }
}

/// How a question is presented to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Symbolic prompt such as `3 + 4 =`.
    Numerical,
    /// Short story built from a template.
    WordProblem,
}

//
// ─── ANSWER RECORD ─────────────────────────────────────────────────────────────
//

/// One submitted answer and how long the learner took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub user_answer: i64,
    pub correct_answer: i64,
    pub is_correct: bool,
    #[serde(rename = "timeSpent")]
    pub time_spent_ms: u64,
    pub timestamp: DateTime<Utc>,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A generated arithmetic problem.
///
/// Everything but the attached answer is fixed at generation time. The answer
/// can be replaced while it is wrong and is locked once it is correct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MathQuestion {
    id: QuestionId,
    #[serde(rename = "type")]
    kind: QuestionKind,
    operation: Operation,
    #[serde(rename = "question")]
    prompt: String,
    operand1: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operand2: Option<i64>,
    correct_answer: i64,
    age_group: AgeGroup,
    difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    answer: Option<AnswerRecord>,
}

impl MathQuestion {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: QuestionId,
        kind: QuestionKind,
        operation: Operation,
        prompt: String,
        operand1: i64,
        operand2: Option<i64>,
        correct_answer: i64,
        age_group: AgeGroup,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            id,
            kind,
            operation,
            prompt,
            operand1,
            operand2,
            correct_answer,
            age_group,
            difficulty,
            answer: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Text shown to the learner.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn operand1(&self) -> i64 {
        self.operand1
    }

    #[must_use]
    pub fn operand2(&self) -> Option<i64> {
        self.operand2
    }

    #[must_use]
    pub fn correct_answer(&self) -> i64 {
        self.correct_answer
    }

    #[must_use]
    pub fn age_group(&self) -> AgeGroup {
        self.age_group
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn answer(&self) -> Option<&AnswerRecord> {
        self.answer.as_ref()
    }

    #[must_use]
    pub fn is_answered_correctly(&self) -> bool {
        self.answer.as_ref().is_some_and(|a| a.is_correct)
    }

    /// Attach an answer, replacing any previous incorrect one.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::AlreadyCorrect` if a correct answer is already attached.
    pub fn record_answer(
        &mut self,
        user_answer: i64,
        time_spent_ms: u64,
        at: DateTime<Utc>,
    ) -> Result<&AnswerRecord, AnswerError> {
        if self.is_answered_correctly() {
            return Err(AnswerError::AlreadyCorrect {
                question_id: self.id.clone(),
            });
        }

        let record = AnswerRecord {
            question_id: self.id.clone(),
            user_answer,
            correct_answer: self.correct_answer,
            is_correct: user_answer == self.correct_answer,
            time_spent_ms,
            timestamp: at,
        };
        Ok(self.answer.insert(record))
    }
}
