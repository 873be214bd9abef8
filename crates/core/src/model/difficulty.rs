use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::model::{AgeGroup, Operation, QuestionKind};

//
// ─── DIFFICULTY LEVEL ──────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DifficultyError {
    #[error("difficulty must be between 1 and 5, got {0}")]
    OutOfRange(u8),
}

/// Difficulty tag (1-5) that scales the operand range of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Creates a difficulty level.
    ///
    /// # Errors
    ///
    /// Returns `DifficultyError::OutOfRange` if `level` is not in 1..=5.
    pub fn new(level: u8) -> Result<Self, DifficultyError> {
        if (Self::MIN..=Self::MAX).contains(&level) {
            Ok(Self(level))
        } else {
            Err(DifficultyError::OutOfRange(level))
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = DifficultyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Difficulty> for u8 {
    fn from(value: Difficulty) -> Self {
        value.0
    }
}

//
// ─── PER-AGE-GROUP CONFIG ──────────────────────────────────────────────────────
//

/// Fixed generation bounds for one age group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifficultyConfig {
    age_group: AgeGroup,
    max_number: u32,
    operations: &'static [Operation],
    question_kinds: &'static [QuestionKind],
    time_limit_secs: Option<u64>,
}

static PRESCHOOL: DifficultyConfig = DifficultyConfig {
    age_group: AgeGroup::Preschool,
    max_number: 10,
    operations: &[Operation::Addition, Operation::Subtraction],
    question_kinds: &[QuestionKind::Numerical],
    time_limit_secs: Some(30),
};

static ELEMENTARY_LOW: DifficultyConfig = DifficultyConfig {
    age_group: AgeGroup::ElementaryLow,
    max_number: 100,
    operations: &[
        Operation::Addition,
        Operation::Subtraction,
        Operation::Multiplication,
    ],
    question_kinds: &[QuestionKind::Numerical, QuestionKind::WordProblem],
    time_limit_secs: Some(60),
};

static ELEMENTARY_HIGH: DifficultyConfig = DifficultyConfig {
    age_group: AgeGroup::ElementaryHigh,
    max_number: 1000,
    operations: &Operation::ALL,
    question_kinds: &[QuestionKind::Numerical, QuestionKind::WordProblem],
    time_limit_secs: Some(120),
};

impl DifficultyConfig {
    #[must_use]
    pub fn for_age_group(age_group: AgeGroup) -> &'static Self {
        match age_group {
            AgeGroup::Preschool => &PRESCHOOL,
            AgeGroup::ElementaryLow => &ELEMENTARY_LOW,
            AgeGroup::ElementaryHigh => &ELEMENTARY_HIGH,
        }
    }

    #[must_use]
    pub fn age_group(&self) -> AgeGroup {
        self.age_group
    }

    #[must_use]
    pub fn max_number(&self) -> u32 {
        self.max_number
    }

    /// Operations questions may use. Never empty.
    #[must_use]
    pub fn operations(&self) -> &'static [Operation] {
        self.operations
    }

    /// Presentation forms questions may use. Never empty.
    #[must_use]
    pub fn question_kinds(&self) -> &'static [QuestionKind] {
        self.question_kinds
    }

    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs.map(Duration::from_secs)
    }

    /// Operand bound for a difficulty: `min(max_number, difficulty * 20 + 10)`.
    #[must_use]
    pub fn effective_bound(&self, difficulty: Difficulty) -> u32 {
        let scaled = u32::from(difficulty.value()) * 20 + 10;
        self.max_number.min(scaled)
    }

    #[must_use]
    pub fn allows(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }
}
