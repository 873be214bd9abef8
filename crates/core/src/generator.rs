//! Random arithmetic question generation.

use rand::Rng;
use rand::rngs::ThreadRng;

use crate::model::{
    AgeGroup, Difficulty, DifficultyConfig, MathQuestion, Operation, QuestionId, QuestionKind,
};
use crate::time::Clock;

/// Upper bound for multiplication and division factors (times-table range).
const TABLE_LIMIT: u32 = 12;

//
// ─── WORD PROBLEM TEMPLATES ────────────────────────────────────────────────────
//

const ADDITION_TEMPLATES: [&str; 3] = [
    "Sam has {num1} apples. Mia gives him {num2} more. How many apples does Sam have now?",
    "There are {num1} birds in the park and {num2} more fly in. How many birds are there now?",
    "Mum buys {num1} flowers and Dad buys {num2} flowers. How many flowers did they buy?",
];

const SUBTRACTION_TEMPLATES: [&str; 3] = [
    "A tree has {num1} peaches. A monkey eats {num2} of them. How many peaches are left?",
    "A car park holds {num1} cars and {num2} drive away. How many cars are left?",
    "Leo has {num1} sweets and gives {num2} to his brother. How many sweets does Leo have left?",
];

const MULTIPLICATION_TEMPLATES: [&str; 3] = [
    "Each box holds {num1} balls. How many balls are in {num2} boxes?",
    "Sam solves {num1} problems every day. How many problems does he solve in {num2} days?",
    "Each bunch has {num1} flowers. How many flowers are in {num2} bunches?",
];

const DIVISION_TEMPLATES: [&str; 3] = [
    "Share {num1} apples equally between {num2} children. How many apples does each child get?",
    "Put {num1} books equally on {num2} shelves. How many books go on each shelf?",
    "Pack {num1} sweets equally into {num2} bags. How many sweets go in each bag?",
];

fn templates_for(operation: Operation) -> &'static [&'static str] {
    match operation {
        Operation::Addition => &ADDITION_TEMPLATES,
        Operation::Subtraction => &SUBTRACTION_TEMPLATES,
        Operation::Multiplication => &MULTIPLICATION_TEMPLATES,
        Operation::Division => &DIVISION_TEMPLATES,
    }
}

//
// ─── GENERATOR ─────────────────────────────────────────────────────────────────
//

struct Operands {
    lhs: i64,
    rhs: i64,
    answer: i64,
}

/// Produces questions within an age group's difficulty bounds.
///
/// Generic over the random source so tests can seed it.
pub struct QuestionGenerator<R = ThreadRng> {
    rng: R,
    clock: Clock,
}

impl QuestionGenerator<ThreadRng> {
    /// Generator backed by the thread-local RNG and the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(rand::rng())
    }
}

impl Default for QuestionGenerator<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> QuestionGenerator<R> {
    #[must_use]
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            clock: Clock::default_clock(),
        }
    }

    /// Use the given clock for question id timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Generate one question for `age_group` at `difficulty`.
    pub fn generate_question(&mut self, age_group: AgeGroup, difficulty: Difficulty) -> MathQuestion {
        let config = DifficultyConfig::for_age_group(age_group);
        let operation = self.pick(config.operations());
        let kind = self.pick(config.question_kinds());
        let bound = config.effective_bound(difficulty);
        let Operands { lhs, rhs, answer } = self.operands(operation, bound);

        let prompt = match kind {
            QuestionKind::Numerical => format!("{lhs} {} {rhs} =", operation.symbol()),
            QuestionKind::WordProblem => {
                let template = self.pick(templates_for(operation));
                template
                    .replace("{num1}", &lhs.to_string())
                    .replace("{num2}", &rhs.to_string())
            }
        };

        let id = QuestionId::generate(&mut self.rng, self.clock.now());
        MathQuestion::new(
            id,
            kind,
            operation,
            prompt,
            lhs,
            Some(rhs),
            answer,
            age_group,
            difficulty,
        )
    }

    /// Generate `count` independent questions.
    pub fn generate_questions(
        &mut self,
        age_group: AgeGroup,
        count: usize,
        difficulty: Difficulty,
    ) -> Vec<MathQuestion> {
        (0..count)
            .map(|_| self.generate_question(age_group, difficulty))
            .collect()
    }

    /// Uniform pick from a non-empty static table.
    fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        items[self.rng.random_range(0..items.len())]
    }

    fn operands(&mut self, operation: Operation, bound: u32) -> Operands {
        // Every configured bound is at least 10, so the ranges below are non-empty.
        let bound = bound.max(2);
        let table = TABLE_LIMIT.min(bound);

        let (lhs, rhs, answer) = match operation {
            Operation::Addition => {
                let lhs = self.rng.random_range(1..bound);
                let rhs = self.rng.random_range(1..=bound - lhs);
                (lhs, rhs, lhs + rhs)
            }
            Operation::Subtraction => {
                let lhs = self.rng.random_range(1..=bound);
                let rhs = self.rng.random_range(1..=lhs);
                (lhs, rhs, lhs - rhs)
            }
            Operation::Multiplication => {
                let lhs = self.rng.random_range(1..=table);
                let rhs = self.rng.random_range(1..=table);
                (lhs, rhs, lhs * rhs)
            }
            Operation::Division => {
                let divisor = self.rng.random_range(1..=table);
                let quotient = self.rng.random_range(1..=table);
                (divisor * quotient, divisor, quotient)
            }
        };

        Operands {
            lhs: i64::from(lhs),
            rhs: i64::from(rhs),
            answer: i64::from(answer),
        }
    }
}
