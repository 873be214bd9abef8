#![forbid(unsafe_code)]

pub mod error;
pub mod generator;
pub mod model;
pub mod stats;
pub mod time;

pub use error::Error;
pub use generator::QuestionGenerator;
pub use stats::{LearningStats, PerformanceLevel};
pub use time::Clock;
