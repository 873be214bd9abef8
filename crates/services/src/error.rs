//! Shared error types for the services crate.

use thiserror::Error;

use mathkids_core::model::{AgeGroupError, AnswerError, LearningSessionError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressStore` writes and explicit loads.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressStoreError {
    #[error("invalid import document: {0}")]
    InvalidImport(String),
    #[error(transparent)]
    AgeGroup(#[from] AgeGroupError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while running a quiz.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz has no questions")]
    Empty,
    #[error("quiz already completed")]
    Completed,
    #[error("answer is empty")]
    EmptyAnswer,
    #[error("answer is not a whole number: {0:?}")]
    InvalidAnswer(String),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Session(#[from] LearningSessionError),
    #[error(transparent)]
    Store(#[from] ProgressStoreError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
