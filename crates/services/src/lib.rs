#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod progress_store;
pub mod quiz;

pub use mathkids_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, ProgressStoreError, QuizError};
pub use progress_store::{ExportDocument, ProgressStore, suggested_export_filename};
pub use quiz::{AnswerPolicy, QuizAnswerResult, QuizLoopService, QuizProgress, QuizSession};
