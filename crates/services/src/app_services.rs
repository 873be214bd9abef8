use std::sync::Arc;

use chrono::FixedOffset;
use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::progress_store::ProgressStore;
use crate::quiz::{AnswerPolicy, QuizLoopService};

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    progress: Arc<ProgressStore>,
    quiz_loop: Arc<QuizLoopService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        utc_offset: Option<FixedOffset>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, utc_offset))
    }

    /// Build services over an in-memory backend.
    #[must_use]
    pub fn in_memory(clock: Clock, utc_offset: Option<FixedOffset>) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, utc_offset)
    }

    /// Build services over an existing backend.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, utc_offset: Option<FixedOffset>) -> Self {
        let mut store = ProgressStore::new(clock, Arc::clone(&storage.kv));
        if let Some(offset) = utc_offset {
            store = store.with_utc_offset(offset);
        }
        let progress = Arc::new(store);
        let quiz_loop = Arc::new(
            QuizLoopService::new(clock, Arc::clone(&progress))
                .with_policy(AnswerPolicy::RetryUntilCorrect),
        );

        Self {
            progress,
            quiz_loop,
        }
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressStore> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn quiz_loop(&self) -> Arc<QuizLoopService> {
        Arc::clone(&self.quiz_loop)
    }
}
