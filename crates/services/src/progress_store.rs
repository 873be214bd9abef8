use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mathkids_core::model::{AgeGroup, LearningSession, SessionId, UserProgress};
use mathkids_core::{Clock, LearningStats};
use storage::keys::{SESSIONS_KEY, all_keys, progress_key};
use storage::repository::{KeyValueStore, Loaded, StorageError, load_json, to_json};

use crate::error::ProgressStoreError;

//
// ─── EXPORT DOCUMENT ───────────────────────────────────────────────────────────
//

/// Whole-store snapshot written by `export_data` and read by `import_data`.
///
/// `progress` is keyed by age-group id (`"3-5"`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub sessions: Vec<LearningSession>,
    pub progress: BTreeMap<String, UserProgress>,
}

//
// ─── PROGRESS STORE ────────────────────────────────────────────────────────────
//

/// Persists finished sessions and per-group progress, and derives stats.
///
/// Reads that back the UI (`get_progress`, `sessions`, `get_learning_stats`)
/// never fail: backend errors and undecodable data are logged and replaced by
/// defaults. Use `load_progress` / `load_sessions` to see the difference.
///
/// `save_session` is a read-modify-write without locking; callers must not
/// run two saves concurrently against the same backend.
#[derive(Clone)]
pub struct ProgressStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Clock,
    offset: FixedOffset,
}

impl ProgressStore {
    /// Store over `kv`, using the system's current local offset for day boundaries.
    #[must_use]
    pub fn new(clock: Clock, kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            clock,
            offset: *Local::now().offset(),
        }
    }

    /// Override the offset used to decide "today" and "this week".
    #[must_use]
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Append a finished session to the history and fold it into its group's progress.
    ///
    /// An unreadable session list or progress record is replaced, not merged.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::Storage` if the backend cannot be read or written.
    pub async fn save_session(&self, session: &LearningSession) -> Result<(), ProgressStoreError> {
        let age_group = session.age_group();
        let now = self.clock.now();

        let mut sessions = match self.load_sessions().await? {
            Loaded::Found(sessions) => sessions,
            Loaded::Empty => Vec::new(),
            Loaded::Corrupt(reason) => {
                warn!(%reason, "replacing unreadable session list");
                Vec::new()
            }
        };
        sessions.push(session.clone());

        let mut progress = match self.load_progress(age_group).await? {
            Loaded::Found(progress) => progress,
            Loaded::Empty => UserProgress::empty(age_group, now),
            Loaded::Corrupt(reason) => {
                warn!(age_group = %age_group, %reason, "replacing unreadable progress");
                UserProgress::empty(age_group, now)
            }
        };
        progress.apply_session(session, now);

        self.kv
            .set_many(&[
                (SESSIONS_KEY.to_owned(), to_json(&sessions)?),
                (progress_key(age_group), to_json(&progress)?),
            ])
            .await?;

        info!(
            session_id = %session.id(),
            age_group = %age_group,
            total = session.total_questions(),
            correct = session.correct_answers(),
            "session saved"
        );
        Ok(())
    }

    /// Progress for `age_group` as stored, without fallback.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::Storage` if the backend cannot be read.
    pub async fn load_progress(
        &self,
        age_group: AgeGroup,
    ) -> Result<Loaded<UserProgress>, ProgressStoreError> {
        Ok(load_json(self.kv.as_ref(), &progress_key(age_group)).await?)
    }

    /// Progress for `age_group`, or zero-valued progress if none is readable.
    pub async fn get_progress(&self, age_group: AgeGroup) -> UserProgress {
        let fallback = || UserProgress::empty(age_group, self.clock.now());
        match self.load_progress(age_group).await {
            Ok(loaded) => loaded.unwrap_or_else(fallback),
            Err(err) => {
                warn!(age_group = %age_group, error = %err, "falling back to empty progress");
                fallback()
            }
        }
    }

    /// Flat session history as stored, without fallback.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::Storage` if the backend cannot be read.
    pub async fn load_sessions(&self) -> Result<Loaded<Vec<LearningSession>>, ProgressStoreError> {
        Ok(load_json(self.kv.as_ref(), SESSIONS_KEY).await?)
    }

    /// Every saved session across groups, oldest first.
    pub async fn sessions(&self) -> Vec<LearningSession> {
        match self.load_sessions().await {
            Ok(loaded) => loaded.unwrap_or_else(Vec::new),
            Err(err) => {
                warn!(error = %err, "falling back to empty session list");
                Vec::new()
            }
        }
    }

    /// Look up a saved session by id.
    pub async fn session(&self, id: &SessionId) -> Option<LearningSession> {
        self.sessions().await.into_iter().find(|s| s.id() == id)
    }

    /// Up to `limit` sessions of `age_group`, newest first.
    pub async fn recent_sessions(&self, age_group: AgeGroup, limit: usize) -> Vec<LearningSession> {
        let mut sessions = self.get_progress(age_group).await.sessions;
        sessions.sort_by_key(|s| std::cmp::Reverse(s.started_at()));
        sessions.truncate(limit);
        sessions
    }

    /// Today, this week, overall, and streak figures for `age_group`.
    pub async fn get_learning_stats(&self, age_group: AgeGroup) -> LearningStats {
        let progress = self.get_progress(age_group).await;
        LearningStats::compute(&progress, self.clock.now_in(self.offset))
    }

    /// Serialize every session and every group's progress as pretty JSON.
    ///
    /// Groups with no stored progress are exported with zero values.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::Storage` if encoding fails.
    pub async fn export_data(&self) -> Result<String, ProgressStoreError> {
        let mut progress = BTreeMap::new();
        for age_group in AgeGroup::ALL {
            progress.insert(
                age_group.id().to_owned(),
                self.get_progress(age_group).await,
            );
        }
        let document = ExportDocument {
            sessions: self.sessions().await,
            progress,
        };

        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        debug!(sessions = document.sessions.len(), "exported data");
        Ok(json)
    }

    /// Replace stored state with an exported document.
    ///
    /// Overwrites the session list and each group present in `progress`;
    /// groups absent from the document keep their stored progress.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::InvalidImport` for malformed JSON, a missing
    /// `sessions` or `progress` field, or a progress entry filed under the wrong
    /// group. Returns `ProgressStoreError::AgeGroup` for an unknown group key.
    pub async fn import_data(&self, json: &str) -> Result<(), ProgressStoreError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ProgressStoreError::InvalidImport(e.to_string()))?;
        for field in ["sessions", "progress"] {
            if value.get(field).is_none() {
                return Err(ProgressStoreError::InvalidImport(format!(
                    "missing `{field}` field"
                )));
            }
        }

        let document: ExportDocument = serde_json::from_value(value)
            .map_err(|e| ProgressStoreError::InvalidImport(e.to_string()))?;

        let mut entries = Vec::with_capacity(document.progress.len() + 1);
        entries.push((SESSIONS_KEY.to_owned(), to_json(&document.sessions)?));
        for (key, progress) in &document.progress {
            let age_group: AgeGroup = key.parse()?;
            if progress.age_group != age_group {
                return Err(ProgressStoreError::InvalidImport(format!(
                    "progress under {key:?} belongs to {}",
                    progress.age_group
                )));
            }
            entries.push((progress_key(age_group), to_json(progress)?));
        }

        self.kv.set_many(&entries).await?;
        info!(
            sessions = document.sessions.len(),
            groups = document.progress.len(),
            "data imported"
        );
        Ok(())
    }

    /// Remove the session list and every group's progress.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::Storage` if the backend cannot be written.
    pub async fn clear_all_data(&self) -> Result<(), ProgressStoreError> {
        self.kv.remove_many(&all_keys()).await?;
        info!("all data cleared");
        Ok(())
    }

    /// File name for an export taken now, e.g. `mathkids-data-2024-03-14.json`.
    #[must_use]
    pub fn export_filename(&self) -> String {
        suggested_export_filename(self.clock.now_in(self.offset))
    }
}

/// File name for an export taken at `now`, dated in `now`'s offset.
#[must_use]
pub fn suggested_export_filename(now: DateTime<FixedOffset>) -> String {
    format!("mathkids-data-{}.json", now.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mathkids_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryStore;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn store_with(kv: &InMemoryStore) -> ProgressStore {
        ProgressStore::new(fixed_clock(), Arc::new(kv.clone())).with_utc_offset(utc())
    }

    fn finished(age_group: AgeGroup, total: u32, start_offset: Duration) -> LearningSession {
        let start = fixed_now() - start_offset;
        let mut s = LearningSession::start(SessionId::random(), age_group, total, start);
        s.finish(start + Duration::minutes(2)).unwrap();
        s
    }

    #[tokio::test]
    async fn missing_progress_is_zero_valued() {
        let store = store_with(&InMemoryStore::new());
        let progress = store.get_progress(AgeGroup::ElementaryHigh).await;
        assert_eq!(progress.age_group, AgeGroup::ElementaryHigh);
        assert_eq!(progress.total_questions_answered, 0);
        assert!(matches!(
            store.load_progress(AgeGroup::ElementaryHigh).await.unwrap(),
            Loaded::Empty
        ));
    }

    #[tokio::test]
    async fn save_updates_only_the_owning_group() {
        let kv = InMemoryStore::new();
        let store = store_with(&kv);
        store
            .save_session(&finished(AgeGroup::Preschool, 10, Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(store.sessions().await.len(), 1);
        assert_eq!(
            store
                .get_progress(AgeGroup::Preschool)
                .await
                .total_questions_answered,
            10
        );
        assert!(matches!(
            store.load_progress(AgeGroup::ElementaryLow).await.unwrap(),
            Loaded::Empty
        ));
        assert_eq!(kv.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn corrupt_session_list_is_replaced_on_save() {
        let kv = InMemoryStore::new();
        kv.set(SESSIONS_KEY, "[{oops").await.unwrap();
        let store = store_with(&kv);
        assert!(store.load_sessions().await.unwrap().is_corrupt());
        assert!(store.sessions().await.is_empty());

        store
            .save_session(&finished(AgeGroup::Preschool, 5, Duration::zero()))
            .await
            .unwrap();
        assert_eq!(store.sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn recent_sessions_are_newest_first_and_limited() {
        let store = store_with(&InMemoryStore::new());
        for hours in [5, 1, 3] {
            store
                .save_session(&finished(AgeGroup::ElementaryLow, 4, Duration::hours(hours)))
                .await
                .unwrap();
        }

        let recent = store.recent_sessions(AgeGroup::ElementaryLow, 2).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].started_at(), fixed_now() - Duration::hours(1));
        assert_eq!(recent[1].started_at(), fixed_now() - Duration::hours(3));
        assert!(store.recent_sessions(AgeGroup::Preschool, 10).await.is_empty());
    }

    #[tokio::test]
    async fn session_lookup_by_id() {
        let store = store_with(&InMemoryStore::new());
        let session = finished(AgeGroup::Preschool, 3, Duration::zero());
        store.save_session(&session).await.unwrap();

        assert_eq!(store.session(session.id()).await, Some(session));
        assert_eq!(store.session(&SessionId::new("session_missing")).await, None);
    }

    #[tokio::test]
    async fn import_rejects_missing_fields_and_unknown_groups() {
        let store = store_with(&InMemoryStore::new());

        let err = store.import_data(r#"{"sessions": []}"#).await.unwrap_err();
        assert!(matches!(err, ProgressStoreError::InvalidImport(_)));

        let err = store.import_data("not json").await.unwrap_err();
        assert!(matches!(err, ProgressStoreError::InvalidImport(_)));

        let mut doc: serde_json::Value =
            serde_json::from_str(&store.export_data().await.unwrap()).unwrap();
        let preschool = doc["progress"]["3-5"].clone();
        doc["progress"]["13-15"] = preschool;
        let err = store.import_data(&doc.to_string()).await.unwrap_err();
        assert!(matches!(err, ProgressStoreError::AgeGroup(_)));
    }

    #[tokio::test]
    async fn import_rejects_progress_filed_under_wrong_group() {
        let store = store_with(&InMemoryStore::new());
        let mut doc: serde_json::Value =
            serde_json::from_str(&store.export_data().await.unwrap()).unwrap();
        doc["progress"]["6-8"] = doc["progress"]["3-5"].clone();

        let err = store.import_data(&doc.to_string()).await.unwrap_err();
        assert!(matches!(err, ProgressStoreError::InvalidImport(_)));
    }

    #[test]
    fn export_filename_uses_local_date() {
        let plus_ten = FixedOffset::east_opt(10 * 3600).unwrap();
        // 15:00 UTC is already the next day at UTC+10.
        assert_eq!(
            suggested_export_filename(fixed_now().with_timezone(&plus_ten)),
            "mathkids-data-2024-03-15.json"
        );
        assert_eq!(
            suggested_export_filename(fixed_now().with_timezone(&utc())),
            "mathkids-data-2024-03-14.json"
        );
    }
}
