use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AgeGroup, LearningSession, Operation};
use crate::stats::accuracy_percent;

/// Cumulative progress for one age group.
///
/// Updated in place each time a session completes; never replaced wholesale
/// except by an import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub age_group: AgeGroup,
    pub current_level: u32,
    pub total_questions_answered: u64,
    pub total_correct_answers: u64,
    pub average_accuracy: f64,
    #[serde(rename = "totalLearningTime")]
    pub total_learning_time_ms: u64,
    pub last_study_date: DateTime<Utc>,
    #[serde(default)]
    pub sessions: Vec<LearningSession>,
    /// Kept for format compatibility; nothing fills it yet.
    #[serde(default)]
    pub weak_areas: Vec<Operation>,
}

impl UserProgress {
    /// Zero-valued progress for a group with no history.
    #[must_use]
    pub fn empty(age_group: AgeGroup, now: DateTime<Utc>) -> Self {
        Self {
            age_group,
            current_level: 1,
            total_questions_answered: 0,
            total_correct_answers: 0,
            average_accuracy: 0.0,
            total_learning_time_ms: 0,
            last_study_date: now,
            sessions: Vec::new(),
            weak_areas: Vec::new(),
        }
    }

    /// Fold a completed session into the running totals.
    ///
    /// `now` is used as the study date when the session has no end time.
    pub fn apply_session(&mut self, session: &LearningSession, now: DateTime<Utc>) {
        self.total_questions_answered = self
            .total_questions_answered
            .saturating_add(u64::from(session.total_questions()));
        self.total_correct_answers = self
            .total_correct_answers
            .saturating_add(u64::from(session.correct_answers()));
        self.average_accuracy =
            accuracy_percent(self.total_correct_answers, self.total_questions_answered);
        self.total_learning_time_ms = self
            .total_learning_time_ms
            .saturating_add(session.total_time_ms());
        self.last_study_date = session.ended_at().unwrap_or(now);
        self.sessions.push(session.clone());
    }

    #[must_use]
    pub fn has_history(&self) -> bool {
        !self.sessions.is_empty()
    }
}
