use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::{AgeGroup, AnswerRecord, QuestionId, SessionId};
use crate::stats::{PerformanceLevel, accuracy_percent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LearningSessionError {
    #[error("end time is before start time")]
    InvalidTimeRange,

    #[error("correct answers ({correct}) exceed total questions ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("more answers than questions in session (total {total})")]
    TooManyAnswers { total: u32 },

    #[error("stored correct answers ({stored}) disagree with answer records ({counted})")]
    CorrectCountMismatch { stored: u32, counted: u32 },

    #[error("question {0} answered more than once")]
    DuplicateAnswer(QuestionId),

    #[error("session already finished")]
    Finished,
}

/// Persisted shape of a learning session.
///
/// Field names follow the export document (`startTime`, `totalQuestions`, ...).
/// Converting into a [`LearningSession`] validates the counters. When answer
/// records are present they must fit the target and agree with `correctAnswers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningSessionRecord {
    pub id: SessionId,
    pub age_group: AgeGroup,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub total_questions: u32,
    pub correct_answers: u32,
    #[serde(rename = "totalTime")]
    pub total_time_ms: u64,
    #[serde(default)]
    pub answers: Vec<AnswerRecord>,
}

/// One practice run for an age group.
///
/// Starts with zero counters, accumulates answers, and is finished exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LearningSessionRecord", into = "LearningSessionRecord")]
pub struct LearningSession {
    id: SessionId,
    age_group: AgeGroup,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    total_questions: u32,
    correct_answers: u32,
    total_time_ms: u64,
    answers: Vec<AnswerRecord>,
}

impl LearningSession {
    /// Begin a session targeting `total_questions` questions.
    #[must_use]
    pub fn start(
        id: SessionId,
        age_group: AgeGroup,
        total_questions: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            age_group,
            started_at,
            ended_at: None,
            total_questions,
            correct_answers: 0,
            total_time_ms: 0,
            answers: Vec::new(),
        }
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
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn total_time_ms(&self) -> u64 {
        self.total_time_ms
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Percentage of correct answers against the session target.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        accuracy_percent(
            u64::from(self.correct_answers),
            u64::from(self.total_questions),
        )
    }

    #[must_use]
    pub fn performance(&self) -> PerformanceLevel {
        PerformanceLevel::from_accuracy(self.accuracy())
    }

    /// Record an answer. A second answer for the same question replaces the first.
    ///
    /// # Errors
    ///
    /// Returns `LearningSessionError::Finished` once the session has ended, or
    /// `LearningSessionError::TooManyAnswers` if a new question would exceed the target.
    pub fn record_answer(&mut self, record: AnswerRecord) -> Result<(), LearningSessionError> {
        if self.is_finished() {
            return Err(LearningSessionError::Finished);
        }

        match self
            .answers
            .iter_mut()
            .find(|a| a.question_id == record.question_id)
        {
            Some(existing) => *existing = record,
            None => {
                if self.answers.len() >= self.total_questions as usize {
                    return Err(LearningSessionError::TooManyAnswers {
                        total: self.total_questions,
                    });
                }
                self.answers.push(record);
            }
        }

        self.correct_answers = count_correct(&self.answers);
        Ok(())
    }

    /// Stamp the end time and total elapsed time.
    ///
    /// # Errors
    ///
    /// Returns `LearningSessionError::Finished` if already finished, or
    /// `LearningSessionError::InvalidTimeRange` if `ended_at` precedes the start.
    pub fn finish(&mut self, ended_at: DateTime<Utc>) -> Result<(), LearningSessionError> {
        if self.is_finished() {
            return Err(LearningSessionError::Finished);
        }
        if ended_at < self.started_at {
            return Err(LearningSessionError::InvalidTimeRange);
        }

        let elapsed = (ended_at - self.started_at).num_milliseconds();
        self.total_time_ms = u64::try_from(elapsed).unwrap_or(0);
        self.ended_at = Some(ended_at);
        Ok(())
    }
}

fn count_correct(answers: &[AnswerRecord]) -> u32 {
    let n = answers.iter().filter(|a| a.is_correct).count();
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl TryFrom<LearningSessionRecord> for LearningSession {
    type Error = LearningSessionError;

    fn try_from(record: LearningSessionRecord) -> Result<Self, Self::Error> {
        if record.correct_answers > record.total_questions {
            return Err(LearningSessionError::CorrectExceedsTotal {
                correct: record.correct_answers,
                total: record.total_questions,
            });
        }
        if record.end_time.is_some_and(|end| end < record.start_time) {
            return Err(LearningSessionError::InvalidTimeRange);
        }
        if record.answers.len() > record.total_questions as usize {
            return Err(LearningSessionError::TooManyAnswers {
                total: record.total_questions,
            });
        }

        let mut seen = HashSet::with_capacity(record.answers.len());
        for answer in &record.answers {
            if !seen.insert(&answer.question_id) {
                return Err(LearningSessionError::DuplicateAnswer(
                    answer.question_id.clone(),
                ));
            }
        }

        // Summary-only records (no answers) keep their stored count.
        if !record.answers.is_empty() {
            let counted = count_correct(&record.answers);
            if counted != record.correct_answers {
                return Err(LearningSessionError::CorrectCountMismatch {
                    stored: record.correct_answers,
                    counted,
                });
            }
        }

        Ok(Self {
            id: record.id,
            age_group: record.age_group,
            started_at: record.start_time,
            ended_at: record.end_time,
            total_questions: record.total_questions,
            correct_answers: record.correct_answers,
            total_time_ms: record.total_time_ms,
            answers: record.answers,
        })
    }
}

impl From<LearningSession> for LearningSessionRecord {
    fn from(session: LearningSession) -> Self {
        Self {
            id: session.id,
            age_group: session.age_group,
            start_time: session.started_at,
            end_time: session.ended_at,
            total_questions: session.total_questions,
            correct_answers: session.correct_answers,
            total_time_ms: session.total_time_ms,
            answers: session.answers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn answer(id: &str, correct: bool) -> AnswerRecord {
        AnswerRecord {
            question_id: QuestionId::new(id),
            user_answer: if correct { 4 } else { 5 },
            correct_answer: 4,
            is_correct: correct,
            time_spent_ms: 1_000,
            timestamp: fixed_now(),
        }
    }

    fn session(total: u32) -> LearningSession {
        LearningSession::start(
            SessionId::new("session_test"),
            AgeGroup::Preschool,
            total,
            fixed_now(),
        )
    }

    #[test]
    fn counts_correct_answers_and_overwrites_per_question() {
        let mut s = session(3);
        s.record_answer(answer("q1", false)).unwrap();
        s.record_answer(answer("q2", true)).unwrap();
        assert_eq!(s.correct_answers(), 1);

        s.record_answer(answer("q1", true)).unwrap();
        assert_eq!(s.correct_answers(), 2);
        assert_eq!(s.answers().len(), 2);
    }

    #[test]
    fn rejects_answers_beyond_target() {
        let mut s = session(1);
        s.record_answer(answer("q1", true)).unwrap();
        let err = s.record_answer(answer("q2", true)).unwrap_err();
        assert_eq!(err, LearningSessionError::TooManyAnswers { total: 1 });
    }

    #[test]
    fn finish_sets_elapsed_time_once() {
        let mut s = session(2);
        s.finish(fixed_now() + Duration::seconds(42)).unwrap();
        assert_eq!(s.total_time_ms(), 42_000);
        assert!(s.is_finished());
        assert_eq!(
            s.finish(fixed_now() + Duration::seconds(50)),
            Err(LearningSessionError::Finished)
        );
        assert_eq!(
            s.record_answer(answer("q1", true)),
            Err(LearningSessionError::Finished)
        );
    }

    #[test]
    fn finish_rejects_end_before_start() {
        let mut s = session(2);
        assert_eq!(
            s.finish(fixed_now() - Duration::seconds(1)),
            Err(LearningSessionError::InvalidTimeRange)
        );
    }

    #[test]
    fn persisted_record_is_validated() {
        let record = LearningSessionRecord {
            id: SessionId::new("s"),
            age_group: AgeGroup::ElementaryLow,
            start_time: fixed_now(),
            end_time: None,
            total_questions: 5,
            correct_answers: 6,
            total_time_ms: 0,
            answers: Vec::new(),
        };
        assert_eq!(
            LearningSession::try_from(record),
            Err(LearningSessionError::CorrectExceedsTotal {
                correct: 6,
                total: 5
            })
        );
    }

    fn record(total: u32, correct: u32, answers: Vec<AnswerRecord>) -> LearningSessionRecord {
        LearningSessionRecord {
            id: SessionId::new("s"),
            age_group: AgeGroup::Preschool,
            start_time: fixed_now(),
            end_time: Some(fixed_now() + Duration::seconds(30)),
            total_questions: total,
            correct_answers: correct,
            total_time_ms: 30_000,
            answers,
        }
    }

    #[test]
    fn persisted_record_rejects_end_before_start() {
        let mut r = record(2, 0, Vec::new());
        r.end_time = Some(fixed_now() - Duration::seconds(1));
        assert_eq!(
            LearningSession::try_from(r),
            Err(LearningSessionError::InvalidTimeRange)
        );
    }

    #[test]
    fn persisted_record_rejects_repeated_question() {
        let r = record(3, 1, vec![answer("q1", true), answer("q1", false)]);
        assert_eq!(
            LearningSession::try_from(r),
            Err(LearningSessionError::DuplicateAnswer(QuestionId::new("q1")))
        );
    }

    #[test]
    fn persisted_record_rejects_more_answers_than_questions() {
        let r = record(1, 1, vec![answer("q1", true), answer("q2", false)]);
        assert_eq!(
            LearningSession::try_from(r),
            Err(LearningSessionError::TooManyAnswers { total: 1 })
        );
    }

    #[test]
    fn persisted_record_rejects_correct_count_that_disagrees_with_answers() {
        let r = record(3, 2, vec![answer("q1", true), answer("q2", false)]);
        assert_eq!(
            LearningSession::try_from(r),
            Err(LearningSessionError::CorrectCountMismatch {
                stored: 2,
                counted: 1
            })
        );

        let ok = LearningSession::try_from(record(3, 1, vec![answer("q1", true), answer("q2", false)]))
            .unwrap();
        assert_eq!(ok.correct_answers(), 1);

        let summary_only = LearningSession::try_from(record(3, 2, Vec::new())).unwrap();
        assert_eq!(summary_only.correct_answers(), 2);
    }

    #[test]
    fn json_uses_export_field_names() {
        let mut s = session(2);
        s.record_answer(answer("q1", true)).unwrap();
        s.finish(fixed_now() + Duration::seconds(5)).unwrap();

        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["totalQuestions"], 2);
        assert_eq!(json["correctAnswers"], 1);
        assert_eq!(json["totalTime"], 5_000);
        assert_eq!(json["answers"][0]["timeSpent"], 1_000);

        let back: LearningSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn json_with_bad_counters_fails_to_parse() {
        let raw = r#"{
            "id": "s", "ageGroup": "6-8", "startTime": "2024-03-14T15:00:00Z",
            "totalQuestions": 1, "correctAnswers": 2, "totalTime": 0, "answers": []
        }"#;
        assert!(serde_json::from_str::<LearningSession>(raw).is_err());
    }
}
