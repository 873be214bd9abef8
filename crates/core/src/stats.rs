//! Rollups derived from a group's session history.

use chrono::{DateTime, Days, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{LearningSession, UserProgress};
use crate::time::{local_date, week_start};

/// `correct / total * 100`, or 0 when nothing was answered.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn accuracy_percent(correct: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 / total as f64 * 100.0
}

//
// ─── LEARNING STATS ────────────────────────────────────────────────────────────
//

/// Time-windowed statistics for one age group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningStats {
    pub today_questions: u64,
    pub today_accuracy: f64,
    pub weekly_questions: u64,
    pub weekly_accuracy: f64,
    pub total_questions: u64,
    pub total_accuracy: f64,
    pub streak_days: u32,
}

impl LearningStats {
    /// Derive stats from a progress snapshot as seen at `now`.
    ///
    /// Day and week boundaries are taken in `now`'s offset. Weeks start on Sunday.
    /// Overall numbers come from the cumulative counters, not the session list.
    #[must_use]
    pub fn compute(progress: &UserProgress, now: DateTime<FixedOffset>) -> Self {
        let offset = *now.offset();
        let today = now.date_naive();
        let week = week_start(today);

        let (today_questions, today_correct) =
            window_totals(&progress.sessions, offset, today);
        let (weekly_questions, weekly_correct) =
            window_totals(&progress.sessions, offset, week);

        let dates = progress
            .sessions
            .iter()
            .map(|s| local_date(s.started_at(), offset));

        Self {
            today_questions,
            today_accuracy: accuracy_percent(today_correct, today_questions),
            weekly_questions,
            weekly_accuracy: accuracy_percent(weekly_correct, weekly_questions),
            total_questions: progress.total_questions_answered,
            total_accuracy: progress.average_accuracy,
            streak_days: streak_days(dates, today),
        }
    }
}

fn window_totals(
    sessions: &[LearningSession],
    offset: FixedOffset,
    from: NaiveDate,
) -> (u64, u64) {
    sessions
        .iter()
        .filter(|s| local_date(s.started_at(), offset) >= from)
        .fold((0, 0), |(questions, correct), s| {
            (
                questions + u64::from(s.total_questions()),
                correct + u64::from(s.correct_answers()),
            )
        })
}

/// Consecutive study days ending today.
///
/// Several sessions on one calendar day count once. Dates after `today` are
/// ignored; the walk stops at the first missing day, so no session today
/// means a streak of zero.
#[must_use]
pub fn streak_days(dates: impl IntoIterator<Item = NaiveDate>, today: NaiveDate) -> u32 {
    let distinct: BTreeSet<NaiveDate> = dates.into_iter().filter(|d| *d <= today).collect();

    let mut streak = 0;
    let mut expected = today;
    for date in distinct.into_iter().rev() {
        if date != expected {
            break;
        }
        streak += 1;
        match expected.checked_sub_days(Days::new(1)) {
            Some(prev) => expected = prev,
            None => break,
        }
    }
    streak
}

//
// ─── PERFORMANCE LEVEL ─────────────────────────────────────────────────────────
//

/// Coarse banding of a session's accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceLevel {
    Perfect,
    Excellent,
    Good,
    Pass,
    KeepTrying,
}

impl PerformanceLevel {
    #[must_use]
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 95.0 {
            Self::Perfect
        } else if accuracy >= 90.0 {
            Self::Excellent
        } else if accuracy >= 80.0 {
            Self::Good
        } else if accuracy >= 70.0 {
            Self::Pass
        } else {
            Self::KeepTrying
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Perfect => "perfect",
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Pass => "pass",
            Self::KeepTrying => "keep trying",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AgeGroup, LearningSessionRecord, SessionId};
    use crate::time::fixed_now;
    use chrono::{Duration, Utc};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session_at(start: DateTime<Utc>, total: u32, correct: u32) -> LearningSession {
        LearningSession::try_from(LearningSessionRecord {
            id: SessionId::random(),
            age_group: AgeGroup::ElementaryLow,
            start_time: start,
            end_time: Some(start + Duration::minutes(5)),
            total_questions: total,
            correct_answers: correct,
            total_time_ms: 300_000,
            answers: Vec::new(),
        })
        .unwrap()
    }

    fn progress_with(sessions: Vec<LearningSession>) -> UserProgress {
        let mut progress = UserProgress::empty(AgeGroup::ElementaryLow, fixed_now());
        for s in &sessions {
            progress.apply_session(s, fixed_now());
        }
        progress
    }

    fn utc_now() -> DateTime<FixedOffset> {
        fixed_now().with_timezone(&FixedOffset::east_opt(0).unwrap())
    }

    #[test]
    fn empty_history_is_all_zero() {
        let stats = LearningStats::compute(&progress_with(Vec::new()), utc_now());
        assert_eq!(stats.today_questions, 0);
        assert_eq!(stats.weekly_questions, 0);
        assert_eq!(stats.total_questions, 0);
        assert_eq!(stats.streak_days, 0);
        assert!(stats.today_accuracy.abs() < f64::EPSILON);
        assert!(stats.weekly_accuracy.abs() < f64::EPSILON);
        assert!(stats.total_accuracy.abs() < f64::EPSILON);
    }

    #[test]
    fn streak_breaks_at_first_gap() {
        let today = day(2024, 3, 14);
        let dates = [day(2024, 3, 14), day(2024, 3, 13), day(2024, 3, 11)];
        assert_eq!(streak_days(dates, today), 2);
    }

    #[test]
    fn same_day_sessions_count_once() {
        let today = day(2024, 3, 14);
        let dates = [today, today, today, day(2024, 3, 13)];
        assert_eq!(streak_days(dates, today), 2);
    }

    #[test]
    fn no_session_today_means_no_streak() {
        let today = day(2024, 3, 14);
        assert_eq!(streak_days([day(2024, 3, 13), day(2024, 3, 12)], today), 0);
    }

    #[test]
    fn future_dates_are_ignored() {
        let today = day(2024, 3, 14);
        assert_eq!(streak_days([day(2024, 3, 16), today], today), 1);
    }

    #[test]
    fn today_and_week_windows() {
        let now = fixed_now();
        let progress = progress_with(vec![
            session_at(now - Duration::hours(1), 10, 9),
            // Monday of the same week.
            session_at(now - Duration::days(3), 10, 5),
            // Previous Saturday falls outside the Sunday-start week.
            session_at(now - Duration::days(5), 10, 10),
        ]);

        let stats = LearningStats::compute(&progress, utc_now());
        assert_eq!(stats.today_questions, 10);
        assert!((stats.today_accuracy - 90.0).abs() < 1e-9);
        assert_eq!(stats.weekly_questions, 20);
        assert!((stats.weekly_accuracy - 70.0).abs() < 1e-9);
        assert_eq!(stats.total_questions, 30);
        assert!((stats.total_accuracy - 80.0).abs() < 1e-9);
        assert_eq!(stats.streak_days, 1);
    }

    #[test]
    fn day_boundaries_follow_offset() {
        // 15:00 UTC on Thursday is 01:00 Friday at UTC+10; a session at
        // 13:00 UTC Thursday is 23:00 Thursday there, i.e. yesterday.
        let plus_ten = FixedOffset::east_opt(10 * 3600).unwrap();
        let progress = progress_with(vec![session_at(fixed_now() - Duration::hours(2), 4, 4)]);

        let stats = LearningStats::compute(&progress, fixed_now().with_timezone(&plus_ten));
        assert_eq!(stats.today_questions, 0);
        assert_eq!(stats.weekly_questions, 4);
        assert_eq!(stats.streak_days, 0);
    }

    #[test]
    fn performance_bands() {
        assert_eq!(PerformanceLevel::from_accuracy(100.0), PerformanceLevel::Perfect);
        assert_eq!(PerformanceLevel::from_accuracy(95.0), PerformanceLevel::Perfect);
        assert_eq!(PerformanceLevel::from_accuracy(92.0), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_accuracy(80.0), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_accuracy(70.0), PerformanceLevel::Pass);
        assert_eq!(PerformanceLevel::from_accuracy(12.5), PerformanceLevel::KeepTrying);
    }
}
