use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, Utc};

/// Time source injected into services so tests can pin "now".
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Current time shifted into the given local offset.
    #[must_use]
    pub fn now_in(&self, offset: FixedOffset) -> DateTime<FixedOffset> {
        self.now().with_timezone(&offset)
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: chrono::Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Calendar date of `at` as seen from `offset`.
#[must_use]
pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Most recent Sunday on or before `day`.
#[must_use]
pub fn week_start(day: NaiveDate) -> NaiveDate {
    let back = u64::from(day.weekday().num_days_from_sunday());
    day.checked_sub_days(Days::new(back)).unwrap_or(day)
}

/// Deterministic timestamp for tests (2024-03-14T15:00:00Z, a Thursday).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_710_428_400;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn fixed_now_is_a_thursday() {
        assert_eq!(fixed_now().weekday(), Weekday::Thu);
    }

    #[test]
    fn week_starts_on_sunday() {
        let thursday = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(week_start(thursday), sunday);
        assert_eq!(week_start(sunday), sunday);
    }

    #[test]
    fn local_date_respects_offset() {
        // 15:00 UTC is already the next day at UTC+10.
        let plus_ten = FixedOffset::east_opt(10 * 3600).unwrap();
        assert_eq!(
            local_date(fixed_now(), plus_ten),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
    }

    #[test]
    fn advancing_a_fixed_clock_moves_now() {
        let mut clock = fixed_clock();
        clock.advance(chrono::Duration::seconds(90));
        assert_eq!(clock.now(), fixed_now() + chrono::Duration::seconds(90));
    }
}
