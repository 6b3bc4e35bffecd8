use chrono::{DateTime, Duration, NaiveDate, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
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

    /// Current study day according to the clock.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        study_day(self.now())
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Calendar day a timestamp counts towards for streak purposes.
///
/// Study days are UTC calendar days.
#[must_use]
pub fn study_day(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

/// Whole calendar days from `earlier` to `later` (negative if reversed).
#[must_use]
pub fn calendar_days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    later.signed_duration_since(earlier).num_days()
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_and_changes_day() {
        let mut clock = Clock::fixed(fixed_now());
        let day = clock.today();
        clock.advance(Duration::days(1));
        assert_eq!(calendar_days_between(day, clock.today()), 1);
    }

    #[test]
    fn default_clock_ignores_advance() {
        let mut clock = Clock::default();
        clock.advance(Duration::days(10));
        assert!(matches!(clock, Clock::Default));
    }

    #[test]
    fn late_evening_and_next_morning_are_one_day_apart() {
        let evening = fixed_now(); // 22:13 UTC
        let morning = evening + Duration::hours(3);
        assert_eq!(
            calendar_days_between(study_day(evening), study_day(morning)),
            1
        );
    }
}
