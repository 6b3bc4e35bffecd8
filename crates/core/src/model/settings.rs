use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest review interval any setting may produce (ten years).
pub const MAX_INTERVAL_DAYS: i64 = 3650;

/// Largest interval multiplier accepted.
pub const MAX_GROWTH_FACTOR: f64 = 10.0;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("base interval must be between 1 hour and 3650 days, got {0} hours")]
    InvalidBaseInterval(i64),

    #[error("growth factor must be between 1 and 10, got {0}")]
    InvalidGrowthFactor(f64),

    #[error("maximum interval must be between the base interval and 3650 days")]
    InvalidIntervalBounds,

    #[error("weak-area threshold must be > 0")]
    InvalidWeakThreshold,

    #[error("accuracy threshold must be in (0, 1], got {0}")]
    InvalidAccuracyThreshold(f64),

    #[error("XP per level must be > 0")]
    InvalidXpPerLevel,

    #[error("streak freeze cap must be >= starting freezes")]
    InvalidFreezeBounds,
}

/// Tunables for the spaced-repetition law.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub base_interval_hours: i64,
    pub growth_factor: f64,
    pub max_interval_days: i64,
    /// Consecutive misses that flag a topic for a weak-area drill.
    pub weak_area_threshold: u32,
    /// Attempts needed before difficulty adapts to accuracy.
    pub adapt_after_attempts: u32,
    pub easy_below_accuracy: f64,
    pub hard_above_accuracy: f64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            base_interval_hours: 24,
            growth_factor: 2.0,
            max_interval_days: 30,
            weak_area_threshold: 3,
            adapt_after_attempts: 5,
            easy_below_accuracy: 0.5,
            hard_above_accuracy: 0.8,
        }
    }
}

impl SchedulerSettings {
    /// # Errors
    ///
    /// Returns `SettingsError` for out-of-range values.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(1..=MAX_INTERVAL_DAYS * 24).contains(&self.base_interval_hours) {
            return Err(SettingsError::InvalidBaseInterval(self.base_interval_hours));
        }
        if !self.growth_factor.is_finite()
            || !(1.0..=MAX_GROWTH_FACTOR).contains(&self.growth_factor)
        {
            return Err(SettingsError::InvalidGrowthFactor(self.growth_factor));
        }
        let max_hours = self.max_interval_days.checked_mul(24);
        if self.max_interval_days > MAX_INTERVAL_DAYS
            || max_hours.is_none_or(|hours| hours < self.base_interval_hours)
        {
            return Err(SettingsError::InvalidIntervalBounds);
        }
        if self.weak_area_threshold == 0 {
            return Err(SettingsError::InvalidWeakThreshold);
        }
        for value in [self.easy_below_accuracy, self.hard_above_accuracy] {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(SettingsError::InvalidAccuracyThreshold(value));
            }
        }
        Ok(())
    }
}

/// Tunables for XP, levels, streaks and drills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    pub xp_per_correct: u64,
    pub accuracy_bonus_xp: u64,
    pub accuracy_bonus_threshold: f64,
    pub xp_per_level: u64,
    pub starting_streak_freezes: u32,
    pub max_streak_freezes: u32,
    /// A freeze is earned each time the streak reaches a multiple of this.
    pub freeze_every_days: u32,
    /// Accuracy a weak-area drill needs on a topic to clear its flag.
    pub drill_clear_accuracy: f64,
    pub drill_clear_min_answers: u32,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            xp_per_correct: 10,
            accuracy_bonus_xp: 25,
            accuracy_bonus_threshold: 0.9,
            xp_per_level: 100,
            starting_streak_freezes: 2,
            max_streak_freezes: 5,
            freeze_every_days: 5,
            drill_clear_accuracy: 0.8,
            drill_clear_min_answers: 3,
        }
    }
}

impl ProgressSettings {
    /// # Errors
    ///
    /// Returns `SettingsError` for out-of-range values.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for value in [self.accuracy_bonus_threshold, self.drill_clear_accuracy] {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(SettingsError::InvalidAccuracyThreshold(value));
            }
        }
        if self.xp_per_level == 0 {
            return Err(SettingsError::InvalidXpPerLevel);
        }
        if self.max_streak_freezes < self.starting_streak_freezes {
            return Err(SettingsError::InvalidFreezeBounds);
        }
        Ok(())
    }
}

/// All study tunables, as read from an optional settings file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudySettings {
    pub scheduler: SchedulerSettings,
    pub progress: ProgressSettings,
}

impl StudySettings {
    /// # Errors
    ///
    /// Returns the first `SettingsError` from either section.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.scheduler.validate()?;
        self.progress.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(StudySettings::default().validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: StudySettings =
            serde_json::from_str(r#"{"progress": {"xp_per_correct": 20}}"#).unwrap();
        assert_eq!(settings.progress.xp_per_correct, 20);
        assert_eq!(settings.progress.accuracy_bonus_xp, 25);
        assert_eq!(settings.scheduler.max_interval_days, 30);
    }

    #[test]
    fn rejects_bad_values() {
        let mut scheduler = SchedulerSettings::default();
        scheduler.growth_factor = 0.5;
        assert_eq!(
            scheduler.validate(),
            Err(SettingsError::InvalidGrowthFactor(0.5))
        );

        let mut progress = ProgressSettings::default();
        progress.xp_per_level = 0;
        assert_eq!(progress.validate(), Err(SettingsError::InvalidXpPerLevel));
    }

    #[test]
    fn rejects_intervals_beyond_the_cap() {
        let mut scheduler = SchedulerSettings::default();
        scheduler.base_interval_hours = 10_000_000_000;
        scheduler.max_interval_days = 1_000_000_000;
        assert_eq!(
            scheduler.validate(),
            Err(SettingsError::InvalidBaseInterval(10_000_000_000))
        );

        scheduler.base_interval_hours = 24;
        assert_eq!(scheduler.validate(), Err(SettingsError::InvalidIntervalBounds));

        scheduler.max_interval_days = i64::MAX;
        assert_eq!(scheduler.validate(), Err(SettingsError::InvalidIntervalBounds));

        scheduler.max_interval_days = MAX_INTERVAL_DAYS;
        assert!(scheduler.validate().is_ok());

        scheduler.growth_factor = 1e300;
        assert_eq!(
            scheduler.validate(),
            Err(SettingsError::InvalidGrowthFactor(1e300))
        );
    }
}
