use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown quiz mode: {0:?}")]
pub struct UnknownModeError(pub String);

/// Quiz modes offered to the learner. Each has its own selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuizMode {
    DailyChallenge,
    Random,
    Interleaved,
    TimeAttack,
    WeakAreaDrill,
    ShortAnswer,
}

impl QuizMode {
    pub const ALL: [QuizMode; 6] = [
        QuizMode::DailyChallenge,
        QuizMode::Random,
        QuizMode::Interleaved,
        QuizMode::TimeAttack,
        QuizMode::WeakAreaDrill,
        QuizMode::ShortAnswer,
    ];

    /// Number of questions a session of this mode asks by default.
    #[must_use]
    pub fn default_count(self) -> usize {
        match self {
            QuizMode::DailyChallenge => 5,
            QuizMode::Random => 15,
            QuizMode::Interleaved | QuizMode::ShortAnswer => 10,
            QuizMode::TimeAttack => 20,
            QuizMode::WeakAreaDrill => 8,
        }
    }

    /// Wall-clock limit for timed modes.
    #[must_use]
    pub fn time_limit(self) -> Option<Duration> {
        match self {
            QuizMode::DailyChallenge => Some(Duration::from_secs(180)),
            QuizMode::TimeAttack => Some(Duration::from_secs(120)),
            _ => None,
        }
    }

    /// Whether answers are typed rather than picked from choices.
    #[must_use]
    pub fn is_typed(self) -> bool {
        matches!(self, QuizMode::ShortAnswer)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuizMode::DailyChallenge => "daily-challenge",
            QuizMode::Random => "random",
            QuizMode::Interleaved => "interleaved",
            QuizMode::TimeAttack => "time-attack",
            QuizMode::WeakAreaDrill => "weak-area-drill",
            QuizMode::ShortAnswer => "short-answer",
        }
    }
}

impl fmt::Display for QuizMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        QuizMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| UnknownModeError(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_mode_name() {
        for mode in QuizMode::ALL {
            assert_eq!(mode.as_str().parse::<QuizMode>().unwrap(), mode);
        }
        assert_eq!("weak_area_drill".parse::<QuizMode>().unwrap(), QuizMode::WeakAreaDrill);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = "marathon".parse::<QuizMode>().unwrap_err();
        assert_eq!(err, UnknownModeError("marathon".into()));
    }

    #[test]
    fn timed_modes_have_limits() {
        assert_eq!(QuizMode::TimeAttack.time_limit(), Some(Duration::from_secs(120)));
        assert_eq!(QuizMode::Random.time_limit(), None);
        assert!(QuizMode::ShortAnswer.is_typed());
    }
}
