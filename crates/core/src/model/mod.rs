mod ids;
mod mode;
mod progress;
mod quest;
mod question;
mod record;
mod session;
mod settings;

pub use ids::{ParseIdError, QuestionId, SessionId, TopicId};
pub use mode::{QuizMode, UnknownModeError};
pub use progress::{
    AchievementId, ProgressError, ProgressState, StreakChange, StreakUpdate, TopicTally,
    level_for_xp,
};
pub use quest::{
    DAILY_ANSWER_TARGET, Quest, QuestActivity, QuestBoard, QuestCadence, QuestError, QuestGoal,
    STRONG_SESSION_PCT, TOPIC_PRACTICE_TARGET, WEEKLY_STRONG_SESSIONS, week_start,
};
pub use question::{
    Answer, Catalog, CatalogDraft, CatalogError, Question, QuestionDraft, QuestionKind, Topic,
    TopicDraft, normalize_answer,
};
pub use record::{Confidence, Difficulty, QuestionRecord, RecordError};
pub use session::{AnswerEvent, SessionResult, SessionResultError};
pub use settings::{
    MAX_GROWTH_FACTOR, MAX_INTERVAL_DAYS, ProgressSettings, SchedulerSettings, SettingsError,
    StudySettings,
};
