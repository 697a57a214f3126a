mod answer;
mod ids;
mod question;
mod session;
mod settings;
mod stats;

pub use ids::{LearnerId, ParseIdError, QuestionId, SessionId, StatKey, Subject};

pub use answer::{Answer, AnswerError, Record, Response};
pub use question::{Question, QuestionDoc, QuestionDocError, QuestionKind};
pub use session::{
    Encouragement, SLOWEST_TOPICS_SHOWN, Session, SessionCompletion, SessionStateError,
    SessionStatus, SessionSummary, TopicTiming, UNCATEGORIZED_TOPIC,
};
pub use settings::{MasteredPolicy, SettingsError, TrainerSettings};
pub use stats::{Familiarity, LastResult, StatDoc, StatOutcome, StatRecord, StatRecordError, Verdict};
