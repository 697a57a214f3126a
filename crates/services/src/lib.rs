#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;

pub use quiz_core::Clock;

pub use error::SessionError;
pub use sessions::{
    Phase, PracticeRequest, PracticeService, PracticeStart, SessionProgress, SessionRunner,
    VerdictOutcome,
};
