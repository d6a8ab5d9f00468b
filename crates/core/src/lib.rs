pub mod deadline;
pub mod driver;
pub mod error;
pub mod input;
pub mod model;
pub mod random;
pub mod session_state;
pub mod speaker;

pub use deadline::{DeadlineTimer, DeadlineToken, TimerState};
pub use driver::{DriveConfig, PeriodicDriver};
pub use error::DrillError;
pub use input::{Field, GateCommand, GateOutcome, InputGate, Key, KeyBindings};
pub use model::{Attempt, HistoryEntry, Outcome, Range, Round, RoundId, SpeechRate};
pub use random::{RandomNumberSource, SeededRandom, ThreadRandom};
pub use session_state::{
    ANSWER_WINDOW, DEFAULT_LANGUAGE, EngineSettings, Notice, SessionEngine, SessionState,
    Submission,
};
pub use speaker::{Speaker, Utterance, Voice, voice_for};

/// Represents notifications that reach the engine from outside the call stack
/// of a learner action.
///
/// Background tasks never touch the engine directly. They post an `Event` on
/// the runtime's channel and the runtime hands it to
/// `SessionEngine::handle_event` on its own turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The answer window of the round armed with this token ran out.
    DeadlineExpired(DeadlineToken),
}
