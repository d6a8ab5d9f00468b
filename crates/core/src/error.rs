use crate::model::RoundId;

/// Errors reported by the drill engine and its input boundary.
///
/// None of these are fatal to a session. The runtime logs them and shows them
/// to the learner, then keeps dispatching events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrillError {
    #[error("invalid range: min {min} is greater than max {max}")]
    InvalidRange { min: i64, max: i64 },
    #[error("not a whole number: {0:?}")]
    InvalidNumber(String),
    #[error("no voice available for {0}")]
    VoiceUnavailable(String),
    #[error("round {0} is still in progress")]
    RoundInProgress(RoundId),
    #[error("round {0} is already resolved")]
    AlreadyResolved(RoundId),
}
