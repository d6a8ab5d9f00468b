use serde::Serialize;
use std::fmt;

use crate::error::DrillError;

// --- Range ---

/// Inclusive range the next number is drawn from.
///
/// `min <= max` always holds: `Range::new` is the only way to build one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    min: i64,
    max: i64,
}

impl Range {
    /// # Errors
    ///
    /// Returns `DrillError::InvalidRange` when `min > max`.
    pub fn new(min: i64, max: i64) -> Result<Self, DrillError> {
        if min > max {
            return Err(DrillError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl Default for Range {
    fn default() -> Self {
        Self { min: 0, max: 100 }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

// --- Speech rate ---

/// Speech rate multiplier between 0.5 and 2.0, kept in tenths.
///
/// Storing tenths keeps repeated arrow-key steps exact; `1.0 - 0.1 * 5` lands on
/// `0.5`, not `0.49999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpeechRate(u8);

impl SpeechRate {
    pub const MIN: SpeechRate = SpeechRate(5);
    pub const MAX: SpeechRate = SpeechRate(20);
    pub const NORMAL: SpeechRate = SpeechRate(10);

    /// Rounds to the nearest tenth and clamps into `[0.5, 2.0]`.
    pub fn clamped(rate: f64) -> Self {
        if rate.is_nan() {
            return Self::NORMAL;
        }
        let tenths = (rate * 10.0).round().clamp(Self::MIN.0 as f64, Self::MAX.0 as f64);
        Self(tenths as u8)
    }

    /// One step (0.1) slower, stopping at 0.5.
    pub fn slower(self) -> Self {
        Self(self.0.saturating_sub(1).max(Self::MIN.0))
    }

    /// One step (0.1) faster, stopping at 2.0.
    pub fn faster(self) -> Self {
        Self((self.0 + 1).min(Self::MAX.0))
    }

    pub fn as_f32(self) -> f32 {
        f32::from(self.0) / 10.0
    }
}

impl Default for SpeechRate {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for SpeechRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}x", self.0 / 10, self.0 % 10)
    }
}

// --- Rounds ---

/// Sequence number of a round, assigned by the engine in start order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RoundId(u64);

impl RoundId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Correct,
    Incorrect,
    TimedOut,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Outcome::Pending)
    }

    /// A miss is anything that ends the automatic drill.
    pub fn is_miss(self) -> bool {
        matches!(self, Outcome::Incorrect | Outcome::TimedOut)
    }
}

/// The number currently being drilled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    id: RoundId,
    value: i64,
    outcome: Outcome,
}

impl Round {
    pub fn new(id: RoundId, value: i64) -> Self {
        Self {
            id,
            value,
            outcome: Outcome::Pending,
        }
    }

    pub fn id(&self) -> RoundId {
        self.id
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == Outcome::Pending
    }

    /// Moves the round to a terminal outcome and returns its history snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DrillError::AlreadyResolved` if the round already left `Pending`;
    /// a terminal outcome never changes.
    pub fn resolve(&mut self, outcome: Outcome) -> Result<HistoryEntry, DrillError> {
        if !self.is_pending() || !outcome.is_terminal() {
            return Err(DrillError::AlreadyResolved(self.id));
        }
        self.outcome = outcome;
        Ok(HistoryEntry {
            round: self.id,
            value: self.value,
            outcome,
        })
    }
}

/// Immutable record of a retired round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub round: RoundId,
    pub value: i64,
    pub outcome: Outcome,
}

/// One attempt as it appears in the history list, numbered from 1.
pub struct Attempt<'a> {
    pub index: usize,
    pub entry: &'a HistoryEntry,
}

impl fmt::Display for Attempt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}: {}", self.index + 1, self.entry.value)
    }
}
