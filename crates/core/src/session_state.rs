use std::fmt;
use std::time::Duration;

use crate::deadline::{DeadlineTimer, DeadlineToken};
use crate::driver::DriveConfig;
use crate::error::DrillError;
use crate::model::{HistoryEntry, Outcome, Range, Round, RoundId, SpeechRate};
use crate::random::RandomNumberSource;
use crate::speaker::{Speaker, Utterance, voice_for};
use crate::Event;

/// How long the learner has to answer once a number was spoken.
pub const ANSWER_WINDOW: Duration = Duration::from_millis(5000);
/// Language drilled when nothing else is configured.
pub const DEFAULT_LANGUAGE: &str = "fr-FR";

const CONFIRMATION: &str = "Correct";
const REJECTION: &str = "Incorrect";
const TIME_UP: &str = "Time is up!";

// --- Settings ---

/// Initial configuration of a `SessionEngine`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub language: String,
    pub answer_window: Duration,
    pub range: Range,
    pub speech_rate: SpeechRate,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            answer_window: ANSWER_WINDOW,
            range: Range::default(),
            speech_rate: SpeechRate::NORMAL,
        }
    }
}

impl EngineSettings {
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn with_answer_window(mut self, window: Duration) -> Self {
        self.answer_window = window;
        self
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = range;
        self
    }

    pub fn with_speech_rate(mut self, rate: SpeechRate) -> Self {
        self.speech_rate = rate;
        self
    }
}

// --- What the learner sees ---

/// The last message the engine produced for the learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Correct,
    Incorrect { answer: i64 },
    TimeUp,
    VoiceUnavailable { language: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Correct => write!(f, "Correct!"),
            Notice::Incorrect { answer } => {
                write!(f, "Incorrect, the correct number was {answer}.")
            }
            Notice::TimeUp => write!(f, "Time is up!"),
            Notice::VoiceUnavailable { language } => {
                write!(f, "No voice available for {language}")
            }
        }
    }
}

/// Result of submitting an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// No round was waiting for an answer; nothing changed.
    Stale,
    /// The answer matched. `next` is the round chained after it, if one could start.
    Correct {
        entry: HistoryEntry,
        next: Option<RoundId>,
    },
    Incorrect { entry: HistoryEntry },
}

// --- State machine ---

/// Where the session is between events. `Resolved` is never stored: a round
/// that reaches a terminal outcome is retired within the same step.
#[derive(Debug)]
enum Phase {
    Idle,
    Armed { round: Round, deadline: DeadlineToken },
}

/// Everything the engine owns about the running session.
#[derive(Debug)]
pub struct SessionState {
    phase: Phase,
    auto_advance: bool,
    speech_rate: SpeechRate,
    range: Range,
    history: Vec<HistoryEntry>,
}

/// Transition table of the round lifecycle, applied by `SessionEngine::drive`.
#[derive(Debug)]
enum Step {
    /// Idle -> Armed: draw, speak, arm the deadline.
    Start,
    /// Armed -> Resolved: the active round takes a terminal outcome.
    Resolve(Outcome),
    /// Resolved -> Idle: retire the entry and pick the continuation.
    Settle(HistoryEntry),
    Halt,
}

#[derive(Debug, Default)]
struct Trace {
    settled: Option<HistoryEntry>,
    started: Option<RoundId>,
}

/// The drill session state machine.
///
/// All handlers take `&mut self` and run to completion, so a round can be
/// resolved by at most one of an answer or its deadline.
pub struct SessionEngine<S, R> {
    state: SessionState,
    speaker: S,
    numbers: R,
    deadline: DeadlineTimer,
    language: String,
    answer_window: Duration,
    next_round: RoundId,
    revealed: Option<i64>,
    notice: Option<Notice>,
}

impl<S: Speaker, R: RandomNumberSource> SessionEngine<S, R> {
    pub fn new(speaker: S, numbers: R, deadline: DeadlineTimer, settings: EngineSettings) -> Self {
        Self {
            state: SessionState {
                phase: Phase::Idle,
                auto_advance: true,
                speech_rate: settings.speech_rate,
                range: settings.range,
                history: Vec::new(),
            },
            speaker,
            numbers,
            deadline,
            language: settings.language,
            answer_window: settings.answer_window,
            next_round: RoundId::new(1),
            revealed: None,
            notice: None,
        }
    }

    /// Starts a round from `Idle`.
    ///
    /// # Errors
    ///
    /// `DrillError::RoundInProgress` if a round is still waiting for an answer;
    /// only `manual_trigger` may supersede it.
    /// `DrillError::VoiceUnavailable` if no voice speaks the target language.
    pub fn start_round(&mut self) -> Result<RoundId, DrillError> {
        if let Phase::Armed { round, .. } = &self.state.phase {
            tracing::warn!(round = %round.id(), "Refusing to start a round over an active one");
            return Err(DrillError::RoundInProgress(round.id()));
        }
        self.arm_round()
    }

    /// Turns auto-advance back on and starts a fresh round, abandoning the
    /// active one. The abandoned round never reaches history.
    ///
    /// # Errors
    ///
    /// `DrillError::VoiceUnavailable` if no voice speaks the target language.
    pub fn manual_trigger(&mut self) -> Result<RoundId, DrillError> {
        self.state.auto_advance = true;
        self.abandon();
        self.arm_round()
    }

    /// Entry point for the periodic driver: starts a round only when
    /// auto-advance is on and nothing is active. Calling it again is harmless.
    ///
    /// # Errors
    ///
    /// `DrillError::VoiceUnavailable` if no voice speaks the target language.
    pub fn advance_if_allowed(&mut self) -> Result<Option<RoundId>, DrillError> {
        if !self.state.auto_advance {
            tracing::trace!("Tick ignored: auto-advance is off");
            return Ok(None);
        }
        if let Phase::Armed { round, .. } = &self.state.phase {
            tracing::trace!(round = %round.id(), "Tick ignored: round still active");
            return Ok(None);
        }
        self.arm_round().map(Some)
    }

    /// Scores `candidate` against the active round. Text that is not a whole
    /// number counts as a wrong answer.
    pub fn submit_answer(&mut self, candidate: &str) -> Submission {
        let outcome = match &self.state.phase {
            Phase::Armed { round, .. } if round.is_pending() => {
                match candidate.trim().parse::<i64>() {
                    Ok(answer) if answer == round.value() => Outcome::Correct,
                    _ => Outcome::Incorrect,
                }
            }
            _ => {
                tracing::debug!(candidate, "Stale submission ignored");
                return Submission::Stale;
            }
        };

        let trace = self.drive(Step::Resolve(outcome));
        match trace.settled {
            Some(entry) if entry.outcome == Outcome::Correct => Submission::Correct {
                entry,
                next: trace.started,
            },
            Some(entry) => Submission::Incorrect { entry },
            None => Submission::Stale,
        }
    }

    /// Handles an asynchronous notification. Returns the retired entry when a
    /// deadline expired a round.
    pub fn handle_event(&mut self, event: Event) -> Option<HistoryEntry> {
        match event {
            Event::DeadlineExpired(token) => self.expire(token),
        }
    }

    /// Ends the session: abandons the active round, silences the speaker and
    /// turns auto-advance off. History is kept.
    pub fn stop(&mut self) {
        self.abandon();
        self.state.auto_advance = false;
        self.speaker.cancel_all();
        tracing::info!(attempts = self.state.history.len(), "Session stopped");
    }

    pub fn set_range(&mut self, range: Range) {
        tracing::info!(%range, "Range updated");
        self.state.range = range;
    }

    pub fn set_speech_rate(&mut self, rate: SpeechRate) {
        tracing::info!(%rate, "Speech rate updated");
        self.state.speech_rate = rate;
    }

    // --- Read-only views ---

    pub fn active_round(&self) -> Option<&Round> {
        match &self.state.phase {
            Phase::Armed { round, .. } => Some(round),
            Phase::Idle => None,
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.state.history
    }

    pub fn auto_advance(&self) -> bool {
        self.state.auto_advance
    }

    pub fn range(&self) -> Range {
        self.state.range
    }

    pub fn speech_rate(&self) -> SpeechRate {
        self.state.speech_rate
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// The last retired number, hidden while a round is active.
    pub fn revealed(&self) -> Option<i64> {
        match self.state.phase {
            Phase::Idle => self.revealed,
            Phase::Armed { .. } => None,
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn drive_config(&self) -> DriveConfig {
        DriveConfig {
            auto_advance: self.state.auto_advance,
            speech_rate: self.state.speech_rate,
            range: self.state.range,
        }
    }

    // --- Transitions ---

    fn drive(&mut self, first: Step) -> Trace {
        let mut trace = Trace::default();
        let mut step = first;
        loop {
            step = match step {
                Step::Start => {
                    // A failed chained start already surfaced its notice and paused the drill.
                    trace.started = self.arm_round().ok();
                    Step::Halt
                }
                Step::Resolve(outcome) => match self.retire(outcome) {
                    Some(entry) => Step::Settle(entry),
                    None => Step::Halt,
                },
                Step::Settle(entry) => {
                    trace.settled = Some(entry);
                    if entry.outcome.is_miss() {
                        self.state.auto_advance = false;
                    }
                    match entry.outcome {
                        Outcome::Correct => Step::Start,
                        Outcome::Incorrect | Outcome::TimedOut | Outcome::Pending => Step::Halt,
                    }
                }
                Step::Halt => return trace,
            };
        }
    }

    fn arm_round(&mut self) -> Result<RoundId, DrillError> {
        let Some(voice) = voice_for(&self.speaker, &self.language) else {
            // Never leave the learner waiting on a deadline for audio that cannot play.
            self.state.auto_advance = false;
            self.notice = Some(Notice::VoiceUnavailable {
                language: self.language.clone(),
            });
            tracing::warn!(language = %self.language, "No matching voice, halting the drill");
            return Err(DrillError::VoiceUnavailable(self.language.clone()));
        };

        let id = self.next_round;
        self.next_round = id.next();
        let value = self.numbers.next(self.state.range);
        self.revealed = None;

        self.speaker.cancel_all();
        self.speaker.speak(Utterance {
            text: value.to_string(),
            voice: voice.id,
            rate: self.state.speech_rate,
        });

        let deadline = self.deadline.arm(self.answer_window);
        self.state.phase = Phase::Armed {
            round: Round::new(id, value),
            deadline,
        };
        tracing::info!(round = %id, range = %self.state.range, "Round armed");
        Ok(id)
    }

    fn retire(&mut self, outcome: Outcome) -> Option<HistoryEntry> {
        let Phase::Armed { mut round, .. } = std::mem::replace(&mut self.state.phase, Phase::Idle)
        else {
            return None;
        };
        self.deadline.cancel();

        let entry = match round.resolve(outcome) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Round could not be resolved: {}", e);
                return None;
            }
        };
        self.state.history.push(entry);
        self.revealed = Some(entry.value);

        let (notice, phrase) = match outcome {
            Outcome::Correct => (Notice::Correct, CONFIRMATION),
            Outcome::Incorrect => (Notice::Incorrect { answer: entry.value }, REJECTION),
            Outcome::TimedOut | Outcome::Pending => (Notice::TimeUp, TIME_UP),
        };
        self.notice = Some(notice);
        self.say(phrase);

        tracing::info!(
            round = %entry.round,
            value = entry.value,
            outcome = ?entry.outcome,
            attempts = self.state.history.len(),
            "Round retired"
        );
        Some(entry)
    }

    fn expire(&mut self, token: DeadlineToken) -> Option<HistoryEntry> {
        if !self.deadline.take_expired(token) {
            tracing::debug!(%token, "Stale deadline ignored");
            return None;
        }
        match &self.state.phase {
            Phase::Armed { round, deadline } if *deadline == token && round.is_pending() => {}
            _ => {
                tracing::debug!(%token, "Deadline fired with no matching round");
                return None;
            }
        }
        self.drive(Step::Resolve(Outcome::TimedOut)).settled
    }

    fn abandon(&mut self) {
        if let Phase::Armed { round, .. } = std::mem::replace(&mut self.state.phase, Phase::Idle) {
            self.deadline.cancel();
            tracing::debug!(round = %round.id(), "Round abandoned by manual trigger");
        }
    }

    // Feedback is best effort: only the number itself requires a voice.
    fn say(&mut self, text: &str) {
        match voice_for(&self.speaker, &self.language) {
            Some(voice) => self.speaker.speak(Utterance {
                text: text.to_string(),
                voice: voice.id,
                rate: self.state.speech_rate,
            }),
            None => tracing::warn!(language = %self.language, text, "Feedback not spoken"),
        }
    }
}
