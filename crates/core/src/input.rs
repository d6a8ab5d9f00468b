//! Routes keys and form edits into engine calls.
//!
//! Key handling is a lookup in `KeyBindings`, so the whole shortcut surface can
//! be exercised without a terminal.
use std::collections::HashMap;

use crate::error::DrillError;
use crate::model::{Range, RoundId, SpeechRate};
use crate::random::RandomNumberSource;
use crate::session_state::{SessionEngine, Submission};
use crate::speaker::Speaker;

/// A key press, already decoded from whatever input device produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Space,
    Enter,
    Backspace,
    Esc,
    Left,
    Right,
}

/// Text fields the learner can type into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Answer,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateCommand {
    ManualTrigger,
    Focus(Field),
    Blur,
    Commit,
    SlowDown,
    SpeedUp,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    table: HashMap<Key, GateCommand>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let table = HashMap::from([
            (Key::Space, GateCommand::ManualTrigger),
            (Key::Char('/'), GateCommand::Focus(Field::Answer)),
            (Key::Char('['), GateCommand::Focus(Field::Min)),
            (Key::Char(']'), GateCommand::Focus(Field::Max)),
            (Key::Esc, GateCommand::Blur),
            (Key::Enter, GateCommand::Commit),
            (Key::Left, GateCommand::SlowDown),
            (Key::Right, GateCommand::SpeedUp),
            (Key::Char('q'), GateCommand::Quit),
        ]);
        Self { table }
    }
}

impl KeyBindings {
    /// Binds `key`, returning the command it replaced.
    pub fn bind(&mut self, key: Key, command: GateCommand) -> Option<GateCommand> {
        self.table.insert(key, command)
    }

    pub fn unbind(&mut self, key: Key) -> Option<GateCommand> {
        self.table.remove(&key)
    }

    pub fn command_for(&self, key: Key) -> Option<GateCommand> {
        self.table.get(&key).copied()
    }
}

/// What a stimulus did, so the host can report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Ignored,
    Edited(Field),
    Focused(Option<Field>),
    RoundStarted(RoundId),
    Answered(Submission),
    SpeedChanged(SpeechRate),
    RangeChanged(Range),
    Quit,
}

pub struct InputGate {
    bindings: KeyBindings,
    focus: Option<Field>,
    answer: String,
    min: String,
    max: String,
}

impl InputGate {
    pub fn new(bindings: KeyBindings, range: Range) -> Self {
        Self {
            bindings,
            focus: None,
            answer: String::new(),
            min: range.min().to_string(),
            max: range.max().to_string(),
        }
    }

    pub fn focus(&self) -> Option<Field> {
        self.focus
    }

    pub fn buffer(&self, field: Field) -> &str {
        match field {
            Field::Answer => &self.answer,
            Field::Min => &self.min,
            Field::Max => &self.max,
        }
    }

    /// Handles one key. Digits, `-` and Backspace edit the focused field;
    /// everything else goes through the binding table.
    ///
    /// # Errors
    ///
    /// Propagates engine and range validation errors. The engine is left
    /// untouched when a range is rejected.
    pub fn handle_key<S: Speaker, R: RandomNumberSource>(
        &mut self,
        key: Key,
        engine: &mut SessionEngine<S, R>,
    ) -> Result<GateOutcome, DrillError> {
        if let Some(field) = self.focus {
            if self.edit(field, key) {
                return Ok(GateOutcome::Edited(field));
            }
        }
        match self.bindings.command_for(key) {
            Some(command) => self.dispatch(command, engine),
            None => Ok(GateOutcome::Ignored),
        }
    }

    /// # Errors
    ///
    /// Propagates engine and range validation errors.
    pub fn dispatch<S: Speaker, R: RandomNumberSource>(
        &mut self,
        command: GateCommand,
        engine: &mut SessionEngine<S, R>,
    ) -> Result<GateOutcome, DrillError> {
        match command {
            GateCommand::ManualTrigger => engine.manual_trigger().map(GateOutcome::RoundStarted),
            // Focus is a presentation concern; the engine never hears about it.
            GateCommand::Focus(field) => {
                self.focus = Some(field);
                Ok(GateOutcome::Focused(self.focus))
            }
            GateCommand::Blur => {
                self.focus = None;
                Ok(GateOutcome::Focused(None))
            }
            GateCommand::Commit => match self.focus {
                Some(Field::Answer) => Ok(GateOutcome::Answered(self.submit(engine))),
                Some(Field::Min | Field::Max) => {
                    let (min, max) = (self.min.clone(), self.max.clone());
                    self.set_range(&min, &max, engine).map(GateOutcome::RangeChanged)
                }
                None => Ok(GateOutcome::Ignored),
            },
            GateCommand::SlowDown => {
                let rate = engine.speech_rate().slower();
                Ok(GateOutcome::SpeedChanged(self.set_speed(rate.as_f32().into(), engine)))
            }
            GateCommand::SpeedUp => {
                let rate = engine.speech_rate().faster();
                Ok(GateOutcome::SpeedChanged(self.set_speed(rate.as_f32().into(), engine)))
            }
            GateCommand::Quit => Ok(GateOutcome::Quit),
        }
    }

    /// Submits the answer buffer. A correct answer clears it.
    pub fn submit<S: Speaker, R: RandomNumberSource>(
        &mut self,
        engine: &mut SessionEngine<S, R>,
    ) -> Submission {
        let submission = engine.submit_answer(&self.answer);
        if matches!(submission, Submission::Correct { .. }) {
            self.answer.clear();
        }
        submission
    }

    /// Clamps a raw speed into `[0.5, 2.0]` before the engine sees it.
    pub fn set_speed<S: Speaker, R: RandomNumberSource>(
        &mut self,
        raw: f64,
        engine: &mut SessionEngine<S, R>,
    ) -> SpeechRate {
        let rate = SpeechRate::clamped(raw);
        engine.set_speech_rate(rate);
        rate
    }

    /// Validates range text and hands the range to the engine.
    ///
    /// # Errors
    ///
    /// `DrillError::InvalidNumber` for unparsable bounds and
    /// `DrillError::InvalidRange` when `min > max`.
    pub fn set_range<S: Speaker, R: RandomNumberSource>(
        &mut self,
        min: &str,
        max: &str,
        engine: &mut SessionEngine<S, R>,
    ) -> Result<Range, DrillError> {
        self.min = min.to_string();
        self.max = max.to_string();
        let range = Range::new(parse_bound(min)?, parse_bound(max)?)?;
        engine.set_range(range);
        Ok(range)
    }

    fn edit(&mut self, field: Field, key: Key) -> bool {
        let buffer = match field {
            Field::Answer => &mut self.answer,
            Field::Min => &mut self.min,
            Field::Max => &mut self.max,
        };
        match key {
            Key::Char(c) if c.is_ascii_digit() => buffer.push(c),
            Key::Char('-') if buffer.is_empty() => buffer.push('-'),
            Key::Backspace => {
                buffer.pop();
            }
            _ => return false,
        }
        true
    }
}

fn parse_bound(text: &str) -> Result<i64, DrillError> {
    text.trim()
        .parse()
        .map_err(|_| DrillError::InvalidNumber(text.to_string()))
}
