//! Raw-mode terminal front end: key decoding, the status line and the final
//! history listing.
use std::fmt;
use std::io::{self, Write};

use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Stylize;
use crossterm::terminal::{self, ClearType};
use crossterm::{cursor, queue};
use drill_core::{
    Attempt, Field, HistoryEntry, InputGate, Key, Notice, Outcome, RandomNumberSource,
    SessionEngine, Speaker,
};
use tokio::sync::mpsc::UnboundedSender;

/// What the terminal reader forwards to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalInput {
    Key(Key),
    /// Ctrl-C. Raw mode swallows the signal, so it arrives as a key.
    Interrupt,
}

/// Decodes a crossterm key event. Releases and unmapped keys yield `None`.
pub fn map_key(event: &KeyEvent) -> Option<TerminalInput> {
    if event.kind == KeyEventKind::Release {
        return None;
    }
    if event.modifiers.contains(KeyModifiers::CONTROL) {
        return match event.code {
            KeyCode::Char('c') => Some(TerminalInput::Interrupt),
            _ => None,
        };
    }
    let key = match event.code {
        KeyCode::Char(' ') => Key::Space,
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Esc => Key::Esc,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        _ => return None,
    };
    Some(TerminalInput::Key(key))
}

/// Blocking reader loop, run on its own thread. Returns once the runtime drops
/// its receiver or the terminal fails.
pub fn forward_keys(inputs: UnboundedSender<TerminalInput>) {
    loop {
        match event::read() {
            Ok(TermEvent::Key(key)) => {
                if let Some(input) = map_key(&key) {
                    if inputs.send(input).is_err() {
                        return;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Failed to read terminal input: {}", e);
                // Let the runtime shut down instead of hanging without input.
                let _ = inputs.send(TerminalInput::Interrupt);
                return;
            }
        }
    }
}

/// Keeps the terminal in raw mode for as long as it lives.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::error!("Failed to restore the terminal: {}", e);
        }
    }
}

/// One frame of the status line.
pub struct Status<'a> {
    pub auto_advance: bool,
    pub armed: bool,
    pub range: String,
    pub rate: String,
    pub focus: Option<Field>,
    pub answer: &'a str,
    pub revealed: Option<i64>,
    pub notice: Option<&'a Notice>,
    pub error: Option<&'a str>,
}

impl<'a> Status<'a> {
    pub fn capture<S: Speaker, R: RandomNumberSource>(
        engine: &'a SessionEngine<S, R>,
        gate: &'a InputGate,
        error: Option<&'a str>,
    ) -> Self {
        let range = match gate.focus() {
            Some(Field::Min | Field::Max) => {
                format!("{}..={}", gate.buffer(Field::Min), gate.buffer(Field::Max))
            }
            _ => engine.range().to_string(),
        };
        Self {
            auto_advance: engine.auto_advance(),
            armed: engine.active_round().is_some(),
            range,
            rate: engine.speech_rate().to_string(),
            focus: gate.focus(),
            answer: gate.buffer(Field::Answer),
            revealed: engine.revealed(),
            notice: engine.notice(),
            error,
        }
    }
}

impl fmt::Display for Status<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match (self.armed, self.auto_advance) {
            (true, _) => "listening",
            (false, true) => "auto",
            (false, false) => "paused",
        };
        let (range_cursor, answer_cursor) = match self.focus {
            Some(Field::Min | Field::Max) => ("_", ""),
            Some(Field::Answer) => ("", "_"),
            None => ("", ""),
        };
        write!(
            f,
            "[{mode}] range {}{range_cursor} | rate {} | answer: {}{answer_cursor}",
            self.range, self.rate, self.answer
        )?;
        if let Some(value) = self.revealed {
            write!(f, " | number: {value}")?;
        }
        if let Some(error) = self.error {
            write!(f, " | {error}")?;
        } else if let Some(notice) = self.notice {
            write!(f, " | {notice}")?;
        }
        Ok(())
    }
}

/// Redraws the status line in place.
pub fn draw(out: &mut impl Write, status: &Status<'_>) -> io::Result<()> {
    queue!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine)
    )?;
    write!(out, "{status}")?;
    out.flush()
}

/// Prints the attempts, one per line. Misses are red and timeouts are also
/// struck through.
pub fn print_history(out: &mut impl Write, history: &[HistoryEntry]) -> io::Result<()> {
    for (index, entry) in history.iter().enumerate() {
        let attempt = Attempt { index, entry }.to_string();
        match entry.outcome {
            Outcome::TimedOut => writeln!(out, "{}", attempt.red().crossed_out())?,
            Outcome::Incorrect => writeln!(out, "{}", attempt.red())?,
            Outcome::Correct | Outcome::Pending => writeln!(out, "{attempt}")?,
        }
    }
    out.flush()
}
