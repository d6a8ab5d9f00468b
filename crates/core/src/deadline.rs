//! Single-slot answer deadline.
//!
//! Arming spawns a sleeper task that posts `Event::DeadlineExpired` to the
//! engine's channel. The engine only honours an expiry whose token matches the
//! armed slot, so an event that was already queued when the slot was canceled
//! or re-armed is dropped at fire time.
use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::Event;

/// Identifies one arming of a `DeadlineTimer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeadlineToken(u64);

impl fmt::Display for DeadlineToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deadline-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Armed,
    Fired,
}

struct Armed {
    token: DeadlineToken,
    sleeper: JoinHandle<()>,
}

pub struct DeadlineTimer {
    events: UnboundedSender<Event>,
    slot: Option<Armed>,
    fired: bool,
    issued: u64,
}

impl DeadlineTimer {
    pub fn new(events: UnboundedSender<Event>) -> Self {
        Self {
            events,
            slot: None,
            fired: false,
            issued: 0,
        }
    }

    /// Schedules an expiry after `window`, replacing any pending one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&mut self, window: Duration) -> DeadlineToken {
        self.cancel();
        self.issued += 1;
        let token = DeadlineToken(self.issued);

        let events = self.events.clone();
        let sleeper = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Err(e) = events.send(Event::DeadlineExpired(token)) {
                // The receiver only goes away while the session is shutting down.
                tracing::debug!("Dropping {} after shutdown: {:?}", token, e.0);
            }
        });

        self.slot = Some(Armed { token, sleeper });
        self.fired = false;
        token
    }

    /// Disarms the pending expiry, if any. No event is delivered for it.
    pub fn cancel(&mut self) {
        if let Some(armed) = self.slot.take() {
            armed.sleeper.abort();
            tracing::trace!("Canceled {}", armed.token);
        }
    }

    /// Accepts an expiry event. Returns `true` only for the currently armed
    /// token, which moves the timer to `Fired`; every other token is stale.
    pub fn take_expired(&mut self, token: DeadlineToken) -> bool {
        match &self.slot {
            Some(armed) if armed.token == token => {
                self.slot = None;
                self.fired = true;
                true
            }
            _ => false,
        }
    }

    pub fn armed_token(&self) -> Option<DeadlineToken> {
        self.slot.as_ref().map(|armed| armed.token)
    }

    pub fn state(&self) -> TimerState {
        match (&self.slot, self.fired) {
            (Some(_), _) => TimerState::Armed,
            (None, true) => TimerState::Fired,
            (None, false) => TimerState::Idle,
        }
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
