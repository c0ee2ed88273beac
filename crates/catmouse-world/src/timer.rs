//! One-shot restart timer for round auto-advance.
//!
//! The scheduler owns no clock. Arming hands out a ticket; whoever owns the
//! clock waits for the delay and fires with that ticket. Re-arming or
//! disarming invalidates earlier tickets, so a stale fire is a no-op.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerTicket(u64);

/// A pending restart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedRestart {
    pub ticket: TimerTicket,
    pub delay: Duration,
}

#[derive(Debug, Default)]
pub struct RestartTimer {
    generation: u64,
    armed: Option<ArmedRestart>,
}

impl RestartTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, cancelling any pending restart
    pub fn arm(&mut self, delay: Duration) -> TimerTicket {
        self.generation += 1;
        let ticket = TimerTicket(self.generation);
        self.armed = Some(ArmedRestart { ticket, delay });
        ticket
    }

    /// Cancel the pending restart, if any
    pub fn disarm(&mut self) -> bool {
        self.armed.take().is_some()
    }

    pub fn armed(&self) -> Option<ArmedRestart> {
        self.armed
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Consume the pending restart if `ticket` is the current one
    pub fn take_if_current(&mut self, ticket: TimerTicket) -> bool {
        match self.armed {
            Some(armed) if armed.ticket == ticket => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }
}
