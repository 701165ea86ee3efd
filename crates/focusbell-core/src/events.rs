use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::timer::{FinishReason, TimerStatus};

/// Every controller state change produces an Event.
/// Front ends receive them through [`crate::Notifier::publish`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        session_id: String,
        mode: String,
        total_secs: u64,
        at: DateTime<Local>,
    },
    SessionPaused {
        remaining_secs: u64,
        at: DateTime<Local>,
    },
    SessionResumed {
        remaining_secs: u64,
        /// Length of the pause that just ended.
        paused_secs: u64,
        at: DateTime<Local>,
    },
    ReminderFired {
        cycle: u32,
        /// `false` for the primary reminder, `true` for its delayed follow-up.
        secondary: bool,
        at: DateTime<Local>,
    },
    SessionFinished {
        session_id: String,
        reason: FinishReason,
        elapsed_secs: u64,
        reminders: u32,
        rest_minutes: u32,
        at: DateTime<Local>,
    },
    SessionReset {
        at: DateTime<Local>,
    },
    StateSnapshot {
        status: TimerStatus,
        remaining_secs: u64,
        progress_pct: f64,
        at: DateTime<Local>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Local> {
        match self {
            Event::SessionStarted { at, .. }
            | Event::SessionPaused { at, .. }
            | Event::SessionResumed { at, .. }
            | Event::ReminderFired { at, .. }
            | Event::SessionFinished { at, .. }
            | Event::SessionReset { at }
            | Event::StateSnapshot { at, .. } => *at,
        }
    }
}
