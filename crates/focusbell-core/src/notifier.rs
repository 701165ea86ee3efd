//! Boundary to the presentation layer.
//!
//! The controller calls these methods from its tick task. Implementations must
//! return promptly and absorb their own failures (a missing audio device, a
//! closed window); the core never waits on or inspects a result.

use std::sync::Arc;

use crate::events::Event;

/// Audio clip names the core asks the front end to play.
pub mod clips {
    pub const SESSION_START: &str = "start";
    pub const SESSION_END: &str = "end";
    pub const REMINDER: &str = "reminder";
    pub const SECONDARY: &str = "secondary";
}

pub trait Notifier: Send + Sync {
    fn play_audio(&self, clip: &str);

    fn trigger_visual_effect(&self);

    fn update_display(&self, remaining: &str, progress_pct: f64);

    /// Structured lifecycle events. Ignored by default.
    fn publish(&self, _event: &Event) {}
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn play_audio(&self, _clip: &str) {}

    fn trigger_visual_effect(&self) {}

    fn update_display(&self, _remaining: &str, _progress_pct: f64) {}
}

pub type SharedNotifier = Arc<dyn Notifier>;

/// `MM:SS`, or `H:MM:SS` once the value reaches an hour.
pub fn format_remaining(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_hours() {
        assert_eq!(format_remaining(0), "00:00");
        assert_eq!(format_remaining(25 * 60), "25:00");
        assert_eq!(format_remaining(61), "01:01");
        assert_eq!(format_remaining(90 * 60 + 5), "1:30:05");
    }
}
