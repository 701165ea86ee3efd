mod clock;
mod controller;
mod params;
mod presets;
mod reminder;

pub use clock::SessionClock;
pub use controller::{FinishReason, SessionSummary, TimerController, TimerSnapshot, TimerStatus};
pub use params::{ModeParameters, MAX_MINUTES, MAX_SECOND_REMINDER_DELAY};
pub use presets::{ModeSelector, Preset};
pub use reminder::{ReminderFire, ReminderScheduler};
