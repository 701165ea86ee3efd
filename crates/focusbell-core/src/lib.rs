//! # Focusbell Core Library
//!
//! This library provides the core logic of the Focusbell focus timer: a
//! countdown session that fires reminders at a fixed interval plus bounded
//! random jitter, with pause/resume accounting and persistent statistics.
//! Front ends (the `focusbell` CLI, a desktop shell) are thin layers that
//! implement [`Notifier`] and call into [`TimerController`].
//!
//! ## Architecture
//!
//! - **Timer**: [`SessionClock`] and [`ReminderScheduler`] hold pure timing
//!   state; [`TimerController`] owns the state machine and a tokio tick loop
//! - **Storage**: one JSON statistics document (daily records, totals, custom
//!   modes, mode history) and TOML-based configuration
//! - **Notifier**: the outbound seam for sound, visual effects and display
//!
//! ## Key Components
//!
//! - [`TimerController`]: Session lifecycle and reminder dispatch
//! - [`StatisticsStore`]: Daily work records and custom mode persistence
//! - [`ModeRegistry`]: CRUD and usage ranking over custom modes
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod notifier;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, PersistenceError, SchedulerFault, ValidationError};
pub use events::Event;
pub use notifier::{Notifier, NullNotifier, SharedNotifier};
pub use storage::{Config, CustomMode, ModeRegistry, SharedStore, StatisticsStore, StatsDocument};
pub use timer::{
    FinishReason, ModeParameters, ModeSelector, Preset, ReminderScheduler, SessionClock,
    SessionSummary, TimerController, TimerSnapshot, TimerStatus,
};
