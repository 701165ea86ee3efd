//! Session state machine and background tick loop.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused -> Stopped -> Idle
//! ```
//!
//! `Stopped` only exists while the finished session is being committed to
//! the statistics store; it collapses back to `Idle` right after.
//!
//! ## Usage
//!
//! ```ignore
//! let controller = TimerController::new(store, notifier, &Config::default());
//! controller.start_mode(&ModeSelector::Preset(Preset::Pomodoro))?;
//! controller.pause()?;
//! controller.resume()?;
//! let summary = controller.stop().await?;
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::clock::SessionClock;
use super::params::ModeParameters;
use super::presets::ModeSelector;
use super::reminder::{ReminderFire, ReminderScheduler};
use crate::error::{CoreError, Result, SchedulerFault};
use crate::events::Event;
use crate::notifier::{format_remaining, Notifier, SharedNotifier};
use crate::storage::{AlertsConfig, Config, ModeRegistry, SharedStore, TimerConfig};

/// A state snapshot is published every this many ticks.
const HEARTBEAT_EVERY_TICKS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    /// Session ended; statistics are being committed.
    Stopped,
}

impl TimerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Stopped => "stopped",
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, TimerStatus::Running | TimerStatus::Paused)
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// `stop()` or `reset()` was called.
    Stopped,
    /// The countdown reached zero.
    Completed,
    /// The tick loop failed and forced an implicit stop.
    Faulted,
}

/// Result of a finished session, as committed to the statistics store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub mode: String,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
    pub elapsed_secs: u64,
    pub pause_secs: u64,
    pub reminders: u32,
    pub rest_minutes: u32,
    pub reason: FinishReason,
    /// Whether the statistics document was written successfully.
    pub saved: bool,
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub status: TimerStatus,
    pub session_id: Option<String>,
    pub mode: Option<String>,
    pub remaining_secs: u64,
    pub progress_pct: f64,
    pub reminders_fired: u32,
    pub paused: bool,
}

impl TimerSnapshot {
    fn idle() -> Self {
        Self {
            status: TimerStatus::Idle,
            session_id: None,
            mode: None,
            remaining_secs: 0,
            progress_pct: 0.0,
            reminders_fired: 0,
            paused: false,
        }
    }
}

struct ActiveSession {
    id: String,
    mode: String,
    params: ModeParameters,
    clock: SessionClock,
    reminders: ReminderScheduler,
    started_at: DateTime<Local>,
    generation: u64,
    cancel: CancellationToken,
}

struct Inner {
    status: TimerStatus,
    session: Option<ActiveSession>,
    ticker: Option<JoinHandle<()>>,
    last_reset: Option<Instant>,
    generation: u64,
}

struct Shared {
    inner: Mutex<Inner>,
    store: SharedStore,
    notifier: SharedNotifier,
    timer: TimerConfig,
    alerts: AlertsConfig,
}

enum TickOutcome {
    Continue,
    Completed(ActiveSession),
    /// The session this loop was driving is gone (stopped elsewhere).
    Detached,
}

/// Orchestrates [`SessionClock`] and [`ReminderScheduler`] for one session
/// at a time. Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct TimerController {
    shared: Arc<Shared>,
}

impl TimerController {
    pub fn new(store: SharedStore, notifier: SharedNotifier, config: &Config) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    status: TimerStatus::Idle,
                    session: None,
                    ticker: None,
                    last_reset: None,
                    generation: 0,
                }),
                store,
                notifier,
                timer: config.timer.clone(),
                alerts: config.alerts.clone(),
            }),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.shared.store
    }

    pub fn status(&self) -> TimerStatus {
        lock(&self.shared.inner).status
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let inner = lock(&self.shared.inner);
        let Some(session) = inner.session.as_ref() else {
            return TimerSnapshot {
                status: inner.status,
                ..TimerSnapshot::idle()
            };
        };
        let now = now();
        TimerSnapshot {
            status: inner.status,
            session_id: Some(session.id.clone()),
            mode: Some(session.mode.clone()),
            remaining_secs: ceil_secs(session.clock.remaining_at(now)),
            progress_pct: session.clock.progress_at(now),
            reminders_fired: session.reminders.fired(),
            paused: session.clock.is_paused(),
        }
    }

    /// Start a session with explicit parameters. Returns the session id.
    ///
    /// # Errors
    /// Validation errors leave the controller untouched. Returns
    /// [`CoreError::ConcurrencyConflict`] if a session is already active and
    /// [`CoreError::NoRuntime`] outside a tokio runtime.
    pub fn start(&self, params: ModeParameters, mode: impl Into<String>) -> Result<String> {
        params.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| CoreError::NoRuntime)?;
        let mode = mode.into();

        let (session_id, started_at) = {
            let mut inner = lock(&self.shared.inner);
            if inner.status != TimerStatus::Idle {
                return Err(CoreError::ConcurrencyConflict {
                    state: inner.status.to_string(),
                });
            }

            let now = now();
            let clock = SessionClock::start_at(params.total(), now)?;
            let reminders = ReminderScheduler::new(&params, now)?;

            lock(&self.shared.store).lock_modes(mode.clone());

            inner.generation += 1;
            let generation = inner.generation;
            let cancel = CancellationToken::new();
            let session = ActiveSession {
                id: Uuid::new_v4().to_string(),
                mode: mode.clone(),
                params,
                clock,
                reminders,
                started_at: Local::now(),
                generation,
                cancel: cancel.clone(),
            };
            let ids = (session.id.clone(), session.started_at);
            inner.session = Some(session);
            inner.status = TimerStatus::Running;
            inner.ticker = Some(runtime.spawn(run_loop(
                Arc::clone(&self.shared),
                cancel,
                generation,
            )));
            ids
        };

        info!(session_id = %session_id, mode = %mode, total_secs = params.total().as_secs(), "session started");
        let alerts = &self.shared.alerts;
        self.shared.notify("session start", |notifier| {
            if alerts.sound_enabled {
                notifier.play_audio(&alerts.start_clip);
            }
            notifier.update_display(&format_remaining(params.total().as_secs()), 0.0);
            notifier.publish(&Event::SessionStarted {
                session_id: session_id.clone(),
                mode,
                total_secs: params.total().as_secs(),
                at: started_at,
            });
        });
        Ok(session_id)
    }

    /// Resolve `selector` and start a session with it. Starting a custom mode
    /// counts as one use of it.
    pub fn start_mode(&self, selector: &ModeSelector) -> Result<String> {
        let params = selector.resolve(&lock(&self.shared.store))?;
        let session_id = self.start(params, selector.id())?;
        if let ModeSelector::Custom(key) = selector {
            let mut store = lock(&self.shared.store);
            if let Err(e) = ModeRegistry::new(&mut store).record_usage(key) {
                warn!(error = %e, mode = %key, "failed to record mode usage");
            }
        }
        Ok(session_id)
    }

    /// Running -> Paused. Returns `false` when there was nothing to pause.
    pub fn pause(&self) -> Result<bool> {
        let remaining = {
            let mut inner = lock(&self.shared.inner);
            if inner.status != TimerStatus::Running {
                return Ok(false);
            }
            let Some(session) = inner.session.as_mut() else {
                return Ok(false);
            };
            let now = now();
            session.clock.pause_at(now);
            let remaining = session.clock.remaining_at(now);
            inner.status = TimerStatus::Paused;
            remaining
        };

        debug!(remaining_secs = remaining.as_secs(), "session paused");
        self.shared.notify("pause", |notifier| {
            notifier.publish(&Event::SessionPaused {
                remaining_secs: ceil_secs(remaining),
                at: Local::now(),
            });
        });
        Ok(true)
    }

    /// Paused -> Running. The clock and the reminder schedule are both moved
    /// forward by the length of the pause.
    pub fn resume(&self) -> Result<bool> {
        let (remaining, paused) = {
            let mut inner = lock(&self.shared.inner);
            if inner.status != TimerStatus::Paused {
                return Ok(false);
            }
            let Some(session) = inner.session.as_mut() else {
                return Ok(false);
            };
            let now = now();
            let delta = session.clock.resume_at(now)?;
            session.reminders.shift(delta)?;
            let remaining = session.clock.remaining_at(now);
            inner.status = TimerStatus::Running;
            (remaining, delta)
        };

        debug!(paused_secs = paused.as_secs(), "session resumed");
        self.shared.notify("resume", |notifier| {
            notifier.publish(&Event::SessionResumed {
                remaining_secs: ceil_secs(remaining),
                paused_secs: paused.as_secs(),
                at: Local::now(),
            });
        });
        Ok(true)
    }

    /// Stop the active session, wait for its tick loop to exit and commit
    /// it. Returns `None` when no session was active.
    pub async fn stop(&self) -> Result<Option<SessionSummary>> {
        let (session, ticker) = {
            let mut inner = lock(&self.shared.inner);
            let Some(session) = inner.session.take() else {
                return Ok(None);
            };
            inner.status = TimerStatus::Stopped;
            (session, inner.ticker.take())
        };

        session.cancel.cancel();
        if let Some(ticker) = ticker {
            if let Err(e) = ticker.await {
                warn!(error = %e, "tick loop ended abnormally");
            }
        }
        Ok(Some(self.shared.finish(session, FinishReason::Stopped)))
    }

    /// Return to Idle from any state. A reset arriving within the debounce
    /// window of the previous one is ignored and returns `false`.
    pub async fn reset(&self) -> Result<bool> {
        let now = now();
        {
            let mut inner = lock(&self.shared.inner);
            if let Some(last) = inner.last_reset {
                if now.saturating_duration_since(last) < self.shared.timer.reset_debounce() {
                    debug!("reset ignored (debounce)");
                    return Ok(false);
                }
            }
            inner.last_reset = Some(now);
        }

        if self.status().is_active() {
            self.stop().await?;
        }
        self.shared.notify("reset", |notifier| {
            notifier.update_display(&format_remaining(0), 0.0);
            notifier.publish(&Event::SessionReset { at: Local::now() });
        });
        Ok(true)
    }
}

impl Shared {
    /// Evaluate one tick. Notifier calls happen after the state lock is
    /// released.
    fn tick(self: &Arc<Self>, generation: u64, heartbeat: bool) -> Result<TickOutcome, SchedulerFault> {
        let now = now();
        let mut inner = lock(&self.inner);
        let status = inner.status;
        let Some(session) = inner
            .session
            .as_mut()
            .filter(|s| s.generation == generation)
        else {
            return Ok(TickOutcome::Detached);
        };

        let remaining = session.clock.remaining_at(now);
        let progress = session.clock.progress_at(now);
        let mut fire = None;
        if !session.clock.is_paused() {
            if session.clock.is_complete_at(now) {
                let session = inner.session.take();
                inner.status = TimerStatus::Stopped;
                // This task owns the handle; dropping it detaches.
                inner.ticker.take();
                drop(inner);
                self.notifier.update_display(&format_remaining(0), 100.0);
                return Ok(session.map_or(TickOutcome::Detached, TickOutcome::Completed));
            }
            fire = session.reminders.evaluate(now)?;
        }
        drop(inner);

        self.notifier
            .update_display(&format_remaining(ceil_secs(remaining)), progress);
        if heartbeat {
            self.notifier.publish(&Event::StateSnapshot {
                status,
                remaining_secs: ceil_secs(remaining),
                progress_pct: progress,
                at: Local::now(),
            });
        }
        if let Some(fire) = fire {
            self.remind(fire, generation);
        }
        Ok(TickOutcome::Continue)
    }

    fn remind(self: &Arc<Self>, fire: ReminderFire, generation: u64) {
        info!(cycle = fire.cycle, "reminder fired");
        self.alert(&self.alerts.reminder_clip);
        self.notifier.publish(&Event::ReminderFired {
            cycle: fire.cycle,
            secondary: false,
            at: Local::now(),
        });

        if let Some(delay) = fire.secondary_after {
            let shared = Arc::clone(self);
            tokio::spawn(async move {
                time::sleep(delay).await;
                if !shared.is_running(generation) {
                    debug!(cycle = fire.cycle, "secondary reminder dropped");
                    return;
                }
                info!(cycle = fire.cycle, "secondary reminder fired");
                shared.alert(&shared.alerts.secondary_clip);
                shared.notifier.publish(&Event::ReminderFired {
                    cycle: fire.cycle,
                    secondary: true,
                    at: Local::now(),
                });
            });
        }
    }

    fn alert(&self, clip: &str) {
        if self.alerts.sound_enabled {
            self.notifier.play_audio(clip);
        }
        if self.alerts.visual_effect_enabled {
            self.notifier.trigger_visual_effect();
        }
    }

    fn is_running(&self, generation: u64) -> bool {
        let inner = lock(&self.inner);
        inner.status == TimerStatus::Running
            && inner
                .session
                .as_ref()
                .is_some_and(|s| s.generation == generation && !s.clock.is_paused())
    }

    /// Take ownership of the session after a fault, unless `stop()` already did.
    fn claim(&self, generation: u64) -> Option<ActiveSession> {
        let mut inner = lock(&self.inner);
        if !inner
            .session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
        {
            return None;
        }
        inner.status = TimerStatus::Stopped;
        inner.ticker.take();
        inner.session.take()
    }

    /// Commit a finished session exactly once and return to Idle.
    fn finish(&self, session: ActiveSession, reason: FinishReason) -> SessionSummary {
        let now = now();
        let elapsed = session.clock.elapsed_work_at(now).min(session.clock.total());
        let wall = now.saturating_duration_since(session.clock.start_time());
        let pause = wall.saturating_sub(elapsed);

        let saved = {
            let mut store = lock(&self.store);
            store.unlock_modes();
            store.record_session(elapsed);
            store.save()
        };

        let summary = SessionSummary {
            session_id: session.id,
            mode: session.mode,
            started_at: session.started_at,
            ended_at: Local::now(),
            elapsed_secs: elapsed.as_secs(),
            pause_secs: pause.as_secs(),
            reminders: session.reminders.fired(),
            rest_minutes: session.params.rest_minutes,
            reason,
            saved,
        };
        lock(&self.inner).status = TimerStatus::Idle;

        info!(
            session_id = %summary.session_id,
            mode = %summary.mode,
            elapsed_secs = summary.elapsed_secs,
            reason = ?reason,
            saved,
            "session finished"
        );
        // Already committed; a failing notifier cannot undo that.
        self.notify("session finish", |notifier| {
            if self.alerts.sound_enabled {
                notifier.play_audio(&self.alerts.end_clip);
            }
            notifier.update_display(&format_remaining(session.params.total().as_secs()), 0.0);
            notifier.publish(&Event::SessionFinished {
                session_id: summary.session_id.clone(),
                reason,
                elapsed_secs: summary.elapsed_secs,
                reminders: summary.reminders,
                rest_minutes: summary.rest_minutes,
                at: summary.ended_at,
            });
        });
        summary
    }

    /// Run notifier calls made outside the tick loop. A panic is logged and
    /// swallowed so it never reaches the caller.
    fn notify(&self, action: &'static str, f: impl FnOnce(&dyn Notifier)) {
        let notifier = self.notifier.as_ref();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(notifier))) {
            let fault = SchedulerFault::Panicked(panic_message(payload.as_ref()));
            error!(action, error = %fault, "notifier failed");
        }
    }
}

async fn run_loop(shared: Arc<Shared>, cancel: CancellationToken, generation: u64) {
    let mut ticker = time::interval(shared.timer.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u32 = 0;

    let finished = loop {
        tokio::select! {
            _ = cancel.cancelled() => break None,
            _ = ticker.tick() => {}
        }
        ticks = ticks.wrapping_add(1);
        let heartbeat = ticks % HEARTBEAT_EVERY_TICKS == 0;

        let fault = match panic::catch_unwind(AssertUnwindSafe(|| shared.tick(generation, heartbeat))) {
            Ok(Ok(TickOutcome::Continue)) => continue,
            Ok(Ok(TickOutcome::Completed(session))) => break Some((session, FinishReason::Completed)),
            Ok(Ok(TickOutcome::Detached)) => break None,
            Ok(Err(fault)) => fault,
            Err(payload) => SchedulerFault::Panicked(panic_message(payload.as_ref())),
        };
        error!(error = %fault, "tick failed; stopping session");
        break shared
            .claim(generation)
            .map(|session| (session, FinishReason::Faulted));
    };

    if let Some((session, reason)) = finished {
        shared.finish(session, reason);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Monotonic now. Goes through tokio so paused test time applies.
fn now() -> Instant {
    time::Instant::now().into_std()
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
