//! Integration tests for full focus sessions.
//!
//! These tests drive the controller against an on-disk statistics document
//! and verify what a later process would read back from it.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use focusbell_core::storage::{ModeDetails, STATISTICS_FILE};
use focusbell_core::{
    Config, Event, FinishReason, ModeParameters, ModeRegistry, ModeSelector, Notifier,
    NullNotifier, Preset, StatisticsStore, TimerController, TimerStatus,
};
use tempfile::TempDir;

#[derive(Default)]
struct EventLog(Mutex<Vec<Event>>);

impl Notifier for EventLog {
    fn play_audio(&self, _clip: &str) {}
    fn trigger_visual_effect(&self) {}
    fn update_display(&self, _remaining: &str, _progress_pct: f64) {}
    fn publish(&self, event: &Event) {
        self.0.lock().unwrap().push(event.clone());
    }
}

fn controller_at(path: &Path) -> TimerController {
    let store = StatisticsStore::load(path).into_shared();
    TimerController::new(store, Arc::new(NullNotifier), &Config::default())
}

#[tokio::test(start_paused = true)]
async fn test_stopped_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(STATISTICS_FILE);

    let controller = controller_at(&path);
    controller
        .start(ModeParameters::new(25, 25, 0, 5, 0), "preset:pomodoro")
        .unwrap();
    tokio::time::sleep(Duration::from_secs(90)).await;
    let summary = controller.stop().await.unwrap().unwrap();
    assert!(summary.saved);
    assert_eq!(summary.elapsed_secs, 90);

    let reloaded = StatisticsStore::load(&path);
    assert_eq!(reloaded.today().sessions, 1);
    assert_eq!(reloaded.today().work_time_seconds, 90);
    assert_eq!(reloaded.totals().total_sessions, 1);
    assert_eq!(reloaded.totals().total_work_time_seconds, 90);
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_sessions_accumulate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(STATISTICS_FILE);
    let controller = controller_at(&path);

    for _ in 0..3 {
        controller
            .start_mode(&ModeSelector::Preset(Preset::Sprint))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        controller.stop().await.unwrap();
    }

    let reloaded = StatisticsStore::load(&path);
    assert_eq!(reloaded.today().sessions, 3);
    assert_eq!(reloaded.totals().total_work_time_seconds, 180);
}

#[tokio::test(start_paused = true)]
async fn test_completed_custom_mode_session() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(STATISTICS_FILE);

    let mut store = StatisticsStore::load(&path);
    let key = ModeRegistry::new(&mut store)
        .save(
            "Short",
            ModeParameters::new(2, 1, 0, 1, 5),
            ModeDetails::default(),
        )
        .unwrap();
    let log = Arc::new(EventLog::default());
    let controller = TimerController::new(store.into_shared(), log.clone(), &Config::default());

    controller
        .start_mode(&ModeSelector::Custom(key.clone()))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(125)).await;
    assert_eq!(controller.status(), TimerStatus::Idle);

    let events = log.0.lock().unwrap().clone();
    let primaries = events
        .iter()
        .filter(|e| matches!(e, Event::ReminderFired { secondary: false, .. }))
        .count();
    let secondaries = events
        .iter()
        .filter(|e| matches!(e, Event::ReminderFired { secondary: true, .. }))
        .count();
    // The reminder due at the 2 minute mark coincides with completion.
    assert_eq!(primaries, 1);
    assert_eq!(secondaries, 1);
    assert!(matches!(
        events.last(),
        Some(Event::SessionFinished {
            reason: FinishReason::Completed,
            elapsed_secs: 120,
            ..
        })
    ));

    let reloaded = StatisticsStore::load(&path);
    assert_eq!(reloaded.today().sessions, 1);
    let mode = &reloaded.document().custom_modes[&key];
    assert_eq!(mode.use_count, 1);
    assert!(mode.last_used.is_some());
    assert_eq!(reloaded.document().custom_mode_history.recent, vec![key]);
}

#[tokio::test(start_paused = true)]
async fn test_reset_twice_within_debounce_window() {
    let dir = TempDir::new().unwrap();
    let controller = controller_at(&dir.path().join(STATISTICS_FILE));
    controller
        .start_mode(&ModeSelector::Preset(Preset::DeepFocus))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(controller.reset().await.unwrap());
    assert!(!controller.reset().await.unwrap());
    assert_eq!(controller.status(), TimerStatus::Idle);
    let store = controller.store().lock().unwrap();
    assert_eq!(store.today().sessions, 1);
    assert_eq!(store.today().work_time_seconds, 30);
}
