use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use clap::{Args, Subcommand};
use focusbell_core::notifier::{clips, format_remaining};
use focusbell_core::{
    Config, Event, FinishReason, ModeParameters, ModeSelector, Notifier, TimerController,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;

use super::{open_store, CmdResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run a focus session in the foreground.
    ///
    /// While it runs, type `p` to pause, `r` to resume and `s` to stop.
    /// Ctrl-C also stops the session; the time worked so far is recorded.
    Run(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Preset id, `preset:<id>` or `custom:<key>` (defaults to timer.default_mode)
    #[arg(conflicts_with = "total")]
    mode: Option<String>,
    /// Session length in minutes, instead of a saved mode
    #[arg(long, requires = "interval")]
    total: Option<u32>,
    /// Minutes between reminders
    #[arg(long, requires = "total")]
    interval: Option<u32>,
    /// Maximum random delay added to each reminder, in minutes
    #[arg(long, default_value = "0")]
    random: u32,
    /// Suggested rest after the session, in minutes
    #[arg(long, default_value = "5")]
    rest: u32,
    /// Delay of the follow-up reminder in seconds
    #[arg(long, default_value = "0")]
    second: u32,
    /// Print events as JSON lines instead of a countdown
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn explicit_params(&self) -> Option<ModeParameters> {
        let (total, interval) = (self.total?, self.interval?);
        Some(ModeParameters::new(total, interval, self.random, self.rest, self.second))
    }
}

/// Renders the session on the terminal.
struct TerminalNotifier {
    json: bool,
    last_line: Mutex<String>,
    /// Signalled once the finish message has been written.
    finished: Notify,
}

impl TerminalNotifier {
    fn new(json: bool) -> Self {
        Self {
            json,
            last_line: Mutex::new(String::new()),
            finished: Notify::new(),
        }
    }
}

impl Notifier for TerminalNotifier {
    fn play_audio(&self, clip: &str) {
        tracing::debug!(clip, "audio cue");
        if !self.json && clip != clips::SESSION_START {
            eprint!("\x07");
        }
    }

    fn trigger_visual_effect(&self) {
        if !self.json {
            println!("\n*** check in: are you still on task? ***");
        }
    }

    fn update_display(&self, remaining: &str, progress_pct: f64) {
        if self.json {
            return;
        }
        let line = format!("{remaining}  {progress_pct:>3.0}%");
        let mut last = self.last_line.lock().unwrap_or_else(PoisonError::into_inner);
        if *last != line {
            print!("\r{line}   ");
            let _ = std::io::stdout().flush();
            *last = line;
        }
    }

    fn publish(&self, event: &Event) {
        self.render(event);
        if matches!(event, Event::SessionFinished { .. }) {
            self.finished.notify_one();
        }
    }
}

impl TerminalNotifier {
    fn render(&self, event: &Event) {
        if self.json {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
            return;
        }
        match event {
            Event::SessionStarted { mode, total_secs, .. } => {
                println!("{mode}: {} session started", format_remaining(*total_secs));
            }
            Event::SessionPaused { .. } => println!("\npaused"),
            Event::SessionResumed { .. } => println!("\nresumed"),
            Event::SessionFinished {
                reason,
                elapsed_secs,
                reminders,
                rest_minutes,
                ..
            } => {
                let verb = match reason {
                    FinishReason::Completed => "completed",
                    FinishReason::Stopped => "stopped",
                    FinishReason::Faulted => "aborted",
                };
                println!(
                    "\nsession {verb}: {} worked, {reminders} reminders",
                    format_remaining(*elapsed_secs)
                );
                if *reason == FinishReason::Completed {
                    println!("take a {rest_minutes} minute rest");
                }
            }
            _ => {}
        }
    }
}

pub fn run(action: TimerAction) -> CmdResult {
    match action {
        TimerAction::Run(args) => run_session(args),
    }
}

fn run_session(args: RunArgs) -> CmdResult {
    let config = Config::load_or_default();
    let store = open_store(&config)?.into_shared();
    let notifier = Arc::new(TerminalNotifier::new(args.json));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(async {
        let controller = TimerController::new(store, notifier.clone(), &config);
        match args.explicit_params() {
            Some(params) => controller.start(params, "adhoc")?,
            None => {
                let mode = args.mode.as_deref().unwrap_or(&config.timer.default_mode);
                let selector: ModeSelector = mode.parse()?;
                controller.start_mode(&selector)?
            }
        };
        drive(&controller, &notifier).await
    });
    // A pending stdin read would otherwise keep the runtime alive.
    runtime.shutdown_background();
    result
}

/// Wait until the session has finished and reported, relaying terminal
/// commands to it.
async fn drive(controller: &TimerController, notifier: &TerminalNotifier) -> CmdResult {
    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                controller.stop().await?;
                break;
            }
            line = commands.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "p" | "pause" => {
                        controller.pause()?;
                    }
                    "r" | "resume" => {
                        controller.resume()?;
                    }
                    "s" | "stop" | "q" => {
                        controller.stop().await?;
                        break;
                    }
                    "" => {}
                    other => eprintln!("unknown command '{other}' (p = pause, r = resume, s = stop)"),
                },
                Ok(None) | Err(_) => stdin_open = false,
            },
            _ = notifier.finished.notified() => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished_event() -> Event {
        serde_json::from_value(serde_json::json!({
            "type": "SessionFinished",
            "session_id": "s1",
            "reason": "completed",
            "elapsed_secs": 60,
            "reminders": 1,
            "rest_minutes": 5,
            "at": "2026-01-01T10:00:00+00:00"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn finish_message_releases_the_run_loop() {
        let notifier = TerminalNotifier::new(true);
        notifier.publish(&finished_event());
        // The permit is kept even though nobody was waiting yet.
        tokio::time::timeout(std::time::Duration::from_secs(1), notifier.finished.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn other_events_do_not_release_the_run_loop() {
        let notifier = TerminalNotifier::new(true);
        let reset: Event = serde_json::from_value(serde_json::json!({
            "type": "SessionReset",
            "at": "2026-01-01T10:00:00+00:00"
        }))
        .unwrap();
        notifier.publish(&reset);
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(50), notifier.finished.notified())
                .await;
        assert!(waited.is_err());
    }
}
