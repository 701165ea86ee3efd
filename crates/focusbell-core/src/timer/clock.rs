//! Pure session timing state.
//!
//! All arithmetic uses monotonic [`Instant`]s. Each operation has an `*_at`
//! form taking an explicit `now` so behaviour can be exercised without
//! sleeping.

use std::time::{Duration, Instant};

use crate::error::SchedulerFault;

#[derive(Debug, Clone)]
pub struct SessionClock {
    start_time: Instant,
    end_time: Instant,
    total: Duration,
    pause_time: Option<Instant>,
    total_pause: Duration,
}

impl SessionClock {
    pub fn start(total: Duration) -> Result<Self, SchedulerFault> {
        Self::start_at(total, Instant::now())
    }

    pub fn start_at(total: Duration, now: Instant) -> Result<Self, SchedulerFault> {
        let end_time = now
            .checked_add(total)
            .ok_or(SchedulerFault::ClockOverflow("session end time"))?;
        Ok(Self {
            start_time: now,
            end_time,
            total,
            pause_time: None,
            total_pause: Duration::ZERO,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn end_time(&self) -> Instant {
        self.end_time
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn is_paused(&self) -> bool {
        self.pause_time.is_some()
    }

    pub fn total_pause(&self) -> Duration {
        self.total_pause
    }

    pub fn remaining(&self) -> Duration {
        self.remaining_at(Instant::now())
    }

    /// Time left until `end_time`. Frozen at the pause instant while paused.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.end_time.saturating_duration_since(self.effective_now(now))
    }

    pub fn is_complete_at(&self, now: Instant) -> bool {
        self.remaining_at(now).is_zero()
    }

    pub fn elapsed_work(&self) -> Duration {
        self.elapsed_work_at(Instant::now())
    }

    /// now - start - accumulated pauses.
    pub fn elapsed_work_at(&self, now: Instant) -> Duration {
        self.effective_now(now)
            .saturating_duration_since(self.start_time)
            .saturating_sub(self.total_pause)
    }

    pub fn progress(&self) -> f64 {
        self.progress_at(Instant::now())
    }

    /// 0.0 ..= 100.0
    pub fn progress_at(&self, now: Instant) -> f64 {
        if self.total.is_zero() {
            return 100.0;
        }
        let pct = self.elapsed_work_at(now).as_secs_f64() / self.total.as_secs_f64() * 100.0;
        pct.clamp(0.0, 100.0)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn pause(&mut self) {
        self.pause_at(Instant::now());
    }

    pub fn pause_at(&mut self, now: Instant) {
        if self.pause_time.is_none() {
            self.pause_time = Some(now);
        }
    }

    pub fn resume(&mut self) -> Result<Duration, SchedulerFault> {
        self.resume_at(Instant::now())
    }

    /// Returns the pause delta that was applied (zero if not paused).
    pub fn resume_at(&mut self, now: Instant) -> Result<Duration, SchedulerFault> {
        let Some(paused_at) = self.pause_time else {
            return Ok(Duration::ZERO);
        };
        let delta = now.saturating_duration_since(paused_at);
        let end_time = self
            .end_time
            .checked_add(delta)
            .ok_or(SchedulerFault::ClockOverflow("shifted end time"))?;
        self.end_time = end_time;
        self.total_pause += delta;
        self.pause_time = None;
        Ok(delta)
    }

    fn effective_now(&self, now: Instant) -> Instant {
        match self.pause_time {
            Some(paused_at) if paused_at < now => paused_at,
            _ => now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_secs(60);

    #[test]
    fn start_sets_end_time() {
        let t0 = Instant::now();
        let clock = SessionClock::start_at(MIN * 25, t0).unwrap();
        assert_eq!(clock.end_time(), t0 + MIN * 25);
        assert_eq!(clock.remaining_at(t0), MIN * 25);
        assert_eq!(clock.progress_at(t0), 0.0);
    }

    #[test]
    fn remaining_clamps_at_zero() {
        let t0 = Instant::now();
        let clock = SessionClock::start_at(MIN, t0).unwrap();
        assert_eq!(clock.remaining_at(t0 + MIN * 5), Duration::ZERO);
        assert!(clock.is_complete_at(t0 + MIN));
        assert_eq!(clock.progress_at(t0 + MIN * 5), 100.0);
    }

    #[test]
    fn pause_resume_shifts_end_time() {
        let t0 = Instant::now();
        let mut clock = SessionClock::start_at(MIN * 10, t0).unwrap();
        clock.pause_at(t0 + MIN * 2);
        // Second pause is a no-op.
        clock.pause_at(t0 + MIN * 3);
        assert_eq!(clock.remaining_at(t0 + MIN * 4), MIN * 8);

        let delta = clock.resume_at(t0 + MIN * 5).unwrap();
        assert_eq!(delta, MIN * 3);
        assert_eq!(clock.end_time(), t0 + MIN * 13);
        assert_eq!(clock.total_pause(), MIN * 3);
        assert_eq!(clock.elapsed_work_at(t0 + MIN * 6), MIN * 3);
        assert_eq!(clock.progress_at(t0 + MIN * 6), 30.0);
    }

    #[test]
    fn zero_length_pause_changes_nothing() {
        let t0 = Instant::now();
        let mut clock = SessionClock::start_at(MIN * 10, t0).unwrap();
        let before = clock.end_time();
        let t1 = t0 + MIN;
        clock.pause_at(t1);
        let delta = clock.resume_at(t1).unwrap();
        assert_eq!(delta, Duration::ZERO);
        assert_eq!(clock.end_time(), before);
        assert_eq!(clock.total_pause(), Duration::ZERO);
    }

    #[test]
    fn resume_without_pause_is_noop() {
        let t0 = Instant::now();
        let mut clock = SessionClock::start_at(MIN, t0).unwrap();
        assert_eq!(clock.resume_at(t0 + MIN).unwrap(), Duration::ZERO);
        assert_eq!(clock.end_time(), t0 + MIN);
    }
}
