//! Interval + jitter reminder scheduling.
//!
//! Each cycle is anchored to `next_base`, never to the jittered fire time, so
//! random delays do not accumulate into cadence drift. The jitter for a cycle
//! is drawn lazily, the first time the base time is reached.

use std::time::{Duration, Instant};

use rand::prelude::*;
use rand_pcg::Pcg64;

use super::params::ModeParameters;
use crate::error::SchedulerFault;

/// A primary reminder that came due during `evaluate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderFire {
    /// 1-based cycle number within the session.
    pub cycle: u32,
    pub base: Instant,
    pub scheduled: Instant,
    /// Delay of the follow-up reminder, if one is configured.
    pub secondary_after: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ReminderScheduler {
    interval: Duration,
    jitter_bound: Duration,
    second_delay: Duration,
    next_base: Instant,
    next_actual: Option<Instant>,
    last_scheduled: Option<Instant>,
    fired: u32,
    rng: Pcg64,
}

impl ReminderScheduler {
    /// First reminder is due one interval after `session_start`.
    pub fn new(params: &ModeParameters, session_start: Instant) -> Result<Self, SchedulerFault> {
        Self::with_rng(params, session_start, Pcg64::from_entropy())
    }

    /// Deterministic jitter for tests and replays.
    pub fn seeded(
        params: &ModeParameters,
        session_start: Instant,
        seed: u64,
    ) -> Result<Self, SchedulerFault> {
        Self::with_rng(params, session_start, Pcg64::seed_from_u64(seed))
    }

    fn with_rng(
        params: &ModeParameters,
        session_start: Instant,
        rng: Pcg64,
    ) -> Result<Self, SchedulerFault> {
        let interval = params.interval();
        let next_base = session_start
            .checked_add(interval)
            .ok_or(SchedulerFault::ClockOverflow("first reminder base"))?;
        Ok(Self {
            interval,
            jitter_bound: params.jitter_bound(),
            second_delay: params.second_delay(),
            next_base,
            next_actual: None,
            last_scheduled: None,
            fired: 0,
            rng,
        })
    }

    pub fn next_base(&self) -> Instant {
        self.next_base
    }

    pub fn next_actual(&self) -> Option<Instant> {
        self.next_actual
    }

    pub fn fired(&self) -> u32 {
        self.fired
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn jitter_bound(&self) -> Duration {
        self.jitter_bound
    }

    /// One scheduling step. Returns the primary reminder if it is due.
    pub fn evaluate(&mut self, now: Instant) -> Result<Option<ReminderFire>, SchedulerFault> {
        if self.next_actual.is_none() && now >= self.next_base {
            let jitter = self.draw_jitter();
            let actual = self
                .next_base
                .checked_add(jitter)
                .ok_or(SchedulerFault::ClockOverflow("jittered reminder time"))?;
            // A jitter wider than the interval could otherwise schedule this
            // cycle ahead of the previous one.
            let actual = match self.last_scheduled {
                Some(prev) if prev > actual => prev,
                _ => actual,
            };
            self.next_actual = Some(actual);
        }

        let Some(actual) = self.next_actual else {
            return Ok(None);
        };
        if now < actual {
            return Ok(None);
        }

        let base = self.next_base;
        self.next_base = base
            .checked_add(self.interval)
            .ok_or(SchedulerFault::ClockOverflow("next reminder base"))?;
        self.next_actual = None;
        self.last_scheduled = Some(actual);
        self.fired += 1;

        Ok(Some(ReminderFire {
            cycle: self.fired,
            base,
            scheduled: actual,
            secondary_after: (!self.second_delay.is_zero()).then_some(self.second_delay),
        }))
    }

    /// Move pending reminder times forward by a pause delta.
    pub fn shift(&mut self, delta: Duration) -> Result<(), SchedulerFault> {
        if delta.is_zero() {
            return Ok(());
        }
        self.next_base = self
            .next_base
            .checked_add(delta)
            .ok_or(SchedulerFault::ClockOverflow("shifted reminder base"))?;
        if let Some(actual) = self.next_actual {
            self.next_actual = Some(
                actual
                    .checked_add(delta)
                    .ok_or(SchedulerFault::ClockOverflow("shifted reminder time"))?,
            );
        }
        if let Some(prev) = self.last_scheduled {
            self.last_scheduled = prev.checked_add(delta);
        }
        Ok(())
    }

    /// Uniform over the closed range [0, jitter_bound], millisecond resolution.
    fn draw_jitter(&mut self) -> Duration {
        let bound_ms = self.jitter_bound.as_millis() as u64;
        if bound_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.gen_range(0..=bound_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MIN: Duration = Duration::from_secs(60);

    fn params(interval: u32, random: u32, second: u32) -> ModeParameters {
        ModeParameters::new(120, interval, random, 5, second)
    }

    #[test]
    fn zero_jitter_fires_exactly_on_interval() {
        let t0 = Instant::now();
        let mut sched = ReminderScheduler::seeded(&params(10, 0, 0), t0, 1).unwrap();

        assert!(sched.evaluate(t0 + MIN * 9).unwrap().is_none());
        let fire = sched.evaluate(t0 + MIN * 10).unwrap().unwrap();
        assert_eq!(fire.cycle, 1);
        assert_eq!(fire.scheduled, t0 + MIN * 10);
        assert_eq!(fire.secondary_after, None);
        assert_eq!(sched.next_base(), t0 + MIN * 20);
        assert!(sched.next_actual().is_none());
    }

    #[test]
    fn jitter_is_drawn_once_per_cycle() {
        let t0 = Instant::now();
        let mut sched = ReminderScheduler::seeded(&params(10, 3, 0), t0, 7).unwrap();
        let base = t0 + MIN * 10;
        if sched.evaluate(base).unwrap().is_none() {
            let drawn = sched.next_actual();
            assert!(drawn.is_some());
            assert!(sched.evaluate(base).unwrap().is_none());
            assert_eq!(sched.next_actual(), drawn);
        }
    }

    #[test]
    fn secondary_delay_is_reported() {
        let t0 = Instant::now();
        let mut sched = ReminderScheduler::seeded(&params(5, 0, 8), t0, 1).unwrap();
        let fire = sched.evaluate(t0 + MIN * 5).unwrap().unwrap();
        assert_eq!(fire.secondary_after, Some(Duration::from_secs(8)));
    }

    #[test]
    fn cadence_is_anchored_to_base_not_fire_time() {
        let t0 = Instant::now();
        let mut sched = ReminderScheduler::seeded(&params(10, 0, 0), t0, 1).unwrap();
        // Evaluated late: fires at +13 but the next base stays at +20.
        let fire = sched.evaluate(t0 + MIN * 13).unwrap().unwrap();
        assert_eq!(fire.base, t0 + MIN * 10);
        assert_eq!(sched.next_base(), t0 + MIN * 20);
    }

    #[test]
    fn shift_moves_base_and_actual() {
        let t0 = Instant::now();
        let mut sched = ReminderScheduler::seeded(&params(10, 5, 0), t0, 3).unwrap();
        let _ = sched.evaluate(t0 + MIN * 10).unwrap();
        let base = sched.next_base();
        let actual = sched.next_actual();
        sched.shift(MIN * 2).unwrap();
        assert_eq!(sched.next_base(), base + MIN * 2);
        assert_eq!(sched.next_actual(), actual.map(|a| a + MIN * 2));
    }

    #[test]
    fn zero_shift_leaves_schedule_unchanged() {
        let t0 = Instant::now();
        let mut sched = ReminderScheduler::seeded(&params(10, 5, 0), t0, 3).unwrap();
        let base = sched.next_base();
        sched.shift(Duration::ZERO).unwrap();
        assert_eq!(sched.next_base(), base);
        assert_eq!(sched.next_actual(), None);
    }

    proptest! {
        #[test]
        fn fires_stay_within_jitter_window_and_never_go_backwards(
            interval in 1u32..30,
            random in 0u32..10,
            seed in any::<u64>(),
        ) {
            let t0 = Instant::now();
            let mut sched = ReminderScheduler::seeded(&params(interval, random, 0), t0, seed).unwrap();
            let bound = Duration::from_secs(u64::from(random) * 60);
            let step = Duration::from_secs(5);

            let mut last: Option<Instant> = None;
            let mut now = t0;
            let horizon = t0 + Duration::from_secs(u64::from(interval + random) * 60 * 6);
            while now <= horizon {
                if let Some(fire) = sched.evaluate(now).unwrap() {
                    prop_assert!(fire.scheduled >= fire.base);
                    prop_assert!(fire.scheduled <= fire.base + bound);
                    prop_assert!(fire.scheduled <= now);
                    if let Some(prev) = last {
                        prop_assert!(fire.scheduled >= prev);
                    }
                    last = Some(fire.scheduled);
                }
                now += step;
            }
            prop_assert!(sched.fired() >= 1);
        }
    }
}
