use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Upper bound for every minute-valued parameter (one day).
pub const MAX_MINUTES: u32 = 24 * 60;
/// Upper bound for the secondary reminder delay, in seconds.
pub const MAX_SECOND_REMINDER_DELAY: u32 = 60 * 60;

/// Canonical timing parameters for one session.
///
/// Built-in presets and custom modes both resolve to this value before it
/// reaches the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeParameters {
    pub total_minutes: u32,
    pub interval_minutes: u32,
    /// Upper bound of the random jitter added to each reminder.
    pub random_minutes: u32,
    pub rest_minutes: u32,
    /// Delay of the secondary reminder in seconds; 0 disables it.
    pub second_reminder_delay: u32,
}

impl ModeParameters {
    pub fn new(
        total_minutes: u32,
        interval_minutes: u32,
        random_minutes: u32,
        rest_minutes: u32,
        second_reminder_delay: u32,
    ) -> Self {
        Self {
            total_minutes,
            interval_minutes,
            random_minutes,
            rest_minutes,
            second_reminder_delay,
        }
    }

    /// Check every range invariant. The first violation wins.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check("total_minutes", self.total_minutes, 1, MAX_MINUTES)?;
        check("interval_minutes", self.interval_minutes, 1, MAX_MINUTES)?;
        check("random_minutes", self.random_minutes, 0, MAX_MINUTES)?;
        check("rest_minutes", self.rest_minutes, 1, MAX_MINUTES)?;
        check(
            "second_reminder_delay",
            self.second_reminder_delay,
            0,
            MAX_SECOND_REMINDER_DELAY,
        )?;
        Ok(())
    }

    pub fn total(&self) -> Duration {
        minutes(self.total_minutes)
    }

    pub fn interval(&self) -> Duration {
        minutes(self.interval_minutes)
    }

    pub fn jitter_bound(&self) -> Duration {
        minutes(self.random_minutes)
    }

    pub fn rest(&self) -> Duration {
        minutes(self.rest_minutes)
    }

    pub fn second_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.second_reminder_delay))
    }
}

impl Default for ModeParameters {
    fn default() -> Self {
        Self::new(90, 15, 2, 20, 10)
    }
}

fn minutes(m: u32) -> Duration {
    Duration::from_secs(u64::from(m) * 60)
}

fn check(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_are_valid() {
        assert!(ModeParameters::default().validate().is_ok());
    }

    #[test]
    fn zero_total_is_rejected() {
        let err = ModeParameters::new(0, 10, 0, 5, 0).validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::OutOfRange {
                field: "total_minutes",
                ..
            }
        ));
    }

    #[test]
    fn zero_interval_and_rest_are_rejected() {
        assert!(ModeParameters::new(25, 0, 0, 5, 0).validate().is_err());
        assert!(ModeParameters::new(25, 5, 0, 0, 0).validate().is_err());
    }

    #[test]
    fn zero_random_and_second_delay_are_allowed() {
        assert!(ModeParameters::new(25, 25, 0, 5, 0).validate().is_ok());
    }

    #[test]
    fn oversized_values_are_rejected() {
        assert!(ModeParameters::new(MAX_MINUTES + 1, 10, 0, 5, 0)
            .validate()
            .is_err());
        assert!(ModeParameters::new(30, 10, 0, 5, MAX_SECOND_REMINDER_DELAY + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn durations_convert_minutes() {
        let p = ModeParameters::new(30, 10, 1, 5, 7);
        assert_eq!(p.total(), Duration::from_secs(1800));
        assert_eq!(p.interval(), Duration::from_secs(600));
        assert_eq!(p.jitter_bound(), Duration::from_secs(60));
        assert_eq!(p.second_delay(), Duration::from_secs(7));
    }
}
