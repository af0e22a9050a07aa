//! # Interval policy for timer triggers.
//!
//! [`IntervalPolicy`] yields the delay until the next firing of an interval
//! cycle: the configured interval, optionally jittered, never below
//! [`MIN_DELAY`](crate::config::MIN_DELAY).

use std::time::Duration;

use super::JitterPolicy;
use crate::config::MIN_DELAY;

/// Delay generator for interval cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntervalPolicy {
    /// Nominal interval between two firings.
    pub every: Duration,
    /// Randomisation applied to every delay.
    pub jitter: JitterPolicy,
}

impl IntervalPolicy {
    /// Fixed interval.
    pub fn fixed(every: Duration) -> Self {
        Self {
            every,
            jitter: JitterPolicy::None,
        }
    }

    /// Random delay in `[0, every]` per firing.
    pub fn random(every: Duration) -> Self {
        Self {
            every,
            jitter: JitterPolicy::Full,
        }
    }

    /// Delay until the next firing.
    pub fn next(&self) -> Duration {
        self.jitter.apply(self.every).max(MIN_DELAY)
    }
}
