//! # Jitter policy for timer intervals.
//!
//! [`JitterPolicy`] randomises the delay between two firings of a timer trigger.
//!
//! - [`JitterPolicy::None`]: exact interval (`type: "time"`)
//! - [`JitterPolicy::Full`]: random delay in `[0, interval]` (`type: "random"`)

use rand::Rng;
use std::time::Duration;

/// Randomisation applied to an interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact interval.
    #[default]
    None,

    /// Random delay in `[0, interval]`.
    Full,
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return delay;
        }
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_exact() {
        let d = Duration::from_millis(250);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn test_full_stays_in_bounds() {
        let d = Duration::from_millis(100);
        for _ in 0..200 {
            assert!(JitterPolicy::Full.apply(d) <= d);
        }
    }

    #[test]
    fn test_zero_delay_is_untouched() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
    }
}
