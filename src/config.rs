//! # Machine-wide scheduling configuration.
//!
//! Provides [`SchedulerConfig`], the settings every trigger of a machine reads
//! through its [`MachineView`](crate::trigger::MachineView), and [`Timing`],
//! the clamped snapshot of the three cycle durations.
//!
//! ## Sentinel values
//! - any duration of `0` is clamped to [`MIN_DELAY`] so a cycle can never spin
//! - `bus_capacity = 0` is clamped to 1

use std::time::Duration;

/// Smallest delay a cycle ever arms.
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// Global configuration for a machine.
///
/// ## Field semantics
/// - `cycle_time`: pace of continuous stepping, message loops and cycle-paced executes
/// - `repeat_cycle_time`: pace between passes of a repeat-until (`repeat: endless`)
/// - `fast_cycle_time`: pace between repetitions of a fast-paced execute
/// - `bus_capacity`: event bus ring buffer size
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Machine cycle time.
    pub cycle_time: Duration,

    /// Delay between two repeat-until passes.
    pub repeat_cycle_time: Duration,

    /// Delay between two repetitions of an execute call with `pace = true`.
    pub fast_cycle_time: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers lagging more than `bus_capacity` events skip older items.
    pub bus_capacity: usize,
}

impl SchedulerConfig {
    /// Returns the clamped cycle durations.
    #[inline]
    pub fn timing(&self) -> Timing {
        Timing {
            cycle: self.cycle_time.max(MIN_DELAY),
            repeat: self.repeat_cycle_time.max(MIN_DELAY),
            fast: self.fast_cycle_time.max(MIN_DELAY),
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a copy with a different machine cycle time.
    #[must_use]
    pub fn with_cycle_time(mut self, cycle_time: Duration) -> Self {
        self.cycle_time = cycle_time;
        self
    }
}

impl Default for SchedulerConfig {
    /// Default configuration:
    ///
    /// - `cycle_time = 100ms`
    /// - `repeat_cycle_time = 1ms`
    /// - `fast_cycle_time = 1ms`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            cycle_time: Duration::from_millis(100),
            repeat_cycle_time: Duration::from_millis(1),
            fast_cycle_time: Duration::from_millis(1),
            bus_capacity: 1024,
        }
    }
}

/// Clamped cycle durations handed to triggers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Machine cycle.
    pub cycle: Duration,
    /// Repeat-until pass interval.
    pub repeat: Duration,
    /// Fast execute repetition interval.
    pub fast: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        SchedulerConfig::default().timing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing() {
        let timing = SchedulerConfig::default().timing();
        assert_eq!(timing.cycle, Duration::from_millis(100));
        assert_eq!(timing.repeat, Duration::from_millis(1));
        assert_eq!(timing.fast, Duration::from_millis(1));
    }

    #[test]
    fn test_zero_durations_are_clamped() {
        let cfg = SchedulerConfig {
            cycle_time: Duration::ZERO,
            repeat_cycle_time: Duration::ZERO,
            fast_cycle_time: Duration::ZERO,
            bus_capacity: 0,
        };
        let timing = cfg.timing();
        assert_eq!(timing.cycle, MIN_DELAY);
        assert_eq!(timing.repeat, MIN_DELAY);
        assert_eq!(timing.fast, MIN_DELAY);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
