//! Interval policies for timer triggers.
//!
//! ## Contents
//! - [`IntervalPolicy`] delay between two firings of a `time`/`random` trigger
//! - [`JitterPolicy`] randomisation strategy applied to that delay
//!
//! ```text
//! TriggerConfig { type: "time",   interval } ─► IntervalPolicy::fixed(interval)
//! TriggerConfig { type: "random", interval } ─► IntervalPolicy::random(interval)
//!      └─► Trigger::settle() arms the interval cycle with policy.next()
//! ```

mod interval;
mod jitter;

pub use interval::IntervalPolicy;
pub use jitter::JitterPolicy;
