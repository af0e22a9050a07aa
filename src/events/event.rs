//! # Scheduler events emitted by the machine and its triggers.
//!
//! The [`EventKind`] enum classifies event types across four groups:
//! - **Machine events**: machine state transitions
//! - **Trigger events**: trigger lifecycle, steps, repeat-until and message handling
//! - **Execute events**: cross-sheet execute calls
//! - **Internal events**: deferred task and subscriber failures
//!
//! The [`Event`] struct carries additional metadata such as timestamps, sheet name,
//! reasons, counters and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use sheetcycle::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RepeatFinished)
//!     .with_sheet("S1")
//!     .with_count(3);
//!
//! assert_eq!(ev.kind, EventKind::RepeatFinished);
//! assert_eq!(ev.sheet.as_deref(), Some("S1"));
//! assert_eq!(ev.count, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::machine::MachineState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of scheduler events.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Machine events ===
    /// Machine changed state.
    ///
    /// Sets:
    /// - `state`: the new state
    MachineStateChanged,

    // === Trigger events ===
    /// Trigger started with its machine.
    ///
    /// Sets:
    /// - `sheet`: sheet name
    /// - `reason`: trigger type
    TriggerStarted,

    /// Trigger stopped; its cycle chain was torn down.
    ///
    /// Sets:
    /// - `sheet`: sheet name
    TriggerStopped,

    /// A logical step completed (after post-processing).
    ///
    /// Sets:
    /// - `sheet`: sheet name
    /// - `count`: `stats.steps`
    StepCompleted,

    /// A repeat-until loop observed `return()` and handed control back.
    ///
    /// Sets:
    /// - `sheet`: sheet name
    /// - `count`: `stats.repeatsteps` at the moment of return
    RepeatFinished,

    /// A fully processed message was detached from the sheet.
    ///
    /// Sets:
    /// - `sheet`: sheet name
    /// - `count`: message id
    MessageDetached,

    /// Sheet blocked in the middle of a pass.
    ///
    /// Sets:
    /// - `sheet`: sheet name
    SheetPaused,

    /// Previously blocked sheet completed its pass.
    ///
    /// Sets:
    /// - `sheet`: sheet name
    SheetResumed,

    /// Sheet evaluation failed; the cycle continues.
    ///
    /// Sets:
    /// - `sheet`: sheet name
    /// - `reason`: evaluation error
    EvaluationFailed,

    /// A timer fired that no longer belongs to the active cycle.
    ///
    /// Sets:
    /// - `sheet`: sheet name
    StaleTimer,

    // === Execute events ===
    /// Execute trigger accepted a call.
    ///
    /// Sets:
    /// - `sheet`: target sheet name
    /// - `count`: requested repetitions
    /// - `delay_ms`: pace between repetitions
    ExecuteStarted,

    /// All repetitions of an execute call finished; the caller is resumed.
    ///
    /// Sets:
    /// - `sheet`: target sheet name
    /// - `count`: `stats.executesteps`
    ExecuteCompleted,

    /// Execute call refused.
    ///
    /// Sets:
    /// - `sheet`: calling sheet name
    /// - `reason`: refusal reason
    ExecuteRejected,

    /// Pending execute call dropped because the caller went away.
    ///
    /// Sets:
    /// - `sheet`: target sheet name
    ExecuteCancelled,

    // === Internal events ===
    /// A deferred task panicked; the queue kept draining.
    ///
    /// Sets:
    /// - `reason`: panic message
    TaskPanicked,

    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `sheet`: subscriber name
    /// - `reason`: panic info
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `sheet`: subscriber name
    /// - `reason`: reason string (e.g. "full", "closed")
    SubscriberOverflow,
}

/// Scheduler event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the sheet (or subscriber), if applicable.
    pub sheet: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Counter relevant to the event (steps, repeat steps, repetitions, message id).
    pub count: Option<u64>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Machine state for state-change events.
    pub state: Option<MachineState>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            sheet: None,
            reason: None,
            count: None,
            delay_ms: None,
            state: None,
        }
    }

    /// Attaches a sheet name.
    #[inline]
    pub fn with_sheet(mut self, sheet: impl Into<Arc<str>>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a counter.
    #[inline]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a machine state.
    #[inline]
    pub fn with_state(mut self, state: MachineState) -> Self {
        self.state = Some(state);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_sheet(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_sheet(subscriber)
            .with_reason(info)
    }

    /// True for events produced by the subscriber machinery itself.
    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_increases() {
        let a = Event::new(EventKind::StepCompleted);
        let b = Event::new(EventKind::StepCompleted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_delay_saturates() {
        let ev = Event::new(EventKind::ExecuteStarted).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn test_subscriber_helpers() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert!(ev.is_internal());
        assert_eq!(ev.sheet.as_deref(), Some("audit"));
        assert_eq!(ev.reason.as_deref(), Some("full"));
        assert!(!Event::new(EventKind::TriggerStarted).is_internal());
    }
}
