//! # Cycles: the timing strategies of a trigger.
//!
//! A [`Cycle`] is a tagged timing state: *what* drives the next firing
//! ([`CycleKind`]), the one timer it may hold, and whether the machine paused it.
//! A trigger stacks cycles in a [`CycleChain`]; the top of the chain is the
//! active cycle.
//!
//! ```text
//!  root ─────────────── child ────────────── child (active)
//!  Continuous           MessageLoop          RepeatUntil
//!  (no timer)           (no timer)           timer: Some(id)
//! ```
//!
//! ## Rules
//! - Only the active cycle may hold a timer.
//! - Manual kinds never arm a timer.
//! - Scheduling always cancels the previous timer first.

mod chain;

use std::time::Duration;

use crate::timers::{TimerId, Timers};
use crate::trigger::Pace;

pub use chain::CycleChain;

/// What drives a cycle's firings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// Only explicit manual steps.
    Manual,
    /// Machine-cycle paced stepping of a continuous trigger.
    Continuous,
    /// Interval of a `time`/`random` trigger.
    Interval,
    /// Drains the inbox, one (message, loop element) per firing.
    MessageLoop {
        /// Advanced by manual steps only.
        manual: bool,
    },
    /// Re-runs the current logical step until `return()`.
    RepeatUntil {
        /// Advanced by manual steps only.
        manual: bool,
        /// Next pass is the first one and must not reuse the attached message.
        fresh: bool,
    },
    /// Repetitions of an execute call.
    Execute {
        /// Advanced by manual steps only.
        manual: bool,
        /// Delay between repetitions.
        pace: Pace,
    },
}

impl CycleKind {
    /// True if this kind never arms a timer.
    pub fn is_manual(&self) -> bool {
        match self {
            CycleKind::Manual => true,
            CycleKind::Continuous | CycleKind::Interval => false,
            CycleKind::MessageLoop { manual }
            | CycleKind::RepeatUntil { manual, .. }
            | CycleKind::Execute { manual, .. } => *manual,
        }
    }

    /// Timer-driven variant of a manual child kind (roots are unchanged).
    pub fn promoted(self) -> Self {
        match self {
            CycleKind::MessageLoop { .. } => CycleKind::MessageLoop { manual: false },
            CycleKind::RepeatUntil { fresh, .. } => CycleKind::RepeatUntil {
                manual: false,
                fresh,
            },
            CycleKind::Execute { pace, .. } => CycleKind::Execute {
                manual: false,
                pace,
            },
            other => other,
        }
    }

    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            CycleKind::Manual => "manual",
            CycleKind::Continuous => "continuous",
            CycleKind::Interval => "interval",
            CycleKind::MessageLoop { .. } => "message_loop",
            CycleKind::RepeatUntil { .. } => "repeat_until",
            CycleKind::Execute { .. } => "execute",
        }
    }
}

/// One timing strategy with its timer and pause flag.
#[derive(Debug)]
pub struct Cycle {
    kind: CycleKind,
    timer: Option<TimerId>,
    paused: bool,
}

impl Cycle {
    /// Unarmed, unpaused cycle.
    pub fn new(kind: CycleKind) -> Self {
        Self {
            kind,
            timer: None,
            paused: false,
        }
    }

    /// Cycle kind.
    pub fn kind(&self) -> CycleKind {
        self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut CycleKind {
        &mut self.kind
    }

    /// True if this cycle never arms a timer.
    pub fn is_manual(&self) -> bool {
        self.kind.is_manual()
    }

    /// True while a timer is armed.
    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// True while the machine holds this cycle paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Re-arms the timer; manual cycles only clear.
    pub fn schedule(&mut self, timers: &mut dyn Timers, delay: Duration) -> bool {
        self.clear(timers);
        if self.is_manual() {
            return false;
        }
        self.timer = Some(timers.arm(delay));
        true
    }

    /// Cancels the timer, if any.
    pub fn clear(&mut self, timers: &mut dyn Timers) -> bool {
        match self.timer.take() {
            Some(id) => timers.cancel(id),
            None => false,
        }
    }

    /// Cancels the timer and marks the cycle paused.
    pub fn pause(&mut self, timers: &mut dyn Timers) {
        self.clear(timers);
        self.paused = true;
    }

    /// Clears the pause flag; returns whether it was set.
    pub fn resume(&mut self) -> bool {
        std::mem::replace(&mut self.paused, false)
    }

    /// Consumes the timer if `id` is the one this cycle armed.
    pub(crate) fn fired(&mut self, id: TimerId) -> bool {
        if self.timer == Some(id) {
            self.timer = None;
            true
        } else {
            false
        }
    }
}
