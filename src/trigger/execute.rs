//! Execute-call bookkeeping.

use std::time::Duration;

use crate::config::Timing;
use crate::sheet::{ExecuteRequest, Message, SheetId};

/// Pacing of execute repetitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pace {
    /// One repetition per machine cycle.
    #[default]
    Cycle,
    /// Repetitions back to back at the fast cycle time.
    Fast,
}

impl Pace {
    /// `Some(true)` is fast; `Some(false)` and `None` follow the machine cycle.
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Pace::Fast,
            _ => Pace::Cycle,
        }
    }

    /// Delay between two repetitions.
    pub fn delay(&self, timing: &Timing) -> Duration {
        match self {
            Pace::Cycle => timing.cycle,
            Pace::Fast => timing.fast,
        }
    }
}

/// An execute call as received by the target trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteCall {
    /// Sheet waiting for completion.
    pub caller: SheetId,
    /// Requested repetitions.
    pub repetitions: u32,
    /// Repetition pacing.
    pub pace: Pace,
    /// Message consumed in preference to the inbox.
    pub message: Option<Message>,
    /// Continuation of a previous call.
    pub repeating: bool,
}

impl ExecuteCall {
    /// Call built from a sheet's request.
    pub fn from_request(caller: SheetId, request: ExecuteRequest) -> Self {
        Self {
            caller,
            repetitions: request.repetitions,
            pace: Pace::from_flag(request.pace),
            message: request.message,
            repeating: request.repeating,
        }
    }
}

/// Call currently served by an execute trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingCall {
    pub(crate) caller: SheetId,
    pub(crate) remaining: u32,
}
