//! # What a trigger may touch while handling one call.
//!
//! [`TriggerCtx`] bundles the sheet, that sheet's timers, a read-only view of
//! the machine and the event bus. Anything that concerns *another* sheet is
//! not done directly: the trigger records an [`Effect`] and the machine routes
//! it through its task queue after the current call returns.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::Timing;
use crate::events::{Bus, Event, EventKind};
use crate::machine::MachineState;
use crate::sheet::{ExecuteRequest, SheetId, StreamSheet};
use crate::timers::Timers;

/// Read-only machine state seen by triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineView {
    /// Machine state at call time.
    pub state: MachineState,
    /// Wall-clock time on the machine's virtual clock.
    pub now: DateTime<Utc>,
    /// Cycle durations.
    pub timing: Timing,
}

impl MachineView {
    /// View of a machine in `state` at `now` with default timing.
    pub fn new(state: MachineState, now: DateTime<Utc>) -> Self {
        Self {
            state,
            now,
            timing: Timing::default(),
        }
    }
}

/// Cross-sheet work requested by a trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start an execute call on `request.target`.
    Execute {
        /// Calling sheet.
        caller: SheetId,
        /// The call.
        request: ExecuteRequest,
    },
    /// Resume a sheet blocked in an execute call.
    Resume {
        /// Blocked caller.
        caller: SheetId,
        /// Result of the call.
        value: Value,
    },
    /// Drop the execute call `caller` has pending on `target`.
    CancelExecute {
        /// Caller that went away.
        caller: SheetId,
        /// Target sheet name.
        target: String,
    },
    /// A machine-stop trigger finished its final step.
    StopReleased {
        /// Releasing sheet.
        sheet: SheetId,
    },
}

/// Per-call context handed to every [`Trigger`](super::Trigger) operation.
pub struct TriggerCtx<'a> {
    /// Id of the triggered sheet.
    pub sheet_id: SheetId,
    /// The triggered sheet.
    pub sheet: &'a mut dyn StreamSheet,
    /// Timers of the triggered sheet.
    pub timers: &'a mut dyn Timers,
    /// Machine view.
    pub machine: MachineView,
    bus: &'a Bus,
    effects: Vec<Effect>,
}

impl<'a> TriggerCtx<'a> {
    /// Builds a context.
    pub fn new(
        sheet_id: SheetId,
        sheet: &'a mut dyn StreamSheet,
        timers: &'a mut dyn Timers,
        machine: MachineView,
        bus: &'a Bus,
    ) -> Self {
        Self {
            sheet_id,
            sheet,
            timers,
            machine,
            bus,
            effects: Vec::new(),
        }
    }

    /// Records cross-sheet work for the machine.
    pub fn emit(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Effects recorded so far.
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Consumes the context, returning its effects.
    pub fn into_effects(self) -> Vec<Effect> {
        self.effects
    }

    /// Publishes an event tagged with this sheet's name.
    pub fn publish(&self, kind: EventKind) {
        self.bus.publish(self.event(kind));
    }

    /// Starts an event tagged with this sheet's name.
    pub fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_sheet(self.sheet.name())
    }

    /// Publishes a prepared event.
    pub fn publish_event(&self, event: Event) {
        self.bus.publish(event);
    }
}
