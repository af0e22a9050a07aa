//! # Machine: owns the sheets, their triggers and the virtual clock.
//!
//! The [`Machine`] is the synchronous scheduling engine. It holds one slot per
//! sheet (the sheet plus its [`Trigger`]), a [`TimerWheel`] keyed by sheet and
//! a [`TaskQueue`] of deferred cross-sheet work.
//!
//! ```text
//!  start/stop/pause/resume/step ──► for each slot: trigger.<op>(ctx)
//!  advance_to(t) ──► wheel.pop_due(t) ──► trigger.on_timer(ctx, id)
//!                                              │
//!                                 ctx.effects ─┴─► TaskQueue ──► drain() ──► apply_effect
//!                                                                    (execute / resume /
//!                                                                     cancel / stop release)
//! ```
//!
//! ## State machine
//! ```text
//!           start              pause
//! Stopped ─────────► Running ────────► Paused
//!    ▲                 │   ▲  resume     │
//!    │                 │   └─────────────┘
//!    │   last release  ▼ stop            │ stop
//!    └──────────── WillStop ◄────────────┘
//!       (or second stop)
//! ```
//!
//! ## Rules
//! - Every operation drains the task queue before returning.
//! - A panicking deferred task is logged and published; the drain goes on.
//! - Virtual time only moves through [`Machine::advance`]/[`Machine::advance_to`];
//!   the actor in [`MachineHandle`] maps it onto tokio time.

mod builder;
mod runtime;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SchedulerConfig;
use crate::error::{ExecuteError, MachineError};
use crate::events::{Bus, Event, EventKind};
use crate::sheet::{Message, SheetId, SheetStats, StreamSheet};
use crate::subscribers::panic_message;
use crate::task_queue::{QueueWatch, TaskQueue};
use crate::timers::TimerWheel;
use crate::trigger::{
    Effect, ExecuteCall, MachineView, Trigger, TriggerConfig, TriggerCtx, TriggerFactory,
    TriggerType,
};

pub use builder::MachineBuilder;
pub use runtime::MachineHandle;

/// Lifecycle state of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MachineState {
    /// Not running; sheets only step manually.
    Stopped,
    /// Stopping; machine-stop sheets run their final steps.
    WillStop,
    /// Timers drive the sheets.
    Running,
    /// Timers suspended; sheets only step manually.
    Paused,
}

impl MachineState {
    /// True if cycles advance on timers in this state.
    pub fn drives_timers(&self) -> bool {
        matches!(self, MachineState::Running | MachineState::WillStop)
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineState::Stopped => "stopped",
            MachineState::WillStop => "will-stop",
            MachineState::Running => "running",
            MachineState::Paused => "paused",
        }
    }
}

/// Serializable view of one sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetSnapshot {
    pub id: SheetId,
    pub name: String,
    pub trigger: TriggerType,
    pub stats: SheetStats,
    pub paused: bool,
}

/// Serializable view of the whole machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub state: MachineState,
    pub now: DateTime<Utc>,
    pub sheets: Vec<SheetSnapshot>,
}

struct SheetSlot {
    id: SheetId,
    sheet: Box<dyn StreamSheet>,
    trigger: Trigger,
}

/// Synchronous scheduling engine over a set of sheets.
pub struct Machine {
    config: SchedulerConfig,
    state: MachineState,
    slots: Vec<SheetSlot>,
    timers: TimerWheel<SheetId>,
    tasks: TaskQueue<Machine>,
    bus: Bus,
    origin: DateTime<Utc>,
    next_id: u64,
    factory: TriggerFactory,
}

impl Machine {
    /// Empty, stopped machine whose virtual clock starts at `origin`.
    pub fn new(config: SchedulerConfig, bus: Bus, origin: DateTime<Utc>) -> Self {
        Self {
            config,
            state: MachineState::Stopped,
            slots: Vec::new(),
            timers: TimerWheel::new(),
            tasks: TaskQueue::new(),
            bus,
            origin,
            next_id: 0,
            factory: TriggerFactory::new(),
        }
    }

    // ---- lifecycle ----

    /// Starts (or resumes) the machine.
    pub fn start(&mut self) -> MachineState {
        match self.state {
            MachineState::Running | MachineState::WillStop => {}
            MachineState::Paused => {
                self.resume();
            }
            MachineState::Stopped => {
                self.set_state(MachineState::Running);
                for id in self.ids() {
                    self.with_trigger(id, |trigger, ctx| trigger.start(ctx));
                }
                self.drain();
            }
        }
        self.state
    }

    /// Stops the machine.
    ///
    /// The first call stops every trigger except machine-stop triggers, which
    /// get their final step; the machine stays in will-stop until they all
    /// released it. A call while in will-stop forces them down.
    pub fn stop(&mut self) -> MachineState {
        match self.state {
            MachineState::Stopped => {}
            MachineState::WillStop => {
                for id in self.ids() {
                    self.with_trigger(id, |trigger, ctx| {
                        trigger.stop(ctx);
                    });
                }
                let dropped = self.tasks.reset();
                if dropped > 0 {
                    tracing::debug!(dropped, "forced stop dropped deferred tasks");
                }
                self.set_state(MachineState::Stopped);
            }
            MachineState::Running | MachineState::Paused => {
                self.set_state(MachineState::WillStop);
                for id in self.ids() {
                    if self.trigger_type(id) == Some(TriggerType::MachineStop) {
                        self.tasks.schedule(move |machine: &mut Machine| {
                            machine.with_trigger(id, |trigger, ctx| {
                                trigger.stop(ctx);
                            });
                        });
                    } else {
                        self.with_trigger(id, |trigger, ctx| {
                            trigger.stop(ctx);
                        });
                    }
                }
                self.drain();
                self.try_finish_stop();
            }
        }
        self.state
    }

    /// Suspends every timer.
    pub fn pause(&mut self) -> MachineState {
        if self.state == MachineState::Running {
            self.set_state(MachineState::Paused);
            for id in self.ids() {
                self.with_trigger(id, |trigger, ctx| trigger.pause(ctx));
            }
            self.drain();
        }
        self.state
    }

    /// Re-arms the timers suspended by [`Machine::pause`].
    pub fn resume(&mut self) -> MachineState {
        if self.state == MachineState::Paused {
            self.set_state(MachineState::Running);
            for id in self.ids() {
                self.with_trigger(id, |trigger, ctx| trigger.resume(ctx));
            }
            self.drain();
        }
        self.state
    }

    /// One manual step of every sheet. Ignored unless stopped or paused.
    pub fn step(&mut self) -> MachineState {
        if matches!(self.state, MachineState::Stopped | MachineState::Paused) {
            for id in self.ids() {
                self.with_trigger(id, |trigger, ctx| trigger.step(ctx, true));
            }
            self.drain();
        }
        self.state
    }

    /// Posts a message into a sheet's inbox.
    pub fn post_message(&mut self, id: SheetId, message: Message) -> Result<(), MachineError> {
        let slot = self
            .slot_mut(id)
            .ok_or_else(|| MachineError::UnknownSheet(id.to_string()))?;
        slot.sheet.post_message(message);
        self.with_trigger(id, |trigger, ctx| trigger.on_message(ctx));
        self.drain();
        Ok(())
    }

    // ---- virtual time ----

    /// Advances the clock by `by`, firing due timers in order.
    pub fn advance(&mut self, by: Duration) {
        let until = self.timers.now() + by;
        self.advance_to(until);
    }

    /// Advances the clock to `until` (time since origin), firing due timers in order.
    pub fn advance_to(&mut self, until: Duration) {
        while let Some((timer, id)) = self.timers.pop_due(until) {
            self.isolate("timer", |machine| {
                machine.with_trigger(id, |trigger, ctx| trigger.on_timer(ctx, timer));
            });
            self.drain();
        }
        self.timers.set_now(until);
    }

    /// Time since origin of the earliest armed timer.
    pub fn next_deadline(&mut self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Time elapsed on the virtual clock.
    pub fn elapsed(&self) -> Duration {
        self.timers.now()
    }

    /// Wall-clock time on the virtual clock.
    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.timers.now()).unwrap_or_else(|_| TimeDelta::zero());
        self.origin + elapsed
    }

    // ---- sheets ----

    /// Adds a sheet with its trigger. Running machines start immediate triggers at once.
    pub fn add_sheet(
        &mut self,
        sheet: Box<dyn StreamSheet>,
        config: TriggerConfig,
    ) -> Result<SheetId, MachineError> {
        if self.sheet_id(sheet.name()).is_some() {
            return Err(MachineError::DuplicateSheet(sheet.name().to_string()));
        }
        self.next_id += 1;
        let id = SheetId(self.next_id);
        let trigger = self.factory.create(config);
        let activate = self.state == MachineState::Running && trigger.implies_immediate_activation();
        tracing::debug!(sheet = sheet.name(), %id, trigger = %trigger.kind(), "sheet added");
        self.slots.push(SheetSlot { id, sheet, trigger });
        if activate {
            self.with_trigger(id, |trigger, ctx| trigger.start(ctx));
            self.drain();
        }
        Ok(id)
    }

    /// Replaces a sheet's trigger configuration.
    ///
    /// Same kind: the trigger is updated in place. Different kind: the old
    /// trigger is disposed and a new one installed (and started on a running
    /// machine when its kind activates immediately).
    pub fn set_trigger(&mut self, id: SheetId, config: TriggerConfig) -> Result<(), MachineError> {
        let current = self
            .trigger_type(id)
            .ok_or_else(|| MachineError::UnknownSheet(id.to_string()))?;

        if current == config.kind() {
            let result = self.with_trigger(id, |trigger, ctx| trigger.update(ctx, config));
            self.drain();
            return match result {
                Some(result) => result.map_err(MachineError::from),
                None => Err(MachineError::UnknownSheet(id.to_string())),
            };
        }

        self.with_trigger(id, |trigger, ctx| trigger.dispose(ctx));
        let replacement = self.factory.create(config);
        let activate =
            self.state == MachineState::Running && replacement.implies_immediate_activation();
        if let Some(slot) = self.slot_mut(id) {
            slot.trigger = replacement;
        }
        if activate {
            self.with_trigger(id, |trigger, ctx| trigger.start(ctx));
        }
        self.drain();
        Ok(())
    }

    /// Removes a sheet; its trigger is disposed and its timers cancelled.
    pub fn remove_sheet(&mut self, id: SheetId) -> Result<Box<dyn StreamSheet>, MachineError> {
        self.with_trigger(id, |trigger, ctx| trigger.dispose(ctx))
            .ok_or_else(|| MachineError::UnknownSheet(id.to_string()))?;
        self.timers.cancel_all(id);
        let index = self
            .slots
            .iter()
            .position(|slot| slot.id == id)
            .ok_or_else(|| MachineError::UnknownSheet(id.to_string()))?;
        let slot = self.slots.remove(index);
        self.drain();
        Ok(slot.sheet)
    }

    // ---- queries ----

    /// Current state.
    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Machine configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Id of the sheet named `name`.
    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.slots
            .iter()
            .find(|slot| slot.sheet.name() == name)
            .map(|slot| slot.id)
    }

    /// Sheet by id.
    pub fn sheet(&self, id: SheetId) -> Option<&dyn StreamSheet> {
        self.slot(id).map(|slot| slot.sheet.as_ref())
    }

    /// Trigger by id.
    pub fn trigger(&self, id: SheetId) -> Option<&Trigger> {
        self.slot(id).map(|slot| &slot.trigger)
    }

    /// Counters of a sheet.
    pub fn stats(&self, id: SheetId) -> Option<SheetStats> {
        self.sheet(id).map(|sheet| *sheet.stats())
    }

    /// Trigger kind of a sheet.
    pub fn trigger_type(&self, id: SheetId) -> Option<TriggerType> {
        self.slot(id).map(|slot| slot.trigger.kind())
    }

    /// Armed timers of a sheet.
    pub fn pending_timers(&self, id: SheetId) -> usize {
        self.timers.pending(id)
    }

    /// Observer of the deferred task queue.
    pub fn tasks_done(&self) -> QueueWatch {
        self.tasks.watch()
    }

    /// Serializable view of the machine.
    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            state: self.state,
            now: self.now(),
            sheets: self
                .slots
                .iter()
                .map(|slot| SheetSnapshot {
                    id: slot.id,
                    name: slot.sheet.name().to_string(),
                    trigger: slot.trigger.kind(),
                    stats: *slot.sheet.stats(),
                    paused: slot.sheet.is_paused(),
                })
                .collect(),
        }
    }

    // ---- internals ----

    fn ids(&self) -> Vec<SheetId> {
        self.slots.iter().map(|slot| slot.id).collect()
    }

    fn slot(&self, id: SheetId) -> Option<&SheetSlot> {
        self.slots.iter().find(|slot| slot.id == id)
    }

    fn slot_mut(&mut self, id: SheetId) -> Option<&mut SheetSlot> {
        self.slots.iter_mut().find(|slot| slot.id == id)
    }

    fn view(&self) -> MachineView {
        MachineView {
            state: self.state,
            now: self.now(),
            timing: self.config.timing(),
        }
    }

    fn set_state(&mut self, state: MachineState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = self.state.as_str(), to = state.as_str(), "machine state changed");
        self.state = state;
        self.bus
            .publish(Event::new(EventKind::MachineStateChanged).with_state(state));
    }

    /// Runs `f` against one trigger and queues the effects it recorded.
    fn with_trigger<R>(
        &mut self,
        id: SheetId,
        f: impl FnOnce(&mut Trigger, &mut TriggerCtx<'_>) -> R,
    ) -> Option<R> {
        let view = self.view();
        let Self {
            slots,
            timers,
            tasks,
            bus,
            ..
        } = self;
        let slot = slots.iter_mut().find(|slot| slot.id == id)?;
        let mut keyed = timers.keyed(id);
        let mut ctx = TriggerCtx::new(id, slot.sheet.as_mut(), &mut keyed, view, bus);
        let out = f(&mut slot.trigger, &mut ctx);
        for effect in ctx.into_effects() {
            tasks.schedule(move |machine: &mut Machine| machine.apply_effect(effect));
        }
        Some(out)
    }

    fn drain(&mut self) {
        while let Some(task) = self.tasks.pop() {
            self.isolate("deferred task", task);
            self.tasks.settle();
        }
    }

    /// Runs `f`; a panic is logged and published as [`EventKind::TaskPanicked`].
    fn isolate(&mut self, source: &'static str, f: impl FnOnce(&mut Machine)) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| f(self))) {
            let info = panic_message(panic.as_ref());
            tracing::error!(source, error = %info, "machine task panicked");
            self.bus
                .publish(Event::new(EventKind::TaskPanicked).with_reason(info));
        }
    }

    fn apply_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Execute { caller, request } => {
                let target = request.target.clone();
                let call = ExecuteCall::from_request(caller, request);
                let result = match self.sheet_id(&target) {
                    Some(id) => self
                        .with_trigger(id, |trigger, ctx| trigger.execute(ctx, call))
                        .unwrap_or_else(|| Err(ExecuteError::UnknownTarget(target.clone()))),
                    None => Err(ExecuteError::UnknownTarget(target.clone())),
                };
                if let Err(err) = result {
                    self.reject_execute(caller, &target, &err);
                }
            }
            Effect::Resume { caller, value } => {
                self.with_trigger(caller, |trigger, ctx| trigger.resume_processing(ctx, value));
            }
            Effect::CancelExecute { caller, target } => {
                if let Some(id) = self.sheet_id(&target) {
                    self.with_trigger(id, |trigger, ctx| trigger.cancel_execute(ctx, caller));
                }
            }
            Effect::StopReleased { sheet } => {
                tracing::debug!(%sheet, "machine-stop step finished");
                self.try_finish_stop();
            }
        }
    }

    fn reject_execute(&mut self, caller: SheetId, target: &str, err: &ExecuteError) {
        let caller_name = self
            .sheet(caller)
            .map(|sheet| sheet.name().to_string())
            .unwrap_or_else(|| caller.to_string());
        tracing::warn!(
            caller = %caller_name,
            callee = target,
            error = %err,
            label = err.as_label(),
            "execute rejected"
        );
        self.bus.publish(
            Event::new(EventKind::ExecuteRejected)
                .with_sheet(caller_name)
                .with_reason(err.to_string()),
        );
        self.with_trigger(caller, |trigger, ctx| {
            trigger.resume_processing(ctx, Value::Bool(false))
        });
    }

    fn try_finish_stop(&mut self) {
        if self.state != MachineState::WillStop {
            return;
        }
        if self.slots.iter().any(|slot| slot.trigger.blocks_stop()) {
            return;
        }
        self.set_state(MachineState::Stopped);
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("state", &self.state)
            .field("sheets", &self.slots.len())
            .field("elapsed", &self.timers.now())
            .field("queued", &self.tasks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::ScriptSheet;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn machine() -> Machine {
        Machine::new(SchedulerConfig::default(), Bus::new(64), Utc::now())
    }

    fn counter(name: &str) -> Box<dyn StreamSheet> {
        Box::new(ScriptSheet::new(name).on_step(|s| {
            let v = s.cell("A1");
            s.set_cell("A1", v + 1.0);
            Ok(())
        }))
    }

    #[test]
    fn test_state_transitions() {
        let mut m = machine();
        assert_eq!(m.pause(), MachineState::Stopped);
        assert_eq!(m.start(), MachineState::Running);
        assert_eq!(m.pause(), MachineState::Paused);
        assert_eq!(m.start(), MachineState::Running);
        assert_eq!(m.stop(), MachineState::Stopped);
        assert_eq!(m.resume(), MachineState::Stopped);
    }

    #[test]
    fn test_duplicate_sheet_rejected() {
        let mut m = machine();
        m.add_sheet(counter("S1"), TriggerConfig::continuous())
            .expect("first");
        let err = m
            .add_sheet(counter("S1"), TriggerConfig::continuous())
            .expect_err("duplicate");
        assert_eq!(err.as_label(), "machine_duplicate_sheet");
    }

    #[test]
    fn test_step_ignored_while_running() {
        let mut m = machine();
        let id = m
            .add_sheet(counter("S1"), TriggerConfig::continuous())
            .expect("add");
        m.start();
        assert_eq!(m.stats(id).map(|s| s.steps), Some(1));
        m.step();
        assert_eq!(m.stats(id).map(|s| s.steps), Some(1));
    }

    #[test]
    fn test_added_sheet_starts_on_running_machine() {
        let mut m = machine();
        m.start();
        let id = m
            .add_sheet(counter("S1"), TriggerConfig::continuous())
            .expect("add");
        assert_eq!(m.stats(id).map(|s| s.steps), Some(1));
        assert_eq!(m.pending_timers(id), 1);
    }

    #[test]
    fn test_set_trigger_replaces_kind() {
        let mut m = machine();
        let id = m
            .add_sheet(counter("S1"), TriggerConfig::continuous())
            .expect("add");
        m.start();
        m.set_trigger(id, TriggerConfig::arrival()).expect("swap");
        assert_eq!(m.trigger_type(id), Some(TriggerType::Arrival));
        assert_eq!(m.pending_timers(id), 0);

        m.post_message(id, Message::new(json!(1))).expect("post");
        assert_eq!(m.stats(id).map(|s| s.steps), Some(2));
    }

    #[test]
    fn test_remove_sheet_cancels_timers() {
        let mut m = machine();
        let id = m
            .add_sheet(counter("S1"), TriggerConfig::continuous())
            .expect("add");
        m.start();
        let sheet = m.remove_sheet(id).expect("remove");
        assert_eq!(sheet.name(), "S1");
        assert_eq!(m.pending_timers(id), 0);
        assert!(m.next_deadline().is_none());
        assert!(m.remove_sheet(id).is_err());
    }

    #[test]
    fn test_unknown_execute_target_resumes_caller_with_false() {
        let mut m = machine();
        let id = m
            .add_sheet(
                Box::new(ScriptSheet::new("S1").on_step(|s| {
                    if s.resumed_with().is_none() {
                        s.execute(crate::sheet::ExecuteRequest::new("nowhere", 1));
                    }
                    Ok(())
                })),
                TriggerConfig::continuous(),
            )
            .expect("add");
        m.start();
        let sheet = m.sheet(id).expect("sheet");
        assert!(!sheet.is_paused());
        assert_eq!(m.stats(id).map(|s| s.steps), Some(1));
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut m = machine();
        m.add_sheet(counter("S1"), TriggerConfig::continuous())
            .expect("add");
        let snap = serde_json::to_value(m.snapshot()).expect("serialize");
        assert_eq!(snap["state"], json!("stopped"));
        assert_eq!(snap["sheets"][0]["name"], json!("S1"));
        assert_eq!(snap["sheets"][0]["trigger"], json!("continuous"));
    }

    #[test]
    fn test_drain_survives_panicking_task() {
        let mut m = machine();
        let mut rx = m.bus().subscribe();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        m.tasks.schedule(|_| panic!("task exploded"));
        m.tasks.schedule(move |_| flag.store(true, Ordering::SeqCst));
        m.drain();

        assert!(ran.load(Ordering::SeqCst));
        assert!(m.tasks.is_empty());
        let panicked: Vec<Event> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| e.kind == EventKind::TaskPanicked)
            .collect();
        assert_eq!(panicked.len(), 1);
        assert_eq!(panicked[0].reason.as_deref(), Some("task exploded"));
    }

    #[test]
    fn test_panicking_sheet_on_timer_does_not_stop_others() {
        let mut m = machine();
        let boom = m
            .add_sheet(
                Box::new(ScriptSheet::new("BOOM").on_step(|s| {
                    let v = s.cell("A1");
                    if v >= 1.0 {
                        panic!("sheet exploded");
                    }
                    s.set_cell("A1", v + 1.0);
                    Ok(())
                })),
                TriggerConfig::continuous(),
            )
            .expect("add");
        let s2 = m
            .add_sheet(counter("S2"), TriggerConfig::continuous())
            .expect("add");
        let mut rx = m.bus().subscribe();

        m.start();
        m.advance(Duration::from_millis(350));

        assert_eq!(m.stats(s2).map(|s| s.steps), Some(4));
        assert_eq!(m.pending_timers(boom), 0);
        let panicked = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| e.kind == EventKind::TaskPanicked)
            .count();
        assert_eq!(panicked, 1);
    }

    #[test]
    fn test_forced_stop_drops_deferred_tasks() {
        let mut m = machine();
        m.add_sheet(counter("S9"), TriggerConfig::machine_stop().endless())
            .expect("add");
        m.start();
        assert_eq!(m.stop(), MachineState::WillStop);

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        m.tasks.schedule(move |_| flag.store(true, Ordering::SeqCst));
        assert_eq!(m.stop(), MachineState::Stopped);

        assert!(!ran.load(Ordering::SeqCst));
        assert!(m.tasks.is_empty());
        assert_eq!(m.tasks_done().pending(), 0);
        assert!(m.next_deadline().is_none());
    }
}
