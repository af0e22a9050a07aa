//! # Triggers: when a sheet steps.
//!
//! A [`Trigger`] owns the [`CycleChain`] of one sheet and turns machine
//! commands (start/stop/pause/resume/step), timer firings, message arrivals
//! and execute calls into sheet passes.
//!
//! ## Kinds
//! | type            | root cycle   | activation                                        |
//! |-----------------|--------------|---------------------------------------------------|
//! | `continuous`    | `Continuous` | steps on start, then every machine cycle          |
//! | `time`/`random` | `Interval`   | at `start` (or immediately for `time`), then per interval |
//! | `arrival`       | `Manual`     | message loop while the inbox has messages         |
//! | `execute`       | `Manual`     | `Execute` cycle per accepted call                 |
//! | `machine-start` | `Manual`     | one step when the machine starts                  |
//! | `machine-stop`  | `Manual`     | one step when the machine stops                   |
//!
//! ## Logical step
//! ```text
//! step ─► paused? ──yes──► nothing
//!          │no
//!          ├─► steps += 1, repeatsteps = 0
//!          ├─► once:    pass(reuse=false) ─► complete
//!          └─► endless: push RepeatUntil ─► pass, pass(reuse), ... until return() ─► pop ─► complete
//!
//! complete ─► next loop element ─► detach message when exhausted
//!           ├─► MessageLoop: pop when nothing is left
//!           ├─► Execute: count repetition; resume caller after the last one
//!           └─► machine-stop: release the stopping machine
//! ```
//!
//! ## Rules
//! - Every public operation is total: failures are logged and published, never returned
//!   (only [`Trigger::execute`] and [`Trigger::update`] report refusals).
//! - `settle()` is the only place that arms a timer, and it only arms the active cycle.
//! - Cross-sheet work is recorded as [`Effect`]s on the [`TriggerCtx`].

mod config;
mod context;
mod execute;
mod factory;


use std::time::Duration;

use serde_json::Value;

use crate::cycle::{Cycle, CycleChain, CycleKind};
use crate::error::{ConfigError, ExecuteError};
use crate::events::EventKind;
use crate::policies::IntervalPolicy;
use crate::sheet::{SheetId, SheetRequest};
use crate::timers::TimerId;

pub use config::{IntervalUnit, RawTriggerConfig, Repeat, TriggerConfig, TriggerType};
pub use context::{Effect, MachineView, TriggerCtx};
pub use execute::{ExecuteCall, Pace};
pub use factory::{TriggerCtor, TriggerFactory};

use execute::PendingCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopPhase {
    Idle,
    Stopping,
    Released,
}

/// Scheduling state machine of one sheet.
#[derive(Debug)]
pub struct Trigger {
    config: TriggerConfig,
    chain: CycleChain,
    interval: Option<IntervalPolicy>,
    pending: Option<PendingCall>,
    awaiting: Option<String>,
    stop_phase: StopPhase,
    started: bool,
    held_return: bool,
    disposed: bool,
}

fn interval_policy(config: &TriggerConfig) -> Option<IntervalPolicy> {
    match config.kind() {
        TriggerType::Time => config.interval().map(IntervalPolicy::fixed),
        TriggerType::Random => config.interval().map(IntervalPolicy::random),
        _ => None,
    }
}

impl Trigger {
    /// Idle trigger with a manual root cycle.
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            interval: interval_policy(&config),
            config,
            chain: CycleChain::new(Cycle::new(CycleKind::Manual)),
            pending: None,
            awaiting: None,
            stop_phase: StopPhase::Idle,
            started: false,
            held_return: false,
            disposed: false,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Trigger kind.
    pub fn kind(&self) -> TriggerType {
        self.config.kind()
    }

    /// Cycle chain, root to active.
    pub fn chain(&self) -> &CycleChain {
        &self.chain
    }

    /// True once disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// True while an execute call is being served.
    pub fn is_executing(&self) -> bool {
        self.pending.is_some()
    }

    /// True while this sheet waits for another sheet's execute.
    pub fn is_awaiting(&self) -> bool {
        self.awaiting.is_some()
    }

    /// True while a machine-stop trigger keeps the machine in will-stop.
    pub fn blocks_stop(&self) -> bool {
        self.stop_phase == StopPhase::Stopping
    }

    /// True if installing this trigger on a running machine must start it at once.
    pub fn implies_immediate_activation(&self) -> bool {
        matches!(
            self.config.kind(),
            TriggerType::Continuous | TriggerType::Time | TriggerType::Random | TriggerType::Arrival
        )
    }

    fn root_kind(&self) -> CycleKind {
        match self.config.kind() {
            TriggerType::Continuous => CycleKind::Continuous,
            TriggerType::Time | TriggerType::Random => CycleKind::Interval,
            _ => CycleKind::Manual,
        }
    }

    // ---- machine commands ----

    /// Machine started: install the root cycle and activate it.
    pub fn start(&mut self, ctx: &mut TriggerCtx<'_>) {
        if self.disposed {
            return;
        }
        self.stop_phase = StopPhase::Idle;
        if self.pending.is_some() {
            // an execute call accepted while stopped continues under the timers
            self.chain.resume_all();
            self.chain.promote_children();
        } else {
            self.held_return = false;
            self.chain.replace(Cycle::new(self.root_kind()), ctx.timers);
        }
        ctx.publish_event(
            ctx.event(EventKind::TriggerStarted)
                .with_reason(self.config.kind().as_str()),
        );

        match self.config.kind() {
            TriggerType::Continuous => self.do_step(ctx, false),
            TriggerType::Time => match self.start_delay(ctx) {
                Some(delay) => {
                    self.chain.active_mut().schedule(ctx.timers, delay);
                }
                None => self.do_step(ctx, false),
            },
            TriggerType::Random => {
                if let Some(delay) = self.start_delay(ctx) {
                    self.chain.active_mut().schedule(ctx.timers, delay);
                }
            }
            TriggerType::Arrival => {
                if ctx.sheet.has_new_message() {
                    self.begin_message_loop(ctx);
                }
            }
            TriggerType::MachineStart => {
                self.started = true;
                self.do_step(ctx, false);
            }
            TriggerType::Execute | TriggerType::MachineStop => {}
        }
        self.settle(ctx);
    }

    /// Machine stopping. Returns whether this trigger lets the machine stop now.
    ///
    /// A machine-stop trigger runs its final step on the first call and keeps
    /// the machine in will-stop until that step (and its repeat-until) completes;
    /// a second call forces it down; later calls do nothing.
    pub fn stop(&mut self, ctx: &mut TriggerCtx<'_>) -> bool {
        if self.disposed {
            return true;
        }
        if self.config.kind() != TriggerType::MachineStop {
            self.halt(ctx);
            return true;
        }
        match self.stop_phase {
            StopPhase::Idle => {
                self.stop_phase = StopPhase::Stopping;
                self.do_step(ctx, false);
                self.settle(ctx);
                self.stop_phase != StopPhase::Stopping
            }
            StopPhase::Stopping => {
                self.halt(ctx);
                self.stop_phase = StopPhase::Released;
                true
            }
            StopPhase::Released => true,
        }
    }

    fn halt(&mut self, ctx: &mut TriggerCtx<'_>) {
        self.cancel_awaited(ctx);
        if self.pending.take().is_some() {
            ctx.publish(EventKind::ExecuteCancelled);
        }
        if ctx.sheet.is_paused() {
            ctx.sheet.stop_processing(None);
        }
        self.held_return = false;
        self.started = false;
        self.chain
            .replace(Cycle::new(CycleKind::Manual), ctx.timers);
        ctx.publish(EventKind::TriggerStopped);
    }

    /// Machine paused: every cycle drops its timer.
    pub fn pause(&mut self, ctx: &mut TriggerCtx<'_>) {
        if self.disposed {
            return;
        }
        self.chain.pause_all(ctx.timers);
    }

    /// Machine resumed: manual cycles become timer-driven and the active one re-arms,
    /// unless the sheet itself is blocked.
    pub fn resume(&mut self, ctx: &mut TriggerCtx<'_>) {
        if self.disposed {
            return;
        }
        self.chain.resume_all();
        let root = self.root_kind();
        if self.chain.root().is_manual() && root != CycleKind::Manual {
            self.chain.set_root_kind(root, ctx.timers);
        }
        self.chain.promote_children();
        if ctx.sheet.is_paused() {
            return;
        }
        self.on_message(ctx);
        self.settle(ctx);
    }

    /// Steps the sheet. `manual` steps come from the user while the machine is
    /// stopped or paused; automatic steps only wake arrival triggers.
    pub fn step(&mut self, ctx: &mut TriggerCtx<'_>, manual: bool) {
        if self.disposed {
            return;
        }
        if !manual {
            self.on_message(ctx);
            return;
        }
        let active = self.chain.active();
        if active.is_armed() && !active.is_paused() {
            return;
        }
        match self.config.kind() {
            TriggerType::MachineStop => return,
            TriggerType::Execute if self.pending.is_none() || self.chain.is_at_root() => return,
            TriggerType::MachineStart if self.chain.is_at_root() => {
                if self.started {
                    return;
                }
                self.started = true;
            }
            _ => {}
        }
        self.step_active(ctx, true);
        self.settle(ctx);
    }

    /// New message in the inbox.
    pub fn on_message(&mut self, ctx: &mut TriggerCtx<'_>) {
        if self.disposed || self.config.kind() != TriggerType::Arrival {
            return;
        }
        let idle = self.chain.is_at_root() && !self.chain.active().is_paused();
        if ctx.machine.state != crate::machine::MachineState::Running
            || !idle
            || ctx.sheet.is_paused()
            || !ctx.sheet.has_new_message()
        {
            return;
        }
        self.begin_message_loop(ctx);
        self.settle(ctx);
    }

    /// A timer armed through this trigger's context fired.
    pub fn on_timer(&mut self, ctx: &mut TriggerCtx<'_>, id: TimerId) {
        if self.disposed {
            return;
        }
        if !self.chain.active_mut().fired(id) {
            tracing::debug!(sheet = ctx.sheet.name(), timer = id.get(), "stale timer ignored");
            ctx.publish(EventKind::StaleTimer);
            return;
        }
        self.step_active(ctx, false);
        self.settle(ctx);
    }

    /// Applies a same-kind configuration change.
    ///
    /// Leaving endless mode finishes a running repeat-until synchronously; a new
    /// interval re-arms an interval cycle.
    pub fn update(
        &mut self,
        ctx: &mut TriggerCtx<'_>,
        config: TriggerConfig,
    ) -> Result<(), ConfigError> {
        if config.kind() != self.config.kind() {
            return Err(ConfigError::KindMismatch {
                expected: self.config.kind(),
                found: config.kind(),
            });
        }
        let repeat_changed = config.repeat() != self.config.repeat();
        let timing_changed =
            config.interval() != self.config.interval() || config.start() != self.config.start();
        self.interval = interval_policy(&config);
        self.config = config;
        if self.disposed {
            return Ok(());
        }

        if repeat_changed && !ctx.sheet.is_paused() {
            while matches!(self.chain.active().kind(), CycleKind::RepeatUntil { .. }) {
                self.finish_repeat(ctx);
            }
        }
        if timing_changed && self.chain.active().kind() == CycleKind::Interval {
            self.chain.active_mut().clear(ctx.timers);
        }
        self.settle(ctx);
        Ok(())
    }

    /// Tears the trigger down. Idempotent.
    pub fn dispose(&mut self, ctx: &mut TriggerCtx<'_>) {
        if self.disposed {
            return;
        }
        self.cancel_awaited(ctx);
        if let Some(call) = self.pending.take() {
            ctx.emit(Effect::Resume {
                caller: call.caller,
                value: Value::Bool(false),
            });
        }
        if ctx.sheet.is_paused() {
            ctx.sheet.stop_processing(None);
        }
        self.chain.dispose(ctx.timers);
        self.disposed = true;
    }

    // ---- execute ----

    /// Accepts an execute call and runs its first repetition immediately.
    pub fn execute(
        &mut self,
        ctx: &mut TriggerCtx<'_>,
        call: ExecuteCall,
    ) -> Result<(), ExecuteError> {
        if self.disposed || self.config.kind() != TriggerType::Execute {
            return Err(ExecuteError::NotExecutable {
                target: ctx.sheet.name().to_string(),
            });
        }
        if self.pending.is_some() {
            return Err(ExecuteError::Busy {
                target: ctx.sheet.name().to_string(),
            });
        }
        if call.repetitions == 0 {
            return Err(ExecuteError::NoRepetitions);
        }

        if !call.repeating {
            ctx.sheet.stats_mut().executesteps = 0;
        }
        if let Some(message) = call.message {
            ctx.sheet.attach_message(message);
        }
        self.pending = Some(PendingCall {
            caller: call.caller,
            remaining: call.repetitions,
        });
        let manual = !ctx.machine.state.drives_timers();
        self.chain.unwind(ctx.timers);
        self.chain.push(
            Cycle::new(CycleKind::Execute {
                manual,
                pace: call.pace,
            }),
            ctx.timers,
        );
        ctx.publish_event(
            ctx.event(EventKind::ExecuteStarted)
                .with_count(u64::from(call.repetitions))
                .with_delay(call.pace.delay(&ctx.machine.timing)),
        );

        self.step_active(ctx, manual);
        self.settle(ctx);
        Ok(())
    }

    /// Drops the call `caller` has pending here, without resuming the caller.
    pub fn cancel_execute(&mut self, ctx: &mut TriggerCtx<'_>, caller: SheetId) {
        if self.pending.is_none_or(|call| call.caller != caller) {
            return;
        }
        self.pending = None;
        self.cancel_awaited(ctx);
        if ctx.sheet.is_paused() {
            ctx.sheet.stop_processing(None);
        }
        self.held_return = false;
        self.chain.unwind(ctx.timers);
        ctx.publish(EventKind::ExecuteCancelled);
    }

    fn finish_repetition(&mut self, ctx: &mut TriggerCtx<'_>) {
        let Some(call) = self.pending.as_mut() else {
            return;
        };
        call.remaining = call.remaining.saturating_sub(1);
        if call.remaining > 0 {
            return;
        }
        let caller = call.caller;
        self.pending = None;
        self.chain.pop(ctx.timers);
        ctx.publish_event(
            ctx.event(EventKind::ExecuteCompleted)
                .with_count(ctx.sheet.stats().executesteps),
        );
        ctx.emit(Effect::Resume {
            caller,
            value: Value::Bool(true),
        });
    }

    fn cancel_awaited(&mut self, ctx: &mut TriggerCtx<'_>) {
        if let Some(target) = self.awaiting.take() {
            ctx.emit(Effect::CancelExecute {
                caller: ctx.sheet_id,
                target,
            });
        }
    }

    // ---- sheet-level processing ----

    /// Blocks the sheet's current pass; the active cycle stops firing.
    pub fn pause_processing(&mut self, ctx: &mut TriggerCtx<'_>) {
        if self.disposed {
            return;
        }
        ctx.sheet.pause_processing();
        self.chain.active_mut().clear(ctx.timers);
        ctx.publish(EventKind::SheetPaused);
    }

    /// Finishes a blocked pass with `value` and continues where it stopped.
    pub fn resume_processing(&mut self, ctx: &mut TriggerCtx<'_>, value: Value) {
        if self.disposed || !ctx.sheet.is_paused() {
            return;
        }
        self.awaiting = None;
        ctx.sheet.resume_processing(value);
        if ctx.sheet.is_paused() {
            return;
        }
        ctx.publish(EventKind::SheetResumed);
        let returned = std::mem::take(&mut self.held_return) | ctx.sheet.take_return_signal();
        self.after_pass(ctx, returned);
        self.settle(ctx);
    }

    /// Abandons the current pass and any repeat-until around it.
    pub fn stop_processing(&mut self, ctx: &mut TriggerCtx<'_>, value: Option<Value>) {
        if self.disposed {
            return;
        }
        let was_paused = ctx.sheet.is_paused();
        ctx.sheet.stop_processing(value);
        self.held_return = false;
        self.cancel_awaited(ctx);
        if matches!(self.chain.active().kind(), CycleKind::RepeatUntil { .. }) {
            self.finish_repeat(ctx);
        } else if was_paused {
            self.complete_step(ctx);
        }
        self.settle(ctx);
    }

    // ---- cycle transitions ----

    fn step_active(&mut self, ctx: &mut TriggerCtx<'_>, manual: bool) {
        match self.chain.active().kind() {
            CycleKind::RepeatUntil { .. } => self.repeat_pass(ctx),
            CycleKind::Execute { .. } => {
                if !ctx.sheet.is_paused() {
                    ctx.sheet.stats_mut().executesteps += 1;
                }
                self.do_step(ctx, manual);
            }
            _ => self.do_step(ctx, manual),
        }
    }

    fn do_step(&mut self, ctx: &mut TriggerCtx<'_>, manual: bool) {
        if ctx.sheet.is_paused() {
            return;
        }
        if ctx.sheet.is_processed() {
            let stats = ctx.sheet.stats_mut();
            stats.steps += 1;
            stats.repeatsteps = 0;
        }
        if self.config.is_endless() {
            let manual = manual || !ctx.machine.state.drives_timers();
            self.chain.push(
                Cycle::new(CycleKind::RepeatUntil {
                    manual,
                    fresh: true,
                }),
                ctx.timers,
            );
            self.repeat_pass(ctx);
        } else {
            self.process_sheet(ctx, false);
            if !ctx.sheet.is_paused() {
                self.complete_step(ctx);
            }
        }
    }

    fn repeat_pass(&mut self, ctx: &mut TriggerCtx<'_>) {
        if ctx.sheet.is_paused() {
            return;
        }
        let fresh = match self.chain.active_mut().kind_mut() {
            CycleKind::RepeatUntil { fresh, .. } => std::mem::replace(fresh, false),
            _ => false,
        };
        if ctx.sheet.is_processed() {
            ctx.sheet.stats_mut().repeatsteps += 1;
        }
        let returned = self.process_sheet(ctx, !fresh);
        if returned && !ctx.sheet.is_paused() {
            self.finish_repeat(ctx);
        }
    }

    fn finish_repeat(&mut self, ctx: &mut TriggerCtx<'_>) {
        if !matches!(self.chain.active().kind(), CycleKind::RepeatUntil { .. }) {
            return;
        }
        self.chain.pop(ctx.timers);
        ctx.publish_event(
            ctx.event(EventKind::RepeatFinished)
                .with_count(ctx.sheet.stats().repeatsteps),
        );
        self.complete_step(ctx);
    }

    fn after_pass(&mut self, ctx: &mut TriggerCtx<'_>, returned: bool) {
        match self.chain.active().kind() {
            CycleKind::RepeatUntil { .. } => {
                if returned {
                    self.finish_repeat(ctx);
                }
            }
            _ => self.complete_step(ctx),
        }
    }

    fn complete_step(&mut self, ctx: &mut TriggerCtx<'_>) {
        self.post_process(ctx);
        ctx.publish_event(
            ctx.event(EventKind::StepCompleted)
                .with_count(ctx.sheet.stats().steps),
        );
        match self.chain.active().kind() {
            CycleKind::MessageLoop { .. } => {
                if ctx.sheet.is_message_processed()
                    && !ctx.sheet.has_new_message()
                    && !ctx.sheet.is_paused()
                {
                    self.chain.pop(ctx.timers);
                }
            }
            CycleKind::Execute { .. } => self.finish_repetition(ctx),
            _ => {}
        }
        if self.stop_phase == StopPhase::Stopping && self.chain.is_at_root() {
            self.stop_phase = StopPhase::Released;
            ctx.emit(Effect::StopReleased {
                sheet: ctx.sheet_id,
            });
        }
    }

    fn post_process(&mut self, ctx: &mut TriggerCtx<'_>) {
        if !ctx.sheet.is_processed() {
            return;
        }
        ctx.sheet.next_loop_element();
        if ctx.sheet.is_message_processed() {
            if let Some(message) = ctx.sheet.detach_message() {
                ctx.publish_event(ctx.event(EventKind::MessageDetached).with_count(message.id));
            }
        }
    }

    /// Runs one pass and collects its side requests; returns the `return()` signal.
    fn process_sheet(&mut self, ctx: &mut TriggerCtx<'_>, reuse: bool) -> bool {
        if let Err(err) = ctx.sheet.trigger_step(reuse) {
            tracing::warn!(
                sheet = ctx.sheet.name(),
                error = %err,
                label = err.as_label(),
                "sheet evaluation failed"
            );
            ctx.publish_event(ctx.event(EventKind::EvaluationFailed).with_reason(err.to_string()));
        }
        for request in ctx.sheet.take_requests() {
            match request {
                SheetRequest::Execute(request) => {
                    self.awaiting = Some(request.target.clone());
                    let caller = ctx.sheet_id;
                    ctx.emit(Effect::Execute { caller, request });
                }
            }
        }
        let returned = ctx.sheet.take_return_signal();
        if ctx.sheet.is_paused() {
            self.held_return = returned;
            self.chain.active_mut().clear(ctx.timers);
            ctx.publish(EventKind::SheetPaused);
        }
        returned
    }

    fn begin_message_loop(&mut self, ctx: &mut TriggerCtx<'_>) {
        let manual = !ctx.machine.state.drives_timers();
        self.chain.push(
            Cycle::new(CycleKind::MessageLoop { manual }),
            ctx.timers,
        );
        self.do_step(ctx, manual);
    }

    /// Arms the active cycle if it is timer-driven and idle.
    fn settle(&mut self, ctx: &mut TriggerCtx<'_>) {
        if self.disposed || ctx.sheet.is_paused() {
            return;
        }
        let cycle = self.chain.active();
        if cycle.is_manual() || cycle.is_paused() || cycle.is_armed() {
            return;
        }
        let delay = self.delay_for(cycle.kind(), &ctx.machine);
        self.chain.active_mut().schedule(ctx.timers, delay);
    }

    fn delay_for(&self, kind: CycleKind, machine: &MachineView) -> Duration {
        match kind {
            CycleKind::Manual | CycleKind::Continuous | CycleKind::MessageLoop { .. } => {
                machine.timing.cycle
            }
            CycleKind::Interval => self
                .interval
                .map_or(machine.timing.cycle, |policy| policy.next()),
            CycleKind::RepeatUntil { .. } => machine.timing.repeat,
            CycleKind::Execute { pace, .. } => pace.delay(&machine.timing),
        }
    }

    fn start_delay(&self, ctx: &TriggerCtx<'_>) -> Option<Duration> {
        let start = self.config.start()?;
        (start - ctx.machine.now)
            .to_std()
            .ok()
            .filter(|delay| !delay.is_zero())
    }
}
