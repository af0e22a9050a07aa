//! # sheetcycle
//!
//! **Sheetcycle** schedules the stepping of stream sheets.
//!
//! A machine hosts named sheets. Each sheet carries a trigger that decides
//! when the sheet runs a calculation pass: every machine cycle, on a timer,
//! when messages arrive, when another sheet executes it, or once when the
//! machine starts or stops. The crate owns the timing only; cell evaluation
//! sits behind the [`StreamSheet`] trait.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ StreamSheet  │   │ StreamSheet  │   │ StreamSheet  │
//!     │ + Trigger    │   │ + Trigger    │   │ + Trigger    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Machine (synchronous engine)                                     │
//! │  - state: Stopped / Running / Paused / WillStop                   │
//! │  - TimerWheel (virtual clock, one live timer per sheet)           │
//! │  - TaskQueue (deferred cross-sheet work: execute, resume, stop)   │
//! │  - TriggerFactory (config ─► Trigger)                             │
//! └──────┬────────────────────────────────────────────────────┬───────┘
//!        │ Trigger ─► CycleChain                              │
//!        │   root: Continuous | Interval | Manual             │
//!        │   children: MessageLoop ─► RepeatUntil             │
//!        │             Execute     ─► RepeatUntil             │
//!        ▼                                                    ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │              (capacity: SchedulerConfig::bus_capacity)            │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       │  (in MachineHandle)    │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                        ┌─────────┼─────────┐
//!                        ▼         ▼         ▼
//!                     worker1   worker2   workerN
//! ```
//!
//! ### Actor
//! ```text
//! MachineHandle ── mpsc ──► actor task ── owns ──► Machine
//!
//! loop select! {
//!   ├─► token cancelled           ─► exit, hand the Machine back
//!   ├─► command                   ─► advance clock, run command, reply on oneshot
//!   └─► sleep until next deadline ─► advance clock (fires due timers in order)
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Sheets**        | What a trigger drives; a closure-based implementation.        | [`StreamSheet`], [`ScriptSheet`]            |
//! | **Triggers**      | Trigger kinds and their JSON configuration.                   | [`Trigger`], [`TriggerConfig`], [`TriggerType`] |
//! | **Cycles**        | Timing strategies stacked per trigger.                        | [`CycleKind`], [`CycleChain`]               |
//! | **Machine**       | Synchronous engine and its async actor handle.                | [`Machine`], [`MachineBuilder`], [`MachineHandle`] |
//! | **Subscriber API**| Hook into scheduling events (logging, metrics, custom).       | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed refusals for configuration, execute calls and the actor.| [`ConfigError`], [`ExecuteError`], [`MachineError`], [`RuntimeError`] |
//! | **Configuration** | Machine cycle, repeat and fast-execute timing.                | [`SchedulerConfig`]                         |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use sheetcycle::{MachineBuilder, SchedulerConfig, ScriptSheet, TriggerConfig};
//!
//! let counter = ScriptSheet::new("S1").on_step(|s| {
//!     let a1 = s.cell("A1");
//!     s.set_cell("A1", a1 + 1.0);
//!     Ok(())
//! });
//!
//! let mut machine = MachineBuilder::new(SchedulerConfig::default())
//!     .with_sheet(counter, TriggerConfig::continuous())
//!     .build()?;
//! let id = machine.sheet_id("S1").expect("registered");
//!
//! machine.start();                              // first step right away
//! machine.advance(Duration::from_millis(250));  // two more cycles
//! assert_eq!(machine.stats(id).map(|s| s.steps), Some(3));
//! # Ok::<(), sheetcycle::MachineError>(())
//! ```
mod config;
mod cycle;
mod error;
mod events;
mod machine;
mod policies;
mod sheet;
mod subscribers;
mod task_queue;
mod timers;
mod trigger;

// ---- Public re-exports ----

pub use config::{MIN_DELAY, SchedulerConfig, Timing};
pub use cycle::{Cycle, CycleChain, CycleKind};
pub use error::{ConfigError, EvalError, ExecuteError, MachineError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use machine::{
    Machine, MachineBuilder, MachineHandle, MachineSnapshot, MachineState, SheetSnapshot,
};
pub use policies::{IntervalPolicy, JitterPolicy};
pub use sheet::{
    ExecuteRequest, Message, ScriptSheet, SheetId, SheetRequest, SheetStats, StepScope,
    StreamSheet,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use task_queue::{QueueWatch, Task, TaskQueue};
pub use timers::{KeyedTimers, TimerId, TimerWheel, Timers};
pub use trigger::{
    Effect, ExecuteCall, IntervalUnit, MachineView, Pace, RawTriggerConfig, Repeat, Trigger,
    TriggerConfig, TriggerCtor, TriggerCtx, TriggerFactory, TriggerType,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
