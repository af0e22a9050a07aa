//! # Machine actor: one tokio task owns the [`Machine`].
//!
//! [`MachineHandle::spawn`] moves the machine into an actor task. The actor maps
//! the machine's virtual clock onto tokio time: it sleeps until the next armed
//! deadline, advances the machine to "now" before every command, and serves
//! commands from a bounded mpsc channel with oneshot replies.
//!
//! ```text
//!   MachineHandle ── Command ──► mpsc ──► actor loop ──► Machine
//!        ▲                                   │  select!
//!        └──────── oneshot reply ◄───────────┤   ├─ token.cancelled() → exit
//!                                            │   ├─ rx.recv()        → advance, handle
//!                                            │   └─ sleep_until(next deadline) → advance
//!
//!   Bus ──► listener ──► SubscriberSet (Lagged is logged and skipped)
//! ```
//!
//! With tokio's paused clock (`start_paused = true`) the whole runtime is
//! deterministic: auto-advance wakes the actor exactly at each deadline.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{MachineError, RuntimeError};
use crate::events::{Bus, Event};
use crate::sheet::Message;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::task_queue::QueueWatch;
use crate::trigger::TriggerConfig;

use super::{Machine, MachineSnapshot, MachineState};

const COMMAND_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy)]
enum Control {
    Start,
    Stop,
    Pause,
    Resume,
    Step,
}

enum Command {
    Control {
        op: Control,
        reply: oneshot::Sender<MachineState>,
    },
    PostMessage {
        sheet: String,
        message: Message,
        reply: oneshot::Sender<Result<(), MachineError>>,
    },
    SetTrigger {
        sheet: String,
        config: TriggerConfig,
        reply: oneshot::Sender<Result<(), MachineError>>,
    },
    Snapshot {
        reply: oneshot::Sender<MachineSnapshot>,
    },
}

/// Async handle to a machine running in its own task.
pub struct MachineHandle {
    tx: mpsc::Sender<Command>,
    token: CancellationToken,
    bus: Bus,
    tasks: QueueWatch,
    actor: JoinHandle<Machine>,
    listener: Option<JoinHandle<()>>,
}

impl MachineHandle {
    /// Moves `machine` into an actor task and fans its events out to `subscribers`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(machine: Machine, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = machine.bus().clone();
        let tasks = machine.tasks_done();
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);

        let listener = (!subscribers.is_empty()).then(|| {
            let set = SubscriberSet::new(subscribers, bus.clone());
            subscriber_listener(set, bus.subscribe(), token.clone())
        });
        let actor = tokio::spawn(run(machine, rx, token.clone()));

        Self {
            tx,
            token,
            bus,
            tasks,
            actor,
            listener,
        }
    }

    /// Starts (or resumes) the machine.
    pub async fn start(&self) -> Result<MachineState, RuntimeError> {
        self.control(Control::Start).await
    }

    /// Stops the machine (see [`Machine::stop`]).
    pub async fn stop(&self) -> Result<MachineState, RuntimeError> {
        self.control(Control::Stop).await
    }

    /// Pauses the machine.
    pub async fn pause(&self) -> Result<MachineState, RuntimeError> {
        self.control(Control::Pause).await
    }

    /// Resumes a paused machine.
    pub async fn resume(&self) -> Result<MachineState, RuntimeError> {
        self.control(Control::Resume).await
    }

    /// One manual step of every sheet.
    pub async fn step(&self) -> Result<MachineState, RuntimeError> {
        self.control(Control::Step).await
    }

    /// Posts a message to the sheet named `sheet`.
    pub async fn post_message(&self, sheet: &str, message: Message) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::PostMessage {
            sheet: sheet.to_string(),
            message,
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| RuntimeError::Closed)??)
    }

    /// Replaces the trigger of the sheet named `sheet`.
    pub async fn set_trigger(&self, sheet: &str, config: TriggerConfig) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetTrigger {
            sheet: sheet.to_string(),
            config,
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| RuntimeError::Closed)??)
    }

    /// Serializable view of the machine.
    pub async fn snapshot(&self) -> Result<MachineSnapshot, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    /// Receiver of every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Resolves once the machine's deferred task queue has drained.
    pub fn tasks_done(&self) -> impl Future<Output = ()> + Send + 'static + use<> {
        self.tasks.done()
    }

    /// Stops the actor and returns the machine as it was left.
    pub async fn shutdown(self) -> Result<Machine, RuntimeError> {
        self.token.cancel();
        let machine = self.actor.await.map_err(|err| {
            tracing::error!(error = %err, "machine actor failed");
            RuntimeError::Closed
        })?;
        if let Some(listener) = self.listener {
            let _ = listener.await;
        }
        Ok(machine)
    }

    async fn control(&self, op: Control) -> Result<MachineState, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Control { op, reply }).await?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), RuntimeError> {
        self.tx.send(command).await.map_err(|_| RuntimeError::Closed)
    }
}

async fn run(mut machine: Machine, mut rx: mpsc::Receiver<Command>, token: CancellationToken) -> Machine {
    let epoch = Instant::now();
    let base = machine.elapsed();
    tracing::debug!(elapsed = ?base, "machine actor started");

    loop {
        let deadline = machine
            .next_deadline()
            .map(|due| epoch + due.saturating_sub(base));
        tokio::select! {
            _ = token.cancelled() => break,
            command = rx.recv() => {
                let Some(command) = command else { break };
                machine.advance_to(base + epoch.elapsed());
                handle(&mut machine, command);
            }
            _ = wait_until(deadline) => {
                machine.advance_to(base + epoch.elapsed());
            }
        }
    }

    tracing::debug!(state = machine.state().as_str(), "machine actor stopped");
    machine
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn handle(machine: &mut Machine, command: Command) {
    match command {
        Command::Control { op, reply } => {
            let state = match op {
                Control::Start => machine.start(),
                Control::Stop => machine.stop(),
                Control::Pause => machine.pause(),
                Control::Resume => machine.resume(),
                Control::Step => machine.step(),
            };
            let _ = reply.send(state);
        }
        Command::PostMessage {
            sheet,
            message,
            reply,
        } => {
            let result = match machine.sheet_id(&sheet) {
                Some(id) => machine.post_message(id, message),
                None => Err(MachineError::UnknownSheet(sheet)),
            };
            let _ = reply.send(result);
        }
        Command::SetTrigger {
            sheet,
            config,
            reply,
        } => {
            let result = match machine.sheet_id(&sheet) {
                Some(id) => machine.set_trigger(id, config),
                None => Err(MachineError::UnknownSheet(sheet)),
            };
            let _ = reply.send(result);
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(machine.snapshot());
        }
    }
}

/// Forwards bus events to the subscriber set until cancelled.
fn subscriber_listener(
    set: SubscriberSet,
    mut rx: broadcast::Receiver<Event>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(event) => set.emit(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        set.shutdown().await;
    })
}
