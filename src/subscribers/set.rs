//! Per-subscriber delivery of machine events.
//!
//! The machine actor's listener hands every bus event to [`SubscriberSet::emit`].
//! Each subscriber owns a bounded queue drained by its own worker task, so a slow
//! `LogWriter` never delays a step and one subscriber's panic stays local.
//! Events a subscriber cannot take are dropped for it and reported as
//! `SubscriberOverflow`; overflow about overflow is not reported again.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event};

use super::Subscribe;

struct Mailbox {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Subscribers of one machine, each behind its own queue and worker.
pub struct SubscriberSet {
    mailboxes: Vec<Mailbox>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns a worker per subscriber. Needs a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (mailboxes, workers): (Vec<_>, Vec<_>) = subs
            .into_iter()
            .map(|sub| {
                let name = sub.name();
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let worker = tokio::spawn(deliver(sub, rx, bus.clone()));
                (Mailbox { name, tx }, worker)
            })
            .unzip();

        Self {
            mailboxes,
            workers,
            bus,
        }
    }

    /// Queues `event` for every subscriber without waiting for any of them.
    pub fn emit(&self, event: &Event) {
        let shared = Arc::new(event.clone());
        for mailbox in &self.mailboxes {
            let reason = match mailbox.tx.try_send(Arc::clone(&shared)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            tracing::warn!(subscriber = mailbox.name, reason, "subscriber dropped event");
            if !event.is_internal() {
                self.bus
                    .publish(Event::subscriber_overflow(mailbox.name, reason));
            }
        }
    }

    /// Closes every queue and waits until the workers have delivered what was queued.
    pub async fn shutdown(self) {
        drop(self.mailboxes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mailboxes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mailboxes.len()
    }
}

async fn deliver(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    let name = sub.name();
    while let Some(event) = rx.recv().await {
        let call = std::panic::AssertUnwindSafe(sub.on_event(event.as_ref()));
        if let Err(panic) = call.catch_unwind().await {
            let info = panic_message(panic.as_ref());
            tracing::warn!(subscriber = name, %info, "subscriber panicked");
            bus.publish(Event::subscriber_panicked(name, info));
        }
    }
}

/// Text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
