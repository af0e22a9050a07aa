//! # Deferred FIFO work.
//!
//! [`TaskQueue`] lets a trigger (through the machine) say "run this after the
//! current tick": cross-sheet execute calls, caller resumption and the final
//! machine-stop steps are queued here and drained in order by the owner.
//!
//! ## Rules
//! - FIFO: tasks run in scheduling order; tasks scheduled while draining run in the same drain.
//! - The owner drains with [`TaskQueue::pop`] + [`TaskQueue::settle`], passing itself as context.
//! - [`TaskQueue::done`] resolves once the queue is empty and nothing is running.
//! - [`TaskQueue::reset`] drops pending tasks without running them.

use std::collections::VecDeque;
use std::future::Future;

use tokio::sync::watch;

/// Deferred unit of work receiving the queue owner as context.
pub type Task<C> = Box<dyn FnOnce(&mut C) + Send>;

/// FIFO of deferred closures with an awaitable "drained" signal.
pub struct TaskQueue<C> {
    queue: VecDeque<Task<C>>,
    pending: watch::Sender<usize>,
}

impl<C> TaskQueue<C> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (pending, _rx) = watch::channel(0);
        Self {
            queue: VecDeque::new(),
            pending,
        }
    }

    /// Appends a task.
    pub fn schedule<F>(&mut self, task: F)
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        self.queue.push_back(Box::new(task));
        self.pending.send_replace(self.queue.len());
    }

    /// Takes the next task. The pending count is left untouched until [`TaskQueue::settle`].
    pub fn pop(&mut self) -> Option<Task<C>> {
        self.queue.pop_front()
    }

    /// Publishes the current queue length after a task ran.
    pub fn settle(&mut self) {
        self.pending.send_replace(self.queue.len());
    }

    /// Drops every pending task; returns how many were dropped.
    pub fn reset(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.pending.send_replace(0);
        dropped
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Future resolving once the queue has drained.
    pub fn done(&self) -> impl Future<Output = ()> + Send + 'static + use<C> {
        let watch = self.watch();
        watch.done()
    }

    /// Detached observer of the pending count.
    pub fn watch(&self) -> QueueWatch {
        QueueWatch {
            rx: self.pending.subscribe(),
        }
    }
}

impl<C> Default for TaskQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer of a [`TaskQueue`]'s pending count, usable from other tasks.
#[derive(Clone, Debug)]
pub struct QueueWatch {
    rx: watch::Receiver<usize>,
}

impl QueueWatch {
    /// Resolves once the queue is empty (immediately if it already is, or if the queue is gone).
    pub fn done(&self) -> impl Future<Output = ()> + Send + 'static + use<> {
        let mut rx = self.rx.clone();
        async move {
            let _ = rx.wait_for(|n| *n == 0).await;
        }
    }

    /// Last published pending count.
    pub fn pending(&self) -> usize {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn drain(queue: &mut TaskQueue<Vec<u32>>, log: &mut Vec<u32>) {
        while let Some(task) = queue.pop() {
            task(log);
            queue.settle();
        }
    }

    #[test]
    fn test_runs_in_fifo_order() {
        let mut queue: TaskQueue<Vec<u32>> = TaskQueue::new();
        queue.schedule(|log| log.push(1));
        queue.schedule(|log| log.push(2));
        queue.schedule(|log| log.push(3));
        assert_eq!(queue.len(), 3);

        let mut log = Vec::new();
        drain(&mut queue, &mut log);
        assert_eq!(log, vec![1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_reset_drops_without_running() {
        let mut queue: TaskQueue<Vec<u32>> = TaskQueue::new();
        queue.schedule(|log| log.push(1));
        queue.schedule(|log| log.push(2));
        assert_eq!(queue.reset(), 2);

        let mut log = Vec::new();
        drain(&mut queue, &mut log);
        assert!(log.is_empty());
        assert_eq!(queue.watch().pending(), 0);
    }

    #[tokio::test]
    async fn test_done_resolves_after_drain() {
        let mut queue: TaskQueue<Vec<u32>> = TaskQueue::new();
        queue.schedule(|log| log.push(1));
        let done = queue.done();
        assert_eq!(queue.watch().pending(), 1);

        let mut log = Vec::new();
        drain(&mut queue, &mut log);
        tokio::time::timeout(Duration::from_secs(1), done)
            .await
            .expect("queue drained");
    }

    #[tokio::test]
    async fn test_done_is_immediate_when_empty() {
        let queue: TaskQueue<()> = TaskQueue::new();
        tokio::time::timeout(Duration::from_millis(10), queue.done())
            .await
            .expect("empty queue is done");
    }
}
