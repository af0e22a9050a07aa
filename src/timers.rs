//! # Virtual-time timers.
//!
//! Cycles never sleep. They arm and cancel timers through the [`Timers`] trait;
//! the machine implements it per sheet over a [`TimerWheel`], a min-heap of
//! deadlines on a virtual clock that the machine (or its actor) advances.
//!
//! ## Rules
//! - Delays are clamped to at least [`MIN_DELAY`].
//! - Timers with equal deadlines fire in arming order.
//! - Cancellation is O(1); cancelled entries are skipped lazily when they reach the heap top.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use crate::config::MIN_DELAY;

/// Handle of an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Arms and cancels timers on behalf of one sheet's cycles.
pub trait Timers {
    /// Arms a timer firing after `delay`.
    fn arm(&mut self, delay: Duration) -> TimerId;

    /// Cancels a timer; returns `false` if it already fired or was cancelled.
    fn cancel(&mut self, id: TimerId) -> bool;
}

/// Min-heap of keyed deadlines on a virtual clock.
#[derive(Debug)]
pub struct TimerWheel<K> {
    now: Duration,
    next_id: u64,
    heap: BinaryHeap<Reverse<(Duration, TimerId)>>,
    live: HashMap<TimerId, (Duration, K)>,
}

impl<K: Copy + Eq> TimerWheel<K> {
    /// Creates an empty wheel at virtual time zero.
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            heap: BinaryHeap::new(),
            live: HashMap::new(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Arms a timer for `key` firing `delay` from now.
    pub fn arm(&mut self, key: K, delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let due = self.now + delay.max(MIN_DELAY);
        self.heap.push(Reverse((due, id)));
        self.live.insert(id, (due, key));
        id
    }

    /// Cancels a timer.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.live.remove(&id).is_some()
    }

    /// Deadline of the earliest live timer.
    pub fn next_deadline(&mut self) -> Option<Duration> {
        while let Some(Reverse((due, id))) = self.heap.peek().copied() {
            if self.live.contains_key(&id) {
                return Some(due);
            }
            self.heap.pop();
        }
        None
    }

    /// Pops the earliest timer due at or before `until`, moving the clock to its deadline.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerId, K)> {
        let due = self.next_deadline()?;
        if due > until {
            return None;
        }
        let Reverse((_, id)) = self.heap.pop()?;
        let (_, key) = self.live.remove(&id)?;
        self.now = self.now.max(due);
        Some((id, key))
    }

    /// Moves the clock forward without firing anything.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Number of live timers for `key`.
    pub fn pending(&self, key: K) -> usize {
        self.live.values().filter(|(_, k)| *k == key).count()
    }

    /// Cancels every live timer for `key`.
    pub fn cancel_all(&mut self, key: K) -> usize {
        let before = self.live.len();
        self.live.retain(|_, (_, k)| *k != key);
        before - self.live.len()
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// True if no timer is armed.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Borrows the wheel as a [`Timers`] implementation bound to `key`.
    pub fn keyed(&mut self, key: K) -> KeyedTimers<'_, K> {
        KeyedTimers { wheel: self, key }
    }
}

impl<K: Copy + Eq> Default for TimerWheel<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// [`Timers`] view of a wheel for a single key.
pub struct KeyedTimers<'a, K> {
    wheel: &'a mut TimerWheel<K>,
    key: K,
}

impl<K: Copy + Eq> Timers for KeyedTimers<'_, K> {
    fn arm(&mut self, delay: Duration) -> TimerId {
        self.wheel.arm(self.key, delay)
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        self.wheel.cancel(id)
    }
}
