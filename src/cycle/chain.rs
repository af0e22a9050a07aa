//! # CycleChain: parent/child cycle stack of one trigger.
//!
//! The chain always has a root; children are pushed on top of it and the top
//! is the active cycle.
//!
//! ## Rules
//! - `push` cancels the current active cycle's timer before the child becomes active.
//! - `pop` cancels the child's timer; the parent becomes active unarmed.
//! - `replace` and `dispose` cancel timers across the whole chain.

use crate::timers::Timers;

use super::{Cycle, CycleKind};

/// Root cycle plus a stack of child cycles.
#[derive(Debug)]
pub struct CycleChain {
    root: Cycle,
    children: Vec<Cycle>,
}

impl CycleChain {
    /// Chain consisting of `root` only.
    pub fn new(root: Cycle) -> Self {
        Self {
            root,
            children: Vec::new(),
        }
    }

    /// Active (top-most) cycle.
    pub fn active(&self) -> &Cycle {
        self.children.last().unwrap_or(&self.root)
    }

    /// Mutable active cycle.
    pub fn active_mut(&mut self) -> &mut Cycle {
        match self.children.last_mut() {
            Some(child) => child,
            None => &mut self.root,
        }
    }

    /// Root cycle.
    pub fn root(&self) -> &Cycle {
        &self.root
    }

    /// Number of cycles, root included.
    pub fn depth(&self) -> usize {
        1 + self.children.len()
    }

    /// True if the root is active.
    pub fn is_at_root(&self) -> bool {
        self.children.is_empty()
    }

    /// True if any cycle in the chain has this kind tag.
    pub fn contains(&self, matches: impl Fn(CycleKind) -> bool) -> bool {
        self.iter().any(|c| matches(c.kind()))
    }

    /// Cycles from root to active.
    pub fn iter(&self) -> impl Iterator<Item = &Cycle> {
        std::iter::once(&self.root).chain(self.children.iter())
    }

    /// Number of cycles currently holding a timer.
    pub fn armed(&self) -> usize {
        self.iter().filter(|c| c.is_armed()).count()
    }

    /// Installs `child` as the active cycle.
    pub fn push(&mut self, child: Cycle, timers: &mut dyn Timers) {
        self.active_mut().clear(timers);
        self.children.push(child);
    }

    /// Removes the active child; the root is never popped.
    pub fn pop(&mut self, timers: &mut dyn Timers) -> Option<Cycle> {
        let mut child = self.children.pop()?;
        child.clear(timers);
        Some(child)
    }

    /// Pops every child.
    pub fn unwind(&mut self, timers: &mut dyn Timers) -> usize {
        let mut popped = 0;
        while self.pop(timers).is_some() {
            popped += 1;
        }
        popped
    }

    /// Tears the chain down and installs a new root.
    pub fn replace(&mut self, root: Cycle, timers: &mut dyn Timers) {
        self.dispose(timers);
        self.root = root;
    }

    /// Cancels every timer and drops every child.
    pub fn dispose(&mut self, timers: &mut dyn Timers) {
        self.unwind(timers);
        self.root.clear(timers);
    }

    /// Changes the root's kind in place (used when a manual root turns timer-driven).
    pub fn set_root_kind(&mut self, kind: CycleKind, timers: &mut dyn Timers) {
        self.root.clear(timers);
        *self.root.kind_mut() = kind;
    }

    /// Pauses every cycle.
    pub fn pause_all(&mut self, timers: &mut dyn Timers) {
        self.root.pause(timers);
        for child in &mut self.children {
            child.pause(timers);
        }
    }

    /// Unpauses every cycle; returns whether any was paused.
    pub fn resume_all(&mut self) -> bool {
        let mut any = self.root.resume();
        for child in &mut self.children {
            any |= child.resume();
        }
        any
    }

    /// Turns manual children into their timer-driven variants.
    pub fn promote_children(&mut self) {
        for child in &mut self.children {
            let kind = child.kind().promoted();
            *child.kind_mut() = kind;
        }
    }
}
