//! # The stream sheet surface consumed by triggers.
//!
//! Triggers never evaluate cells themselves. They drive a [`StreamSheet`]
//! through this trait: start a pass, look at the processing and message flags
//! afterwards, advance or detach the current message, and update
//! [`SheetStats`].
//!
//! ## Message model
//! ```text
//! post_message ─► inbox ─► (attached on a non-reusing step) ─► loop elements
//!                                                            │
//!          next_loop_element() after each completed step ◄───┘
//!          detach_message() once is_message_processed()
//! ```
//!
//! ## Rules
//! - `trigger_step(false)` attaches the next inbox message if none is attached;
//!   `trigger_step(true)` re-runs against whatever is attached.
//! - A sheet that blocks mid-pass sets `is_paused()`; it finishes that pass in
//!   `resume_processing` or abandons it in `stop_processing`.
//! - `take_return_signal` and `take_requests` drain what the last pass produced.

mod script;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EvalError;

pub use script::{ScriptSheet, StepScope};

/// Stable handle of a sheet registered on a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SheetId(pub(crate) u64);

impl SheetId {
    /// Raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sheet#{}", self.0)
    }
}

/// Step counters owned by a sheet and updated by its trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetStats {
    /// Logical steps.
    pub steps: u64,
    /// Passes inside the current repeat-until; reset by every new logical step.
    pub repeatsteps: u64,
    /// Repetitions of the current execute call; reset by every fresh call.
    pub executesteps: u64,
}

static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Inbox message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique id.
    pub id: u64,
    /// Payload.
    pub data: Value,
}

impl Message {
    /// Creates a message with a fresh id.
    pub fn new(data: Value) -> Self {
        Self {
            id: MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed),
            data,
        }
    }
}

/// Asks a target sheet to run a number of repetitions on behalf of the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteRequest {
    /// Name of the target sheet.
    pub target: String,
    /// Number of repetitions (at least 1).
    pub repetitions: u32,
    /// `Some(true)` fast, `Some(false)` or `None` machine-cycle paced.
    pub pace: Option<bool>,
    /// Message handed to the target in preference to its inbox.
    pub message: Option<Message>,
    /// Continuation of a previous call (keeps `executesteps` accumulating).
    pub repeating: bool,
}

impl ExecuteRequest {
    /// Request with default pacing and no message.
    pub fn new(target: impl Into<String>, repetitions: u32) -> Self {
        Self {
            target: target.into(),
            repetitions,
            pace: None,
            message: None,
            repeating: false,
        }
    }

    /// Selects fast (`true`) or machine-cycle (`false`) pacing.
    #[must_use]
    pub fn paced(mut self, fast: bool) -> Self {
        self.pace = Some(fast);
        self
    }

    /// Hands a message to the target.
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }

    /// Marks the request as a continuation.
    #[must_use]
    pub fn repeating(mut self) -> Self {
        self.repeating = true;
        self
    }
}

/// Side requests a sheet raised during its last pass.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetRequest {
    /// Run another sheet; the caller stays paused until resumed.
    Execute(ExecuteRequest),
}

/// A stream sheet as seen by its trigger.
pub trait StreamSheet: Send {
    /// Sheet name, unique per machine.
    fn name(&self) -> &str;

    /// Runs one pass; `reuse_message` keeps the attached message instead of attaching the next one.
    fn trigger_step(&mut self, reuse_message: bool) -> Result<(), EvalError>;

    /// True once the last pass ran to completion.
    fn is_processed(&self) -> bool;

    /// True while a pass is blocked (sheet-level pause).
    fn is_paused(&self) -> bool;

    /// True if a pass started but neither finished nor blocked.
    fn is_not_fully_processed(&self) -> bool {
        !self.is_processed() && !self.is_paused()
    }

    /// True if the inbox holds messages not yet attached.
    fn has_new_message(&self) -> bool;

    /// True if no message is attached or its loop is exhausted.
    fn is_message_processed(&self) -> bool;

    /// Moves the message handler to the next loop element.
    fn next_loop_element(&mut self);

    /// Appends a message to the inbox.
    fn post_message(&mut self, message: Message);

    /// Puts a message in front of the inbox so the next step consumes it.
    fn attach_message(&mut self, message: Message);

    /// Removes the attached message.
    fn detach_message(&mut self) -> Option<Message>;

    /// Step counters.
    fn stats(&self) -> &SheetStats;

    /// Mutable step counters.
    fn stats_mut(&mut self) -> &mut SheetStats;

    /// Blocks the current pass.
    fn pause_processing(&mut self);

    /// Unblocks and finishes the current pass with `value` as the blocking call's result.
    fn resume_processing(&mut self, value: Value);

    /// Abandons the current pass.
    fn stop_processing(&mut self, value: Option<Value>);

    /// Returns and clears the `return()` signal of the last pass.
    fn take_return_signal(&mut self) -> bool;

    /// Returns and clears side requests of the last pass.
    fn take_requests(&mut self) -> Vec<SheetRequest>;
}
