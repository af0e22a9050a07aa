//! # ScriptSheet: a closure-driven stream sheet.
//!
//! A small [`StreamSheet`] whose pass is a Rust closure over a map of numeric
//! cells. It models everything a trigger relies on: inbox and attached message
//! with loop elements, `return()`, blocking functions and `execute()` requests.
//!
//! ```rust
//! use sheetcycle::{ScriptSheet, StreamSheet};
//!
//! let mut sheet = ScriptSheet::new("S1")
//!     .with_cell("A1", 1.0)
//!     .on_step(|s| {
//!         let a1 = s.cell("A1");
//!         s.set_cell("A1", a1 + 1.0);
//!         Ok(())
//!     });
//!
//! sheet.trigger_step(false).unwrap();
//! assert_eq!(sheet.cell("A1"), 2.0);
//! ```

use std::collections::{BTreeMap, VecDeque};

use serde_json::Value;

use super::{ExecuteRequest, Message, SheetRequest, SheetStats, StreamSheet};
use crate::error::EvalError;

type StepFn = Box<dyn FnMut(&mut StepScope<'_>) -> Result<(), EvalError> + Send>;

fn idle_pass(_: &mut StepScope<'_>) -> Result<(), EvalError> {
    Ok(())
}

#[derive(Debug)]
struct Attached {
    message: Message,
    elements: usize,
    index: usize,
}

impl Attached {
    fn new(message: Message, loop_path: Option<&str>) -> Self {
        let elements = loop_path
            .and_then(|path| message.data.pointer(path))
            .and_then(Value::as_array)
            .map_or(1, |items| items.len().max(1));
        Self {
            message,
            elements,
            index: 0,
        }
    }

    fn element<'a>(&'a self, loop_path: Option<&str>) -> Option<&'a Value> {
        match loop_path {
            Some(path) => self
                .message
                .data
                .pointer(path)
                .and_then(Value::as_array)
                .and_then(|items| items.get(self.index)),
            None => Some(&self.message.data),
        }
    }
}

#[derive(Default)]
struct Signals {
    returned: bool,
    paused: bool,
    requests: Vec<SheetRequest>,
}

/// What a step closure sees of its sheet during one pass.
pub struct StepScope<'a> {
    cells: &'a mut BTreeMap<String, f64>,
    stats: SheetStats,
    message: Option<&'a Message>,
    element: Option<&'a Value>,
    index: Option<usize>,
    resumed_with: Option<&'a Value>,
    signals: &'a mut Signals,
}

impl StepScope<'_> {
    /// Cell value (0 when unset).
    pub fn cell(&self, name: &str) -> f64 {
        self.cells.get(name).copied().unwrap_or_default()
    }

    /// Sets a cell.
    pub fn set_cell(&mut self, name: &str, value: f64) {
        self.cells.insert(name.to_string(), value);
    }

    /// Counters as they were when the pass started.
    pub fn stats(&self) -> SheetStats {
        self.stats
    }

    /// Attached message.
    pub fn message(&self) -> Option<&Message> {
        self.message
    }

    /// Current loop element of the attached message.
    pub fn loop_element(&self) -> Option<&Value> {
        self.element
    }

    /// Index of the current loop element.
    pub fn loop_index(&self) -> Option<usize> {
        self.index
    }

    /// Value the last blocking call resumed with.
    pub fn resumed_with(&self) -> Option<&Value> {
        self.resumed_with
    }

    /// Signals `return()`: ends the surrounding repeat-until.
    pub fn ret(&mut self) {
        self.signals.returned = true;
    }

    /// Blocks the pass until the trigger resumes the sheet.
    pub fn pause(&mut self) {
        self.signals.paused = true;
    }

    /// Asks another sheet to execute; blocks until it completes.
    pub fn execute(&mut self, request: ExecuteRequest) {
        self.signals.requests.push(SheetRequest::Execute(request));
        self.signals.paused = true;
    }
}

/// Closure-driven [`StreamSheet`].
pub struct ScriptSheet {
    name: String,
    cells: BTreeMap<String, f64>,
    inbox: VecDeque<Message>,
    attached: Option<Attached>,
    loop_path: Option<String>,
    body: StepFn,
    stats: SheetStats,
    processed: bool,
    paused: bool,
    returned: bool,
    requests: Vec<SheetRequest>,
    resumed_with: Option<Value>,
}

impl ScriptSheet {
    /// Sheet with no cells and a no-op pass.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
            inbox: VecDeque::new(),
            attached: None,
            loop_path: None,
            body: Box::new(idle_pass),
            stats: SheetStats::default(),
            processed: true,
            paused: false,
            returned: false,
            requests: Vec::new(),
            resumed_with: None,
        }
    }

    /// Sets an initial cell value.
    #[must_use]
    pub fn with_cell(mut self, name: &str, value: f64) -> Self {
        self.cells.insert(name.to_string(), value);
        self
    }

    /// Iterates messages over the array found at this JSON pointer.
    #[must_use]
    pub fn with_loop(mut self, pointer: impl Into<String>) -> Self {
        self.loop_path = Some(pointer.into());
        self
    }

    /// Sets the pass closure.
    #[must_use]
    pub fn on_step<F>(mut self, body: F) -> Self
    where
        F: FnMut(&mut StepScope<'_>) -> Result<(), EvalError> + Send + 'static,
    {
        self.body = Box::new(body);
        self
    }

    /// Cell value (0 when unset).
    pub fn cell(&self, name: &str) -> f64 {
        self.cells.get(name).copied().unwrap_or_default()
    }

    /// Messages waiting in the inbox.
    pub fn inbox_len(&self) -> usize {
        self.inbox.len()
    }

    /// Attached message, if any.
    pub fn attached_message(&self) -> Option<&Message> {
        self.attached.as_ref().map(|a| &a.message)
    }

    /// Value of the last resume or stop.
    pub fn resumed_with(&self) -> Option<&Value> {
        self.resumed_with.as_ref()
    }
}

impl StreamSheet for ScriptSheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn trigger_step(&mut self, reuse_message: bool) -> Result<(), EvalError> {
        if self.paused {
            return Ok(());
        }
        if !reuse_message && self.attached.is_none() {
            let loop_path = self.loop_path.as_deref();
            self.attached = self
                .inbox
                .pop_front()
                .map(|message| Attached::new(message, loop_path));
        }

        self.processed = false;
        self.returned = false;
        let mut signals = Signals::default();
        let loop_path = self.loop_path.as_deref();
        let result = {
            let mut scope = StepScope {
                cells: &mut self.cells,
                stats: self.stats,
                message: self.attached.as_ref().map(|a| &a.message),
                element: self.attached.as_ref().and_then(|a| a.element(loop_path)),
                index: self.attached.as_ref().map(|a| a.index),
                resumed_with: self.resumed_with.as_ref(),
                signals: &mut signals,
            };
            (self.body)(&mut scope)
        };

        self.returned = signals.returned;
        self.requests.extend(signals.requests);
        if signals.paused {
            self.paused = true;
        } else {
            self.processed = true;
        }
        result
    }

    fn is_processed(&self) -> bool {
        self.processed
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn has_new_message(&self) -> bool {
        !self.inbox.is_empty()
    }

    fn is_message_processed(&self) -> bool {
        self.attached.as_ref().is_none_or(|a| a.index >= a.elements)
    }

    fn next_loop_element(&mut self) {
        if let Some(attached) = self.attached.as_mut() {
            attached.index += 1;
        }
    }

    fn post_message(&mut self, message: Message) {
        self.inbox.push_back(message);
    }

    fn attach_message(&mut self, message: Message) {
        self.inbox.push_front(message);
    }

    fn detach_message(&mut self) -> Option<Message> {
        self.attached.take().map(|a| a.message)
    }

    fn stats(&self) -> &SheetStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut SheetStats {
        &mut self.stats
    }

    fn pause_processing(&mut self) {
        self.paused = true;
    }

    fn resume_processing(&mut self, value: Value) {
        if self.paused {
            self.paused = false;
            self.processed = true;
            self.resumed_with = Some(value);
        }
    }

    fn stop_processing(&mut self, value: Option<Value>) {
        self.paused = false;
        self.processed = true;
        self.returned = false;
        if value.is_some() {
            self.resumed_with = value;
        }
    }

    fn take_return_signal(&mut self) -> bool {
        std::mem::take(&mut self.returned)
    }

    fn take_requests(&mut self) -> Vec<SheetRequest> {
        std::mem::take(&mut self.requests)
    }
}
