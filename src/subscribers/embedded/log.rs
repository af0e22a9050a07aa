//! # LogWriter: renders bus events through tracing
//!
//! A minimal subscriber that forwards incoming [`Event`]s to `tracing`.
//! Install any `tracing` subscriber (for example `tracing_subscriber::fmt`)
//! to see the output.
//!
//! ## Example output
//! ```text
//! INFO sheetcycle: machine state changed state=Running
//! DEBUG sheetcycle: step completed sheet="S1" steps=3
//! INFO sheetcycle: repeat finished sheet="S1" repeatsteps=2
//! WARN sheetcycle: evaluation failed sheet="S2" reason="cell 'A1' failed: #DIV/0"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let sheet = e.sheet.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::MachineStateChanged => {
                tracing::info!(target: "sheetcycle", state = ?e.state, "machine state changed");
            }
            EventKind::TriggerStarted => {
                tracing::info!(target: "sheetcycle", sheet, kind = reason, "trigger started");
            }
            EventKind::TriggerStopped => {
                tracing::info!(target: "sheetcycle", sheet, "trigger stopped");
            }
            EventKind::StepCompleted => {
                tracing::debug!(target: "sheetcycle", sheet, steps = ?e.count, "step completed");
            }
            EventKind::RepeatFinished => {
                tracing::info!(target: "sheetcycle", sheet, repeatsteps = ?e.count, "repeat finished");
            }
            EventKind::MessageDetached => {
                tracing::debug!(target: "sheetcycle", sheet, message = ?e.count, "message detached");
            }
            EventKind::SheetPaused | EventKind::SheetResumed => {
                tracing::debug!(target: "sheetcycle", sheet, kind = ?e.kind, "sheet processing");
            }
            EventKind::EvaluationFailed => {
                tracing::warn!(target: "sheetcycle", sheet, reason, "evaluation failed");
            }
            EventKind::StaleTimer => {
                tracing::debug!(target: "sheetcycle", sheet, "stale timer ignored");
            }
            EventKind::ExecuteStarted => {
                tracing::info!(
                    target: "sheetcycle",
                    sheet,
                    repetitions = ?e.count,
                    pace_ms = ?e.delay_ms,
                    "execute started"
                );
            }
            EventKind::ExecuteCompleted => {
                tracing::info!(target: "sheetcycle", sheet, executesteps = ?e.count, "execute completed");
            }
            EventKind::ExecuteRejected => {
                tracing::warn!(target: "sheetcycle", sheet, reason, "execute rejected");
            }
            EventKind::ExecuteCancelled => {
                tracing::info!(target: "sheetcycle", sheet, "execute cancelled");
            }
            EventKind::TaskPanicked => {
                tracing::error!(target: "sheetcycle", reason, "deferred task panicked");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "sheetcycle", subscriber = sheet, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(target: "sheetcycle", subscriber = sheet, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
