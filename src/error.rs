//! Error types used by the scheduler.
//!
//! - [`ConfigError`]: trigger configuration rejected at construction time.
//! - [`ExecuteError`]: an `execute()` call a target trigger refused.
//! - [`EvalError`]: a sheet failed while evaluating a step.
//! - [`MachineError`]: machine-level administration failures (unknown sheet, duplicates).
//! - [`RuntimeError`]: the machine actor is gone.
//!
//! Every enum provides `as_label()` (stable snake_case for logs/metrics).
//! Runtime trigger operations never return errors: failures inside a step are
//! logged and published as events, and the cycle keeps going.

use thiserror::Error;

use crate::trigger::TriggerType;

/// # Errors produced while validating a trigger configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The `type` field names no known trigger kind.
    #[error("unknown trigger type '{0}'")]
    UnknownType(String),

    /// The `repeat` field is neither `once` nor `endless`.
    #[error("unknown repeat mode '{0}'")]
    UnknownRepeat(String),

    /// The `intervalUnit` field is not one of ms, s, m, h, d.
    #[error("unknown interval unit '{0}'")]
    UnknownIntervalUnit(String),

    /// A timer trigger was configured without an interval.
    #[error("trigger type '{kind}' requires an interval")]
    MissingInterval {
        /// Trigger kind that needs the interval.
        kind: TriggerType,
    },

    /// Interval is zero, negative or not a finite number.
    #[error("interval must be a positive number, got {0}")]
    InvalidInterval(f64),

    /// The `start` field is not an RFC 3339 timestamp.
    #[error("invalid start time '{value}': {reason}")]
    InvalidStart {
        /// Raw value as configured.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// An update tried to change the trigger kind in place.
    #[error("cannot update a '{expected}' trigger with a '{found}' configuration")]
    KindMismatch {
        /// Kind of the installed trigger.
        expected: TriggerType,
        /// Kind carried by the new configuration.
        found: TriggerType,
    },

    /// Configuration JSON could not be decoded.
    #[error("malformed trigger configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use sheetcycle::ConfigError;
    ///
    /// let err = ConfigError::UnknownType("hourly".into());
    /// assert_eq!(err.as_label(), "config_unknown_type");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::UnknownType(_) => "config_unknown_type",
            ConfigError::UnknownRepeat(_) => "config_unknown_repeat",
            ConfigError::UnknownIntervalUnit(_) => "config_unknown_interval_unit",
            ConfigError::MissingInterval { .. } => "config_missing_interval",
            ConfigError::InvalidInterval(_) => "config_invalid_interval",
            ConfigError::InvalidStart { .. } => "config_invalid_start",
            ConfigError::KindMismatch { .. } => "config_kind_mismatch",
            ConfigError::Json(_) => "config_json",
        }
    }
}

/// # Errors returned when a sheet asks another sheet to execute.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecuteError {
    /// The target is already serving an execute call.
    #[error("sheet '{target}' is busy executing for another caller")]
    Busy {
        /// Name of the busy target sheet.
        target: String,
    },

    /// The target's trigger is not an execute trigger.
    #[error("sheet '{target}' is not driven by an execute trigger")]
    NotExecutable {
        /// Name of the target sheet.
        target: String,
    },

    /// No sheet with that name exists on the machine.
    #[error("no sheet named '{0}'")]
    UnknownTarget(String),

    /// Zero repetitions were requested.
    #[error("execute requires at least one repetition")]
    NoRepetitions,
}

impl ExecuteError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecuteError::Busy { .. } => "execute_busy",
            ExecuteError::NotExecutable { .. } => "execute_not_executable",
            ExecuteError::UnknownTarget(_) => "execute_unknown_target",
            ExecuteError::NoRepetitions => "execute_no_repetitions",
        }
    }
}

/// # Evaluation failure reported by a sheet step.
///
/// Triggers swallow these: the failure is logged and published as
/// `EvaluationFailed`, and the cycle continues rescheduling.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A cell formula failed.
    #[error("cell '{cell}' failed: {reason}")]
    Cell {
        /// Cell reference.
        cell: String,
        /// Failure description.
        reason: String,
    },

    /// The sheet failed outside any particular cell.
    #[error("sheet evaluation failed: {0}")]
    Sheet(String),
}

impl EvalError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EvalError::Cell { .. } => "eval_cell",
            EvalError::Sheet(_) => "eval_sheet",
        }
    }
}

/// # Errors produced by machine administration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum MachineError {
    /// No sheet with the given id or name is registered.
    #[error("unknown sheet '{0}'")]
    UnknownSheet(String),

    /// A sheet with the same name is already registered.
    #[error("sheet '{0}' already exists")]
    DuplicateSheet(String),

    /// The supplied trigger configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MachineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use sheetcycle::MachineError;
    ///
    /// let err = MachineError::DuplicateSheet("S1".into());
    /// assert_eq!(err.as_label(), "machine_duplicate_sheet");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            MachineError::UnknownSheet(_) => "machine_unknown_sheet",
            MachineError::DuplicateSheet(_) => "machine_duplicate_sheet",
            MachineError::Config(err) => err.as_label(),
        }
    }
}

/// # Errors produced by the machine actor handle.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The actor has shut down and no longer accepts commands.
    #[error("machine actor is closed")]
    Closed,

    /// A machine-level command failed inside the actor.
    #[error(transparent)]
    Machine(#[from] MachineError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Closed => "runtime_closed",
            RuntimeError::Machine(err) => err.as_label(),
        }
    }
}
