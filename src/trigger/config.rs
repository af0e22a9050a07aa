//! # Trigger configuration.
//!
//! [`TriggerConfig`] is the validated, immutable form of the JSON shape used
//! to configure a sheet's trigger:
//!
//! ```json
//! { "type": "time", "repeat": "once", "interval": 5, "intervalUnit": "s",
//!   "start": "2026-01-01T00:00:00Z" }
//! ```
//!
//! Validation happens once, in `TryFrom<RawTriggerConfig>`; a `TriggerConfig`
//! that exists is always usable.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Trigger kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerType {
    /// Steps every machine cycle.
    Continuous,
    /// Steps when messages arrive.
    Arrival,
    /// Steps on a fixed interval.
    Time,
    /// Steps on a randomised interval.
    Random,
    /// Steps when another sheet executes it.
    Execute,
    /// Steps once when the machine starts.
    MachineStart,
    /// Steps once when the machine stops.
    MachineStop,
}

impl TriggerType {
    /// Every kind, in declaration order.
    pub const ALL: &'static [TriggerType] = &[
        TriggerType::Continuous,
        TriggerType::Arrival,
        TriggerType::Time,
        TriggerType::Random,
        TriggerType::Execute,
        TriggerType::MachineStart,
        TriggerType::MachineStop,
    ];

    /// Canonical configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Continuous => "continuous",
            TriggerType::Arrival => "arrival",
            TriggerType::Time => "time",
            TriggerType::Random => "random",
            TriggerType::Execute => "execute",
            TriggerType::MachineStart => "machine-start",
            TriggerType::MachineStop => "machine-stop",
        }
    }

    /// True for `time` and `random`.
    pub fn is_timer(&self) -> bool {
        matches!(self, TriggerType::Time | TriggerType::Random)
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continuous" | "continuously" => Ok(TriggerType::Continuous),
            "arrival" | "onmessage" => Ok(TriggerType::Arrival),
            "time" => Ok(TriggerType::Time),
            "random" => Ok(TriggerType::Random),
            "execute" => Ok(TriggerType::Execute),
            "machine-start" | "start" => Ok(TriggerType::MachineStart),
            "machine-stop" | "stop" => Ok(TriggerType::MachineStop),
            other => Err(ConfigError::UnknownType(other.to_string())),
        }
    }
}

/// Single pass or repeat-until-return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    /// One pass per logical step.
    #[default]
    Once,
    /// Repeat each logical step until `return()`.
    Endless,
}

impl FromStr for Repeat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "once" => Ok(Repeat::Once),
            "endless" => Ok(Repeat::Endless),
            other => Err(ConfigError::UnknownRepeat(other.to_string())),
        }
    }
}

/// Unit of a configured interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    /// Milliseconds.
    #[default]
    Ms,
    /// Seconds.
    S,
    /// Minutes.
    M,
    /// Hours.
    H,
    /// Days.
    D,
}

impl IntervalUnit {
    fn millis(&self) -> f64 {
        match self {
            IntervalUnit::Ms => 1.0,
            IntervalUnit::S => 1_000.0,
            IntervalUnit::M => 60_000.0,
            IntervalUnit::H => 3_600_000.0,
            IntervalUnit::D => 86_400_000.0,
        }
    }
}

impl FromStr for IntervalUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ms" => Ok(IntervalUnit::Ms),
            "s" => Ok(IntervalUnit::S),
            "m" => Ok(IntervalUnit::M),
            "h" => Ok(IntervalUnit::H),
            "d" => Ok(IntervalUnit::D),
            other => Err(ConfigError::UnknownIntervalUnit(other.to_string())),
        }
    }
}

/// Unvalidated configuration as found in JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTriggerConfig {
    /// Trigger type name.
    #[serde(rename = "type")]
    pub kind: String,
    /// `once` (default) or `endless`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<String>,
    /// Interval amount (timer triggers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<f64>,
    /// Interval unit (default `ms`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_unit: Option<String>,
    /// First firing time of a timer trigger (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
}

/// Validated trigger configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerConfig {
    kind: TriggerType,
    repeat: Repeat,
    interval: Option<Duration>,
    start: Option<DateTime<Utc>>,
}

impl TriggerConfig {
    fn of(kind: TriggerType) -> Self {
        Self {
            kind,
            repeat: Repeat::Once,
            interval: None,
            start: None,
        }
    }

    /// `continuous` trigger.
    pub fn continuous() -> Self {
        Self::of(TriggerType::Continuous)
    }

    /// `arrival` trigger.
    pub fn arrival() -> Self {
        Self::of(TriggerType::Arrival)
    }

    /// `execute` trigger.
    pub fn execute() -> Self {
        Self::of(TriggerType::Execute)
    }

    /// `machine-start` trigger.
    pub fn machine_start() -> Self {
        Self::of(TriggerType::MachineStart)
    }

    /// `machine-stop` trigger.
    pub fn machine_stop() -> Self {
        Self::of(TriggerType::MachineStop)
    }

    /// `time` trigger with a fixed interval.
    pub fn time(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            ..Self::of(TriggerType::Time)
        }
    }

    /// `random` trigger with intervals in `[0, interval]`.
    pub fn random(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            ..Self::of(TriggerType::Random)
        }
    }

    /// Switches to `repeat: endless`.
    #[must_use]
    pub fn endless(mut self) -> Self {
        self.repeat = Repeat::Endless;
        self
    }

    /// Sets the first firing time of a timer trigger.
    #[must_use]
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawTriggerConfig = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    /// Parses and validates a JSON value.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let raw: RawTriggerConfig = serde_json::from_value(value)?;
        Self::try_from(raw)
    }

    /// Trigger kind.
    pub fn kind(&self) -> TriggerType {
        self.kind
    }

    /// Repeat mode.
    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    /// True for `repeat: endless`.
    pub fn is_endless(&self) -> bool {
        self.repeat == Repeat::Endless
    }

    /// Interval of a timer trigger.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// First firing time of a timer trigger.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// Converts back to the JSON shape.
    pub fn to_raw(&self) -> RawTriggerConfig {
        RawTriggerConfig {
            kind: self.kind.as_str().to_string(),
            repeat: Some(
                match self.repeat {
                    Repeat::Once => "once",
                    Repeat::Endless => "endless",
                }
                .to_string(),
            ),
            interval: self.interval.map(|d| d.as_millis() as f64),
            interval_unit: self.interval.map(|_| "ms".to_string()),
            start: self.start.map(|s| s.to_rfc3339()),
        }
    }
}

impl TryFrom<RawTriggerConfig> for TriggerConfig {
    type Error = ConfigError;

    fn try_from(raw: RawTriggerConfig) -> Result<Self, Self::Error> {
        let kind: TriggerType = raw.kind.parse()?;
        let repeat = match raw.repeat.as_deref() {
            Some(s) => s.parse()?,
            None => Repeat::Once,
        };
        let unit = match raw.interval_unit.as_deref() {
            Some(s) => s.parse()?,
            None => IntervalUnit::Ms,
        };

        let interval = match raw.interval {
            Some(amount) if !amount.is_finite() || amount <= 0.0 => {
                return Err(ConfigError::InvalidInterval(amount));
            }
            Some(amount) => Some(
                Duration::try_from_secs_f64(amount * unit.millis() / 1_000.0)
                    .map_err(|_| ConfigError::InvalidInterval(amount))?,
            ),
            None if kind.is_timer() => return Err(ConfigError::MissingInterval { kind }),
            None => None,
        };

        let start = raw
            .start
            .map(|value| {
                DateTime::parse_from_rfc3339(&value)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| ConfigError::InvalidStart {
                        value,
                        reason: e.to_string(),
                    })
            })
            .transpose()?;

        Ok(Self {
            kind,
            repeat,
            interval,
            start,
        })
    }
}
