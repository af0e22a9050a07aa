use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    config::SchedulerConfig,
    error::MachineError,
    events::Bus,
    sheet::StreamSheet,
    subscribers::Subscribe,
    trigger::TriggerConfig,
};

use super::{Machine, MachineHandle};

/// Builder for a [`Machine`] or a spawned [`MachineHandle`].
pub struct MachineBuilder {
    config: SchedulerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    sheets: Vec<(Box<dyn StreamSheet>, TriggerConfig)>,
    origin: Option<DateTime<Utc>>,
}

impl MachineBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            subscribers: Vec::new(),
            sheets: Vec::new(),
            origin: None,
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers are wired up by [`MachineBuilder::spawn`]; a machine from
    /// [`MachineBuilder::build`] only exposes its [`Bus`].
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds a sheet with its trigger configuration.
    pub fn with_sheet(mut self, sheet: impl StreamSheet + 'static, config: TriggerConfig) -> Self {
        self.sheets.push((Box::new(sheet), config));
        self
    }

    /// Pins the wall-clock time of virtual time zero (defaults to now).
    pub fn with_origin(mut self, origin: DateTime<Utc>) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Builds a stopped machine.
    ///
    /// Fails on duplicate sheet names.
    pub fn build(self) -> Result<Machine, MachineError> {
        self.into_parts().map(|(machine, _)| machine)
    }

    /// Builds the machine and spawns its actor. Must be called inside a tokio runtime.
    pub fn spawn(self) -> Result<MachineHandle, MachineError> {
        let (machine, subscribers) = self.into_parts()?;
        Ok(MachineHandle::spawn(machine, subscribers))
    }

    fn into_parts(self) -> Result<(Machine, Vec<Arc<dyn Subscribe>>), MachineError> {
        let bus = Bus::new(self.config.bus_capacity_clamped());
        let origin = self.origin.unwrap_or_else(Utc::now);
        let mut machine = Machine::new(self.config, bus, origin);
        for (sheet, config) in self.sheets {
            machine.add_sheet(sheet, config)?;
        }
        Ok((machine, self.subscribers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::ScriptSheet;

    #[test]
    fn test_build_registers_sheets() {
        let machine = MachineBuilder::new(SchedulerConfig::default())
            .with_sheet(ScriptSheet::new("S1"), TriggerConfig::continuous())
            .with_sheet(ScriptSheet::new("S2"), TriggerConfig::execute())
            .build()
            .expect("build");
        assert!(machine.sheet_id("S1").is_some());
        assert!(machine.sheet_id("S2").is_some());
        assert_eq!(machine.snapshot().sheets.len(), 2);
    }

    #[test]
    fn test_build_rejects_duplicate_names() {
        let err = MachineBuilder::new(SchedulerConfig::default())
            .with_sheet(ScriptSheet::new("S1"), TriggerConfig::continuous())
            .with_sheet(ScriptSheet::new("S1"), TriggerConfig::arrival())
            .build()
            .expect_err("duplicate");
        assert!(matches!(err, MachineError::DuplicateSheet(name) if name == "S1"));
    }

    #[test]
    fn test_origin_is_pinned() {
        let origin = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .expect("date")
            .with_timezone(&Utc);
        let machine = MachineBuilder::new(SchedulerConfig::default())
            .with_origin(origin)
            .build()
            .expect("build");
        assert_eq!(machine.now(), origin);
    }
}
