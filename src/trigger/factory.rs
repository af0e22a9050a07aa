//! Constructs triggers from configuration.
//!
//! The factory is a dispatch table keyed by [`TriggerType`]; every kind maps to
//! a constructor. Embedders may register their own constructor for a kind, e.g.
//! to wrap configuration defaults.

use std::collections::HashMap;

use serde_json::Value;

use super::{Trigger, TriggerConfig, TriggerType};
use crate::error::ConfigError;

/// Constructor registered for one trigger kind.
pub type TriggerCtor = fn(TriggerConfig) -> Trigger;

/// Builds triggers by kind.
#[derive(Debug, Clone)]
pub struct TriggerFactory {
    ctors: HashMap<TriggerType, TriggerCtor>,
}

impl TriggerFactory {
    /// Factory with the built-in constructor for every kind.
    pub fn new() -> Self {
        let ctors = TriggerType::ALL
            .iter()
            .map(|kind| (*kind, Trigger::new as TriggerCtor))
            .collect();
        Self { ctors }
    }

    /// Replaces the constructor of `kind`; returns the previous one.
    pub fn register(&mut self, kind: TriggerType, ctor: TriggerCtor) -> Option<TriggerCtor> {
        self.ctors.insert(kind, ctor)
    }

    /// True if `kind` has a constructor.
    pub fn supports(&self, kind: TriggerType) -> bool {
        self.ctors.contains_key(&kind)
    }

    /// Builds a trigger for `config`.
    pub fn create(&self, config: TriggerConfig) -> Trigger {
        match self.ctors.get(&config.kind()) {
            Some(ctor) => ctor(config),
            None => Trigger::new(config),
        }
    }

    /// Parses a JSON trigger description and builds it.
    pub fn create_from_json(&self, json: &str) -> Result<Trigger, ConfigError> {
        TriggerConfig::from_json(json).map(|config| self.create(config))
    }

    /// Builds a trigger from an already parsed JSON value.
    pub fn create_from_value(&self, value: Value) -> Result<Trigger, ConfigError> {
        TriggerConfig::from_value(value).map(|config| self.create(config))
    }
}

impl Default for TriggerFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn endless_ctor(config: TriggerConfig) -> Trigger {
        Trigger::new(config.endless())
    }

    #[test]
    fn test_every_kind_is_supported() {
        let factory = TriggerFactory::new();
        for kind in TriggerType::ALL {
            assert!(factory.supports(*kind), "{kind} missing");
        }
    }

    #[test]
    fn test_create_from_json() {
        let factory = TriggerFactory::new();
        let trigger = factory
            .create_from_json(r#"{"type":"time","interval":2,"intervalUnit":"s"}"#)
            .expect("valid config");
        assert_eq!(trigger.kind(), TriggerType::Time);
        assert_eq!(trigger.config().interval(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_create_rejects_bad_config() {
        let factory = TriggerFactory::new();
        let err = factory
            .create_from_json(r#"{"type":"sometimes"}"#)
            .expect_err("unknown type");
        assert_eq!(err.as_label(), "config_unknown_type");
    }

    #[test]
    fn test_registered_ctor_wins() {
        let mut factory = TriggerFactory::new();
        let previous = factory.register(TriggerType::Continuous, endless_ctor);
        assert!(previous.is_some());
        let trigger = factory.create(TriggerConfig::continuous());
        assert!(trigger.config().is_endless());
    }
}
