//! Scheduler events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Machine` (state changes, deferred task panics), `Trigger`
//!   (lifecycle, steps, repeat-until, messages, execute), `SubscriberSet`
//!   workers (overflow/panic).
//! - **Consumers**: the machine actor's listener, which fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
