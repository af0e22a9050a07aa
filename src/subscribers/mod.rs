//! # Event subscribers.
//!
//! ```text
//!   Trigger/Machine ── publish(Event) ──► Bus ──► listener (machine actor)
//!                                                     │
//!                                                     ▼
//!                                               SubscriberSet
//!                                             ┌───────┼────────┐
//!                                             ▼       ▼        ▼
//!                                         LogWriter  Metrics  Custom
//! ```
//!
//! - [`Subscribe`]: the extension trait.
//! - [`SubscriberSet`]: bounded per-subscriber queues, panic isolation.
//! - `LogWriter` (feature `logging`): renders events through `tracing`.

#[cfg(feature = "logging")]
mod embedded;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
