//! # Built-in subscribers
//!
//! - [`LogWriter`]: renders every event through `tracing`.

mod log;

pub use log::LogWriter;
