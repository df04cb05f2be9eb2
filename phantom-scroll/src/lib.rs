//! Phantom scroll diagnosis for Windows
//!
//! This crate hooks low-level mouse input, classifies every wheel event against
//! recent button activity and writes a CSV log of the session. A wheel event that
//! lands within a few milliseconds of a click ("near-click"), especially while the
//! player is clicking rapidly ("combat"), is the signature of a faulty wheel
//! encoder or driver firing phantom scrolls.

pub mod classifier;
pub mod error;
pub mod events;
pub mod session_log;
pub mod recorder;
pub mod settings;

pub use classifier::*;
pub use error::*;
pub use events::*;
pub use session_log::{format_elapsed, next_log_path, LogOutcome, LogRow, SessionLog, CSV_HEADER};
pub use recorder::*;
pub use settings::Settings;

#[cfg(test)]
mod tests;
