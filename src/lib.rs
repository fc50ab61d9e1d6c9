//! splitlog - severity-split, hourly-rotated file logging and pid file lifecycle
//!
//! This library provides the logging pipeline and the process marker file used by
//! long-running services.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
