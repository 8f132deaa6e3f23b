//! Foundation module - shared utilities
//!
//! - Math types and matrix helpers
//! - Time measurement
//! - Logging setup

pub mod math;
pub mod time;
pub mod logging;
