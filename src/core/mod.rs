//! Core infrastructure
//!
//! Logging macros and the cooperative scheduler adapter shared by the
//! driver and the presentation loop.

pub mod logging;
pub mod scheduler;
