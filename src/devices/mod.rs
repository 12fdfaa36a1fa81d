//! Device drivers
//!
//! Drivers are written against the platform traits only.
//!
//! ## Modules
//!
//! - `anx7625`: ANX7625 MIPI-DSI to DisplayPort bridge

pub mod anx7625;
