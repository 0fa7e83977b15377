//! Citizen services portal core.
//!
//! Applications move through a fixed lifecycle; signing a birth, marriage, or temporary
//! residence application derives the matching civil-registry record.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
