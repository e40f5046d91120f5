//! Utilities shared by the Atelier relay binaries and tests.

pub mod logger;
pub mod time;
