//! Schema module - Configuration types for sequence frame playback.

mod config;

pub use config::*;
