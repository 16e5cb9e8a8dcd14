//! VideoStove Common Utilities
//!
//! Shared infrastructure for all VideoStove crates:
//! - Error types and result aliases
//! - Timecode math and subtitle timestamp formatting
//! - Tracing/logging initialization
//! - Application configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod timecode;

pub use config::*;
pub use error::*;
pub use timecode::*;
