//! VideoStove Project Model
//!
//! Defines the data contracts shared by every pipeline stage:
//! - **Config:** Immutable per-project render configuration
//! - **Assets:** Input files, classified media assets, and audio tracks
//! - **Timeline:** Timed placements, overlap windows, and audio reconciliation
//! - **Plan:** Render operations, encode parameters, and pipeline warnings
//!
//! All times are seconds as `f64` on the final output clock unless a type
//! says otherwise.

pub mod asset;
pub mod audio;
pub mod caption;
pub mod config;
pub mod hardware;
pub mod plan;
pub mod timeline;
pub mod warning;

pub use asset::*;
pub use audio::*;
pub use caption::*;
pub use config::*;
pub use hardware::*;
pub use plan::*;
pub use timeline::*;
pub use warning::*;
