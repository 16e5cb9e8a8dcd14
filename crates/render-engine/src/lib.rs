//! VideoStove Render Engine
//!
//! Builds render plans from reconciled timelines and executes them.
//!
//! # Pipeline Architecture
//!
//! ```text
//! ReconciledTimeline ──┐
//! captions ────────────┼── build_render_plan ── RenderPlan ── PlanExecutor
//! ProjectConfig ───────┤         │                               │
//! HardwareCapabilities ┘   select_backend                ffmpeg / dry run
//! ```
//!
//! Plan building is pure. Probing the host ([`probe`]) and running ffmpeg
//! ([`executor`]) are the only parts that touch the system.

pub mod backend;
pub mod builder;
pub mod executor;
pub mod ffmpeg;
pub mod probe;

pub use backend::{rate_control, select_backend, BackendSelection};
pub use builder::{build_render_plan, motion_for};
pub use executor::*;
pub use ffmpeg::{build_command, FfmpegCommand};
pub use probe::{command_exists, detect_capabilities, probe_duration};
