//! VideoStove Timeline
//!
//! The first three pipeline stages:
//! - **Resolver:** Classify input files and assign provisional durations
//! - **Transitions:** Place assets on the timeline with crossfade overlaps
//! - **Audio Sync:** Reconcile the visual track with narration and music
//!
//! This crate is pure computation. All inputs are data; all outputs are data.

pub mod audio_sync;
pub mod resolver;
pub mod transitions;

pub use audio_sync::synchronize;
pub use resolver::resolve_assets;
pub use transitions::{layout_with_overlaps, plan_transitions, TransitionPlan};
