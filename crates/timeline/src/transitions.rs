//! Transition planning: the overlap math that places assets on the timeline.
//!
//! # Algorithm
//!
//! 1. Each boundary gets the configured crossfade, or none when crossfades
//!    are off or zero-length.
//! 2. A crossfade at least as long as either neighbour is **clamped** to half
//!    the shorter neighbour and a warning is recorded.
//! 3. A running cursor lays the assets out: `start[i+1] = end[i] - overlap[i]`.

use stove_common::error::{StoveError, StoveResult};
use stove_project_model::asset::MediaAsset;
use stove_project_model::config::ProjectConfig;
use stove_project_model::timeline::{TimedAsset, Timeline};
use stove_project_model::warning::PipelineWarning;

/// One asset waiting to be placed.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub asset: MediaAsset,
    pub cycle: usize,
    pub duration: f64,
}

impl Slot {
    pub fn new(asset: MediaAsset) -> Self {
        let duration = asset.duration_secs;
        Self {
            asset,
            cycle: 0,
            duration,
        }
    }
}

/// A planned timeline plus the clamping it required.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub timeline: Timeline,
    pub warnings: Vec<PipelineWarning>,
}

/// Effective overlap for one boundary.
///
/// Returns the overlap and whether the requested crossfade was clamped.
pub fn boundary_overlap(outgoing: f64, incoming: f64, config: &ProjectConfig) -> (f64, bool) {
    let requested = config.crossfade_duration;
    if !config.use_crossfade || requested <= 0.0 {
        return (0.0, false);
    }

    let shorter = outgoing.min(incoming);
    if requested >= shorter {
        (0.5 * shorter, true)
    } else {
        (requested, false)
    }
}

/// Per-boundary overlaps for consecutive durations.
pub fn boundary_overlaps(durations: &[f64], config: &ProjectConfig) -> (Vec<f64>, Vec<PipelineWarning>) {
    let mut overlaps = Vec::with_capacity(durations.len().saturating_sub(1));
    let mut warnings = Vec::new();

    for (boundary, pair) in durations.windows(2).enumerate() {
        let (overlap, clamped) = boundary_overlap(pair[0], pair[1], config);
        if clamped {
            warnings.push(clamp_warning(boundary, config.crossfade_duration, overlap));
        }
        overlaps.push(overlap);
    }

    (overlaps, warnings)
}

/// Build the warning for a clamped boundary and log it.
pub fn clamp_warning(boundary: usize, requested_secs: f64, effective_secs: f64) -> PipelineWarning {
    let warning = PipelineWarning::ClampedTransition {
        boundary,
        requested_secs,
        effective_secs,
    };
    tracing::warn!(boundary, requested_secs, effective_secs, "{warning}");
    warning
}

/// Lay slots out with explicit per-boundary overlaps.
///
/// `overlaps` has one entry per boundary; missing entries count as zero.
pub fn layout_with_overlaps(slots: Vec<Slot>, overlaps: &[f64]) -> Timeline {
    let count = slots.len();
    debug_assert!(overlaps.len() + 1 >= count);

    let mut assets = Vec::with_capacity(count);
    let mut cursor = 0.0;
    let mut fade_in = 0.0;

    for (i, slot) in slots.into_iter().enumerate() {
        let fade_out = if i + 1 < count {
            overlaps.get(i).copied().unwrap_or(0.0)
        } else {
            0.0
        };
        let start = cursor;
        let end = start + slot.duration;

        tracing::debug!(
            position = i,
            index = slot.asset.index,
            cycle = slot.cycle,
            start,
            end,
            fade_out,
            "Placed asset"
        );

        assets.push(TimedAsset {
            asset: slot.asset,
            cycle: slot.cycle,
            duration: slot.duration,
            start,
            end,
            fade_in_overlap: fade_in,
            fade_out_overlap: fade_out,
        });

        cursor = end - fade_out;
        fade_in = fade_out;
    }

    let total_visual_duration = assets.last().map(|a| a.end).unwrap_or(0.0);
    Timeline {
        assets,
        total_visual_duration,
        total_audio_duration: None,
    }
}

/// Place resolved assets on the timeline.
pub fn plan_transitions(assets: &[MediaAsset], config: &ProjectConfig) -> StoveResult<TransitionPlan> {
    if assets.is_empty() {
        return Err(StoveError::EmptyProject);
    }

    let slots: Vec<Slot> = assets.iter().cloned().map(Slot::new).collect();
    let durations: Vec<f64> = slots.iter().map(|s| s.duration).collect();
    let (overlaps, warnings) = boundary_overlaps(&durations, config);
    let timeline = layout_with_overlaps(slots, &overlaps);

    tracing::info!(
        assets = timeline.len(),
        transitions = timeline.overlap_windows().len(),
        clamped = warnings.len(),
        total_visual_secs = timeline.total_visual_duration,
        "Planned transitions"
    );

    Ok(TransitionPlan { timeline, warnings })
}
