//! Resolved visual timeline.
//!
//! A [`Timeline`] is produced by the transition planner and replaced (never
//! mutated) by the audio synchronizer. Consecutive assets share an overlap
//! window: `fade_out_overlap` of asset `i` equals `fade_in_overlap` of
//! asset `i + 1`, and `start[i + 1] == end[i] - overlap`.

use serde::{Deserialize, Serialize};
use stove_common::timecode::approx_eq;

use crate::asset::MediaAsset;

/// A media asset placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedAsset {
    pub asset: MediaAsset,

    /// Loop iteration this placement belongs to (0 unless the visual cycle repeats).
    #[serde(default)]
    pub cycle: usize,

    /// Resolved on-screen duration (may differ from the provisional one).
    pub duration: f64,

    pub start: f64,
    pub end: f64,

    /// Overlap shared with the previous asset.
    pub fade_in_overlap: f64,

    /// Overlap shared with the next asset.
    pub fade_out_overlap: f64,
}

/// One crossfade window between two consecutive placements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapWindow {
    /// Position of the outgoing placement in the timeline.
    pub from: usize,
    /// Position of the incoming placement in the timeline.
    pub to: usize,
    pub start: f64,
    pub end: f64,
}

impl OverlapWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Ordered placements plus the track totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub assets: Vec<TimedAsset>,

    /// `end` of the last placement.
    pub total_visual_duration: f64,

    /// Set once the audio synchronizer has run.
    #[serde(default)]
    pub total_audio_duration: Option<f64>,
}

impl Timeline {
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Per-placement durations in timeline order.
    pub fn durations(&self) -> Vec<f64> {
        self.assets.iter().map(|a| a.duration).collect()
    }

    /// Per-boundary overlaps (`len() - 1` entries).
    pub fn boundary_overlaps(&self) -> Vec<f64> {
        self.assets
            .iter()
            .take(self.assets.len().saturating_sub(1))
            .map(|a| a.fade_out_overlap)
            .collect()
    }

    /// Non-empty overlap windows in timeline order.
    pub fn overlap_windows(&self) -> Vec<OverlapWindow> {
        self.assets
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[0].fade_out_overlap > 0.0)
            .map(|(i, pair)| OverlapWindow {
                from: i,
                to: i + 1,
                start: pair[1].start,
                end: pair[0].end,
            })
            .collect()
    }

    /// Verify ordering and overlap invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        let Some(first) = self.assets.first() else {
            return Err("timeline has no assets".to_string());
        };
        if first.start != 0.0 || first.fade_in_overlap != 0.0 {
            return Err("first asset must start at 0 without fade-in overlap".to_string());
        }

        for (i, asset) in self.assets.iter().enumerate() {
            if asset.duration.is_nan() || asset.duration <= 0.0 {
                return Err(format!("asset {i} has non-positive duration"));
            }
            if !approx_eq(asset.end, asset.start + asset.duration) {
                return Err(format!("asset {i} end does not equal start + duration"));
            }
        }

        for (i, pair) in self.assets.windows(2).enumerate() {
            let (a, b) = (&pair[0], &pair[1]);
            if a.fade_out_overlap != b.fade_in_overlap {
                return Err(format!("overlap mismatch at boundary {i}"));
            }
            if !approx_eq(b.start, a.end - a.fade_out_overlap) {
                return Err(format!("asset {} does not start at its overlap", i + 1));
            }
            if b.start < a.start || b.end < a.end {
                return Err(format!("assets {i} and {} are out of order", i + 1));
            }
        }

        let last = &self.assets[self.assets.len() - 1];
        if last.fade_out_overlap != 0.0 {
            return Err("last asset must not have a fade-out overlap".to_string());
        }
        if !approx_eq(last.end, self.total_visual_duration) {
            return Err("total visual duration does not match last end".to_string());
        }
        Ok(())
    }
}
