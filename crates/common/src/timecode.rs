//! Timecode utilities shared by the timeline, caption, and plan stages.
//!
//! Every stage works in seconds (`f64`). This module provides:
//! - Tolerant comparison for accumulated floating point timing
//! - Conversion from seconds to whole frames
//! - Subtitle timestamp formatting (SRT, WebVTT, ASS)
//! - Drift measurement between two track durations

/// Tolerance used when comparing accumulated timestamps.
pub const TIME_EPSILON: f64 = 1e-9;

/// Whether two timestamps are equal within [`TIME_EPSILON`] (scaled by magnitude).
pub fn approx_eq(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= TIME_EPSILON * scale
}

/// Number of whole frames covering `secs` at `fps`, rounded to the nearest frame.
pub fn secs_to_frames(secs: f64, fps: u32) -> u64 {
    if secs <= 0.0 || fps == 0 {
        return 0;
    }
    (secs * fps as f64).round() as u64
}

/// Format seconds with microsecond precision for encoder arguments.
pub fn format_secs(secs: f64) -> String {
    format!("{:.6}", secs.max(0.0))
}

/// Split seconds into (hours, minutes, seconds, milliseconds), rounding to the nearest ms.
fn split_millis(secs: f64) -> (u64, u64, u64, u64) {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    (
        total_ms / 3_600_000,
        (total_ms % 3_600_000) / 60_000,
        (total_ms % 60_000) / 1000,
        total_ms % 1000,
    )
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
pub fn format_srt_time(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_millis(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Format seconds as VTT timestamp: HH:MM:SS.mmm
pub fn format_vtt_time(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_millis(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Format seconds as ASS timestamp: H:MM:SS.cc
pub fn format_ass_time(secs: f64) -> String {
    let total_cs = (secs.max(0.0) * 100.0).round() as u64;
    let hours = total_cs / 360_000;
    let minutes = (total_cs % 360_000) / 6000;
    let seconds = (total_cs % 6000) / 100;
    let centis = total_cs % 100;
    format!("{hours}:{minutes:02}:{seconds:02}.{centis:02}")
}

/// Drift between a reference duration and a measured one.
#[derive(Debug, Clone, Copy)]
pub struct DurationDrift {
    /// Reference duration in seconds (usually audio).
    pub reference_secs: f64,
    /// Measured duration in seconds (usually the visual track).
    pub measured_secs: f64,
}

impl DurationDrift {
    /// Drift in seconds (positive = measured is longer).
    pub fn drift_secs(&self) -> f64 {
        self.measured_secs - self.reference_secs
    }

    /// Drift in milliseconds.
    pub fn drift_ms(&self) -> f64 {
        self.drift_secs() * 1000.0
    }

    /// Ratio that maps the measured duration onto the reference one.
    pub fn scale_to_reference(&self) -> f64 {
        if self.measured_secs <= 0.0 {
            return 1.0;
        }
        self.reference_secs / self.measured_secs
    }

    /// Whether the two durations already agree.
    pub fn is_aligned(&self) -> bool {
        approx_eq(self.reference_secs, self.measured_secs)
    }
}
