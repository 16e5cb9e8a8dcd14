//! Render plans: the ordered operation list handed to an executor.
//!
//! A [`RenderPlan`] is fully self-describing. Executors never consult the
//! project configuration; everything they need is on the plan.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::asset::MediaKind;
use crate::audio::{AudioRole, TrackFit};
use crate::config::{CaptionStyle, FitMode, OverlayBlend, VideoCodec};
use crate::hardware::EncodeBackend;
use crate::warning::PipelineWarning;

/// Camera motion applied to a still image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Motion {
    ZoomIn,
    ZoomOut,
    PanRight,
    PanLeft,
    PanDown,
    PanUp,
}

impl Motion {
    /// Rotation used for middle images of a sequential slideshow.
    pub const PAN_ROTATION: [Motion; 4] = [
        Motion::PanRight,
        Motion::PanLeft,
        Motion::PanDown,
        Motion::PanUp,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeDirection {
    In,
    Out,
}

/// Video rate control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum RateControl {
    /// Constant rate factor (software encoders).
    Crf(u8),
    /// Target bitrate in kbit/s.
    Bitrate(u32),
}

/// One input of the final audio mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixInput {
    pub role: AudioRole,
    pub path: PathBuf,
    pub volume: f64,
    pub fit: TrackFit,
}

/// Terminal encode parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeParameters {
    pub backend: EncodeBackend,

    /// ffmpeg encoder name (e.g. `libx264`, `h264_nvenc`).
    pub encoder: String,

    pub codec: VideoCodec,
    pub rate_control: RateControl,

    /// Passed to the encoder verbatim.
    pub preset: String,

    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration_secs: f64,
    pub total_frames: u64,
    pub audio_codec: String,
    pub audio_bitrate_kbps: u32,
}

/// A single step of the render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum RenderOperation {
    /// Normalize one timeline placement to the output frame.
    Scale {
        /// Position of the placement in the timeline.
        position: usize,
        source: PathBuf,
        kind: MediaKind,
        start: f64,
        duration: f64,
        width: u32,
        height: u32,
        fit: FitMode,
        /// Source playback speed (1.0 unless a video was stretched).
        playback_rate: f64,
        /// Source is cut after this many seconds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trim_secs: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        motion: Option<Motion>,
    },

    /// Blend two consecutive placements over their overlap window.
    Crossfade {
        from: usize,
        to: usize,
        start: f64,
        duration: f64,
    },

    /// Black frames appended after the last placement.
    PadTail { start: f64, duration: f64 },

    /// Fade from or to black at an edge of the video.
    Fade {
        direction: FadeDirection,
        start: f64,
        duration: f64,
    },

    /// Overlay clip composited over the whole video.
    Overlay {
        source: PathBuf,
        opacity: f64,
        blend: OverlayBlend,
        duration: f64,
    },

    /// One burned-in caption.
    CaptionOverlay {
        index: usize,
        start: f64,
        end: f64,
        text: String,
    },

    /// Mix the fitted audio tracks.
    AudioMix {
        inputs: Vec<MixInput>,
        duration: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ducking_ratio: Option<f64>,
    },

    Encode(EncodeParameters),
}

impl RenderOperation {
    pub fn name(&self) -> &'static str {
        match self {
            RenderOperation::Scale { .. } => "scale",
            RenderOperation::Crossfade { .. } => "crossfade",
            RenderOperation::PadTail { .. } => "pad_tail",
            RenderOperation::Fade { .. } => "fade",
            RenderOperation::Overlay { .. } => "overlay",
            RenderOperation::CaptionOverlay { .. } => "caption_overlay",
            RenderOperation::AudioMix { .. } => "audio_mix",
            RenderOperation::Encode(_) => "encode",
        }
    }
}

/// Ordered operations plus everything the executor needs to run them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    pub operations: Vec<RenderOperation>,
    pub backend: EncodeBackend,
    pub duration_secs: f64,
    pub total_frames: u64,

    /// Style shared by every `CaptionOverlay`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_style: Option<CaptionStyle>,

    #[serde(default)]
    pub warnings: Vec<PipelineWarning>,
}

impl RenderPlan {
    /// Parameters of the terminal `Encode` operation.
    pub fn encode(&self) -> Option<&EncodeParameters> {
        match self.operations.last() {
            Some(RenderOperation::Encode(params)) => Some(params),
            _ => None,
        }
    }

    pub fn operations_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a RenderOperation> + 'a {
        self.operations.iter().filter(move |op| op.name() == name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_op() -> RenderOperation {
        RenderOperation::Encode(EncodeParameters {
            backend: EncodeBackend::Cpu,
            encoder: "libx264".to_string(),
            codec: VideoCodec::H264,
            rate_control: RateControl::Crf(22),
            preset: "fast".to_string(),
            width: 1920,
            height: 1080,
            fps: 25,
            duration_secs: 10.0,
            total_frames: 250,
            audio_codec: "aac".to_string(),
            audio_bitrate_kbps: 192,
        })
    }

    #[test]
    fn test_encode_is_terminal() {
        let plan = RenderPlan {
            operations: vec![
                RenderOperation::PadTail {
                    start: 8.0,
                    duration: 2.0,
                },
                encode_op(),
            ],
            backend: EncodeBackend::Cpu,
            duration_secs: 10.0,
            total_frames: 250,
            caption_style: None,
            warnings: Vec::new(),
        };
        assert_eq!(plan.encode().unwrap().encoder, "libx264");
        assert_eq!(plan.operations_named("pad_tail").count(), 1);
    }

    #[test]
    fn test_operation_json_shape() {
        let json = serde_json::to_value(encode_op()).unwrap();
        assert_eq!(json["op"], "encode");
        assert_eq!(json["rate_control"]["mode"], "crf");
        assert_eq!(json["rate_control"]["value"], 22);

        let fade = RenderOperation::Fade {
            direction: FadeDirection::Out,
            start: 9.5,
            duration: 0.5,
        };
        let json = serde_json::to_value(&fade).unwrap();
        assert_eq!(json["op"], "fade");
        assert_eq!(json["direction"], "out");
    }

    #[test]
    fn test_plan_round_trips_through_json() {
        let plan = RenderPlan {
            operations: vec![encode_op()],
            backend: EncodeBackend::Cpu,
            duration_secs: 10.0,
            total_frames: 250,
            caption_style: Some(CaptionStyle::default()),
            warnings: vec![],
        };
        let json = plan.to_json().unwrap();
        let back: RenderPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}
