//! Per-project render configuration.
//!
//! A [`ProjectConfig`] is an immutable snapshot handed to every pipeline
//! stage. Nothing in the engine reads ambient settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use stove_common::error::{StoveError, StoveResult};

use crate::hardware::BackendPreference;

/// Complete configuration for rendering one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Display duration assigned to still images (seconds).
    pub image_duration: f64,

    /// Whether consecutive assets blend through a crossfade.
    pub use_crossfade: bool,

    /// Requested crossfade length (seconds).
    pub crossfade_duration: f64,

    /// How mismatched audio and visual lengths are reconciled.
    pub audio_sync_policy: AudioSyncPolicy,

    /// Whether a hardware encoder should be used when available.
    pub use_gpu: bool,

    /// Which hardware encoder to prefer.
    pub backend: BackendPreference,

    /// Encoder and output format parameters.
    pub encode: EncodeSettings,

    /// Narration/background mix parameters.
    pub audio: AudioMixSettings,

    /// Caption alignment and styling.
    pub captions: CaptionConfig,

    /// Fade from black at the start of the video.
    pub fade_in: bool,

    /// Fade to black at the end of the video.
    pub fade_out: bool,

    /// Length of the edge fades (seconds).
    pub fade_duration: f64,

    /// Motion applied to still images.
    pub motion: MotionStyle,

    /// How assets are normalized to the output frame.
    pub fit: FitMode,

    /// Optional overlay clip composited over the whole video.
    pub overlay: Option<OverlaySettings>,

    /// Whether video files take part in the project at all.
    pub include_videos: bool,

    /// Play every video before the first image, keeping relative order.
    pub videos_as_intro: bool,
}

/// Audio/visual reconciliation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioSyncPolicy {
    /// Stretch asset durations so the visual track matches the audio.
    #[default]
    MatchAudio,
    /// Trim or loop audio to fit the visual track.
    MatchVisual,
    /// Keep both; the output lasts as long as the longer one.
    Independent,
    /// Repeat the image cycle after the intro videos until the audio is covered.
    LoopVisual,
}

/// Output video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    H265,
}

/// Encoder and output format settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeSettings {
    pub codec: VideoCodec,

    /// Constant rate factor for software encodes.
    pub crf: u8,

    /// Speed preset in x264 terms. Passed verbatim to libx264/libx265, NVENC
    /// and QuickSync, so the value must be one that encoder accepts. AMF maps
    /// it onto `speed`, `balanced` or `quality`.
    pub preset: String,

    /// Explicit video bitrate; overrides CRF on every backend.
    pub bitrate_kbps: Option<u32>,

    /// Bitrate used by hardware encoders when no explicit bitrate is set.
    pub gpu_bitrate_kbps: u32,

    /// Output resolution.
    pub width: u32,
    pub height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// AAC bitrate for the mixed audio.
    pub audio_bitrate_kbps: u32,
}

/// Narration and background mix settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioMixSettings {
    /// Gain applied to the narration track.
    pub narration_volume: f64,

    /// Gain applied to the background track.
    pub background_volume: f64,

    /// Whether a background track is mixed in when present.
    pub use_background: bool,

    /// Background attenuation while narration plays, in `[0.0, 1.0]`.
    /// `None` disables ducking.
    pub ducking_ratio: Option<f64>,
}

/// Caption alignment and styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    pub enabled: bool,

    /// How transcription segments are cut into captions.
    pub mode: CaptionMode,

    /// Maximum characters in one caption. `None` applies no limit.
    pub max_chars: Option<usize>,

    /// Maximum on-screen duration of one caption. `None` applies no limit.
    pub max_duration_secs: Option<f64>,

    /// Minimum gap kept between consecutive captions.
    pub min_gap_secs: f64,

    pub style: CaptionStyle,
}

/// Caption layout mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CaptionMode {
    /// Phrase captions, merged and split to fit the limits.
    #[default]
    Lines,
    /// One upper-cased word at a time.
    SingleWords,
    /// Fixed-size groups of words.
    WordChunks { words: usize },
    /// The line builds up one word at a time.
    Typewriter,
}

/// Burned-in caption appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionStyle {
    pub font_family: String,
    pub font_size: u32,
    pub bold: bool,
    /// Hex color (e.g. `#FFFFFF`).
    pub text_color: String,
    pub outline_color: String,
    pub outline_width: u32,
    pub vertical: VerticalAlign,
    pub horizontal: HorizontalAlign,
    pub margin_vertical: u32,
    pub margin_horizontal: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlign {
    Top,
    Center,
    #[default]
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Motion applied to still images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MotionStyle {
    /// Zoom in on the first image, zoom out on the last, pan in between.
    #[default]
    Sequential,
    ZoomIn,
    ZoomOut,
    Pan,
    Static,
}

/// Normalization of assets to the output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Scale to fit inside the frame and pad the remainder.
    #[default]
    Pad,
    /// Scale to cover the frame and crop the overflow.
    Crop,
}

/// Overlay clip settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySettings {
    pub path: PathBuf,

    /// Opacity in `[0.0, 1.0]`.
    #[serde(default = "default_overlay_opacity")]
    pub opacity: f64,

    #[serde(default)]
    pub blend: OverlayBlend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverlayBlend {
    #[default]
    Simple,
    Screen,
}

fn default_overlay_opacity() -> f64 {
    0.5
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            image_duration: 8.0,
            use_crossfade: true,
            crossfade_duration: 0.6,
            audio_sync_policy: AudioSyncPolicy::default(),
            use_gpu: true,
            backend: BackendPreference::default(),
            encode: EncodeSettings::default(),
            audio: AudioMixSettings::default(),
            captions: CaptionConfig::default(),
            fade_in: true,
            fade_out: true,
            fade_duration: 0.5,
            motion: MotionStyle::default(),
            fit: FitMode::default(),
            overlay: None,
            include_videos: true,
            videos_as_intro: false,
        }
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            codec: VideoCodec::H264,
            crf: 22,
            preset: "fast".to_string(),
            bitrate_kbps: None,
            gpu_bitrate_kbps: 8000,
            width: 1920,
            height: 1080,
            fps: 25,
            audio_bitrate_kbps: 192,
        }
    }
}

impl Default for AudioMixSettings {
    fn default() -> Self {
        Self {
            narration_volume: 1.0,
            background_volume: 0.15,
            use_background: true,
            ducking_ratio: None,
        }
    }
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: CaptionMode::default(),
            max_chars: None,
            max_duration_secs: None,
            min_gap_secs: 0.1,
            style: CaptionStyle::default(),
        }
    }
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 24,
            bold: true,
            text_color: "#FFFFFF".to_string(),
            outline_color: "#000000".to_string(),
            outline_width: 2,
            vertical: VerticalAlign::Bottom,
            horizontal: HorizontalAlign::Center,
            margin_vertical: 25,
            margin_horizontal: 20,
        }
    }
}

impl ProjectConfig {
    /// Reject values no stage can work with.
    ///
    /// A crossfade at least as long as an asset is not an error here; the
    /// transition planner clamps it and records a warning.
    pub fn validate(&self) -> StoveResult<()> {
        check_positive("image_duration", self.image_duration)?;
        check_non_negative("crossfade_duration", self.crossfade_duration)?;
        check_non_negative("fade_duration", self.fade_duration)?;

        if self.encode.crf > 51 {
            return Err(StoveError::invalid_config(format!(
                "crf must be within 0..=51, got {}",
                self.encode.crf
            )));
        }
        if self.encode.preset.trim().is_empty() {
            return Err(StoveError::invalid_config("preset must not be empty"));
        }
        if self.encode.width == 0 || self.encode.height == 0 {
            return Err(StoveError::invalid_config(
                "output resolution must be non-zero",
            ));
        }
        if self.encode.width % 2 != 0 || self.encode.height % 2 != 0 {
            return Err(StoveError::invalid_config(format!(
                "output resolution must be even for yuv420p, got {}x{}",
                self.encode.width, self.encode.height
            )));
        }
        if self.encode.fps == 0 {
            return Err(StoveError::invalid_config("fps must be non-zero"));
        }
        if self.encode.bitrate_kbps == Some(0) || self.encode.gpu_bitrate_kbps == 0 {
            return Err(StoveError::invalid_config("bitrate must be non-zero"));
        }

        check_non_negative("narration_volume", self.audio.narration_volume)?;
        check_non_negative("background_volume", self.audio.background_volume)?;
        if let Some(ratio) = self.audio.ducking_ratio {
            check_unit_interval("ducking_ratio", ratio)?;
        }

        if self.captions.max_chars == Some(0) {
            return Err(StoveError::invalid_config("captions.max_chars must be > 0"));
        }
        if let Some(max) = self.captions.max_duration_secs {
            check_positive("captions.max_duration_secs", max)?;
        }
        check_non_negative("captions.min_gap_secs", self.captions.min_gap_secs)?;
        if let CaptionMode::WordChunks { words: 0 } = self.captions.mode {
            return Err(StoveError::invalid_config(
                "captions.mode.words must be > 0",
            ));
        }

        if let Some(overlay) = &self.overlay {
            check_unit_interval("overlay.opacity", overlay.opacity)?;
        }

        Ok(())
    }
}

fn check_positive(name: &str, value: f64) -> StoveResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(StoveError::invalid_config(format!(
            "{name} must be a positive number of seconds, got {value}"
        )))
    }
}

fn check_non_negative(name: &str, value: f64) -> StoveResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(StoveError::invalid_config(format!(
            "{name} must be >= 0, got {value}"
        )))
    }
}

fn check_unit_interval(name: &str, value: f64) -> StoveResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(StoveError::invalid_config(format!(
            "{name} must be within [0.0, 1.0], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ProjectConfig::default();
        config.validate().unwrap();
        assert!((config.image_duration - 8.0).abs() < 1e-12);
        assert_eq!(config.encode.crf, 22);
        assert_eq!(config.captions.max_chars, None);
        assert_eq!(config.audio.ducking_ratio, None);
    }

    #[test]
    fn test_long_crossfade_is_not_rejected() {
        let config = ProjectConfig {
            image_duration: 2.0,
            crossfade_duration: 3.0,
            ..ProjectConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_image_duration() {
        let config = ProjectConfig {
            image_duration: 0.0,
            ..ProjectConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("image_duration"));
    }

    #[test]
    fn test_rejects_odd_resolution() {
        let mut config = ProjectConfig::default();
        config.encode.width = 1921;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_ducking() {
        let mut config = ProjectConfig::default();
        config.audio.ducking_ratio = Some(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ProjectConfig = serde_json::from_str(
            r#"{
                "image_duration": 5.0,
                "audio_sync_policy": "match_visual",
                "captions": { "enabled": true, "max_chars": 42, "mode": { "kind": "word_chunks", "words": 2 } }
            }"#,
        )
        .unwrap();
        assert!((config.image_duration - 5.0).abs() < 1e-12);
        assert_eq!(config.audio_sync_policy, AudioSyncPolicy::MatchVisual);
        assert_eq!(config.captions.max_chars, Some(42));
        assert_eq!(config.captions.mode, CaptionMode::WordChunks { words: 2 });
        assert!(config.use_crossfade);
        assert_eq!(config.encode.preset, "fast");
    }

    #[test]
    fn test_overlay_opacity_defaults() {
        let overlay: OverlaySettings =
            serde_json::from_str(r#"{ "path": "fx/particles.mp4" }"#).unwrap();
        assert!((overlay.opacity - 0.5).abs() < 1e-12);
        assert_eq!(overlay.blend, OverlayBlend::Simple);
    }
}
