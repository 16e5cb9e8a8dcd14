//! Render plan construction.
//!
//! Turns a reconciled timeline, its aligned captions, and the project
//! configuration into an ordered list of [`RenderOperation`]s:
//!
//! ```text
//! Scale* ─► Crossfade* ─► PadTail? ─► Fade* ─► Overlay? ─► CaptionOverlay* ─► AudioMix? ─► Encode
//! ```
//!
//! The builder is a pure function. Hardware detection happens before it is
//! called and its result is passed in as [`HardwareCapabilities`].

use stove_common::timecode::{approx_eq, secs_to_frames, TIME_EPSILON};
use stove_project_model::asset::MediaKind;
use stove_project_model::audio::{AudioRole, ReconciledTimeline};
use stove_project_model::caption::CaptionSegment;
use stove_project_model::config::{AudioSyncPolicy, MotionStyle, ProjectConfig};
use stove_project_model::hardware::HardwareCapabilities;
use stove_project_model::plan::{
    EncodeParameters, FadeDirection, MixInput, Motion, RenderOperation, RenderPlan,
};
use stove_project_model::timeline::TimedAsset;

use crate::backend::{rate_control, select_backend};

/// Audio codec used for every output.
pub const AUDIO_CODEC: &str = "aac";

/// Build the render plan for one project.
pub fn build_render_plan(
    reconciled: &ReconciledTimeline,
    captions: Option<&[CaptionSegment]>,
    config: &ProjectConfig,
    capabilities: &HardwareCapabilities,
) -> RenderPlan {
    let timeline = &reconciled.timeline;
    let reconciliation = &reconciled.reconciliation;
    let final_duration = reconciled.final_duration();
    let encode = &config.encode;

    let selection = select_backend(config, capabilities);
    let mut warnings = reconciliation.warnings.clone();
    warnings.extend(selection.warning);

    let mut operations = Vec::new();

    // Scale
    let image_count = timeline
        .assets
        .iter()
        .filter(|a| !a.asset.kind.is_video())
        .count();
    let mut image_ordinal = 0;
    for (position, placed) in timeline.assets.iter().enumerate() {
        let motion = match placed.asset.kind {
            MediaKind::Image => {
                let motion = motion_for(config.motion, image_ordinal, image_count);
                image_ordinal += 1;
                motion
            }
            MediaKind::Video { .. } => None,
        };
        let (playback_rate, trim_secs) = video_timing(placed, reconciliation.policy);

        operations.push(RenderOperation::Scale {
            position,
            source: placed.asset.path.clone(),
            kind: placed.asset.kind,
            start: placed.start,
            duration: placed.duration,
            width: encode.width,
            height: encode.height,
            fit: config.fit,
            playback_rate,
            trim_secs,
            motion,
        });
    }

    // Crossfade
    for window in timeline.overlap_windows() {
        operations.push(RenderOperation::Crossfade {
            from: window.from,
            to: window.to,
            start: window.start,
            duration: window.duration(),
        });
    }

    // PadTail
    if reconciliation.visual_padding_secs > TIME_EPSILON {
        operations.push(RenderOperation::PadTail {
            start: timeline.total_visual_duration,
            duration: reconciliation.visual_padding_secs,
        });
    }

    // Fade
    let fade = config.fade_duration.min(final_duration / 2.0);
    if fade > TIME_EPSILON {
        if config.fade_in {
            operations.push(RenderOperation::Fade {
                direction: FadeDirection::In,
                start: 0.0,
                duration: fade,
            });
        }
        if config.fade_out {
            operations.push(RenderOperation::Fade {
                direction: FadeDirection::Out,
                start: final_duration - fade,
                duration: fade,
            });
        }
    }

    // Overlay
    if let Some(overlay) = &config.overlay {
        operations.push(RenderOperation::Overlay {
            source: overlay.path.clone(),
            opacity: overlay.opacity,
            blend: overlay.blend,
            duration: final_duration,
        });
    }

    // CaptionOverlay
    let mut caption_style = None;
    if let (true, Some(captions)) = (config.captions.enabled, captions) {
        if !captions.is_empty() {
            caption_style = Some(config.captions.style.clone());
        }
        for (index, caption) in captions.iter().enumerate() {
            operations.push(RenderOperation::CaptionOverlay {
                index,
                start: caption.start,
                end: caption.end,
                text: caption.text.clone(),
            });
        }
    }

    // AudioMix
    if !reconciliation.tracks.is_empty() {
        let inputs: Vec<MixInput> = reconciliation
            .tracks
            .iter()
            .map(|fitted| MixInput {
                role: fitted.role,
                path: fitted.track.path.clone(),
                volume: match fitted.role {
                    AudioRole::Narration => config.audio.narration_volume,
                    AudioRole::Background => config.audio.background_volume,
                },
                fit: fitted.fit,
            })
            .collect();
        let has_both = inputs.iter().any(|i| i.role == AudioRole::Narration)
            && inputs.iter().any(|i| i.role == AudioRole::Background);

        operations.push(RenderOperation::AudioMix {
            inputs,
            duration: final_duration,
            ducking_ratio: config.audio.ducking_ratio.filter(|_| has_both),
        });
    }

    // Encode
    let total_frames = secs_to_frames(final_duration, encode.fps);
    operations.push(RenderOperation::Encode(EncodeParameters {
        backend: selection.backend,
        encoder: selection.backend.encoder_name(encode.codec).to_string(),
        codec: encode.codec,
        rate_control: rate_control(selection.backend, encode),
        preset: encode.preset.clone(),
        width: encode.width,
        height: encode.height,
        fps: encode.fps,
        duration_secs: final_duration,
        total_frames,
        audio_codec: AUDIO_CODEC.to_string(),
        audio_bitrate_kbps: encode.audio_bitrate_kbps,
    }));

    tracing::info!(
        operations = operations.len(),
        backend = %selection.backend,
        duration_secs = final_duration,
        total_frames,
        warnings = warnings.len(),
        "Built render plan"
    );

    RenderPlan {
        operations,
        backend: selection.backend,
        duration_secs: final_duration,
        total_frames,
        caption_style,
        warnings,
    }
}

/// Motion for the `ordinal`-th of `count` still images.
///
/// Sequential motion zooms in on the first image, zooms out on the last and
/// rotates through the pans in between.
pub fn motion_for(style: MotionStyle, ordinal: usize, count: usize) -> Option<Motion> {
    match style {
        MotionStyle::Static => None,
        MotionStyle::ZoomIn => Some(Motion::ZoomIn),
        MotionStyle::ZoomOut => Some(Motion::ZoomOut),
        MotionStyle::Pan => Some(Motion::PAN_ROTATION[ordinal % Motion::PAN_ROTATION.len()]),
        MotionStyle::Sequential => Some(if ordinal == 0 {
            Motion::ZoomIn
        } else if ordinal + 1 == count {
            Motion::ZoomOut
        } else {
            Motion::PAN_ROTATION[(ordinal - 1) % Motion::PAN_ROTATION.len()]
        }),
    }
}

/// Playback rate and source trim for one placement.
///
/// A stretched video plays at `intrinsic / duration`. A video cut short
/// (the tail of a looped sequence) is trimmed instead.
fn video_timing(placed: &TimedAsset, policy: AudioSyncPolicy) -> (f64, Option<f64>) {
    let MediaKind::Video { intrinsic_secs } = placed.asset.kind else {
        return (1.0, None);
    };

    if policy == AudioSyncPolicy::MatchAudio && !approx_eq(placed.duration, intrinsic_secs) {
        return (intrinsic_secs / placed.duration, None);
    }
    if placed.duration < intrinsic_secs - TIME_EPSILON {
        return (1.0, Some(placed.duration));
    }
    (1.0, None)
}
