//! Audio/visual reconciliation.
//!
//! Every policy produces a new [`ReconciledTimeline`]; the planned timeline
//! is never modified in place.
//!
//! | Policy         | Final duration   | Visual track                | Audio tracks               |
//! |----------------|------------------|-----------------------------|----------------------------|
//! | `MatchAudio`   | reference audio  | durations and overlaps scaled | as is                    |
//! | `MatchVisual`  | visual           | as is                       | trimmed or looped          |
//! | `Independent`  | longer of both   | black tail when shorter     | silence tail when shorter  |
//! | `LoopVisual`   | reference audio  | image cycle repeated, trimmed | as is                    |
//!
//! Background music always loops or trims to the final duration.

use stove_common::error::{StoveError, StoveResult};
use stove_common::timecode::{approx_eq, DurationDrift, TIME_EPSILON};
use stove_project_model::audio::{
    AudioRole, AudioTrack, AudioTracks, FittedTrack, Reconciliation, ReconciledTimeline, TrackFit,
};
use stove_project_model::config::{AudioSyncPolicy, ProjectConfig};
use stove_project_model::timeline::Timeline;

use crate::transitions::{boundary_overlap, clamp_warning, layout_with_overlaps, Slot};

/// Reconcile a planned timeline with the project's audio.
pub fn synchronize(
    timeline: &Timeline,
    audio: &AudioTracks,
    config: &ProjectConfig,
) -> StoveResult<ReconciledTimeline> {
    if timeline.is_empty() {
        return Err(StoveError::EmptyProject);
    }

    let tracks = usable_tracks(audio, config);
    let policy = config.audio_sync_policy;

    let reconciled = match policy {
        AudioSyncPolicy::MatchAudio => match_audio(timeline, &tracks)?,
        AudioSyncPolicy::MatchVisual => match_visual(timeline, &tracks),
        AudioSyncPolicy::Independent => independent(timeline, &tracks),
        AudioSyncPolicy::LoopVisual => loop_visual(timeline, &tracks, config)?,
    };

    let r = &reconciled.reconciliation;
    tracing::info!(
        policy = ?policy,
        scale_factor = r.scale_factor,
        final_secs = r.final_duration,
        visual_padding_secs = r.visual_padding_secs,
        narration_loops = r.narration_loops,
        placements = reconciled.timeline.len(),
        "Reconciled audio and visual tracks"
    );

    Ok(reconciled)
}

/// Tracks that take part in the mix: background only when enabled, and
/// only tracks with a usable duration.
fn usable_tracks(audio: &AudioTracks, config: &ProjectConfig) -> AudioTracks {
    let keep = |track: &Option<AudioTrack>, role: AudioRole| -> Option<AudioTrack> {
        let track = track.as_ref()?;
        if track.has_duration() {
            Some(track.clone())
        } else {
            tracing::warn!(
                role = ?role,
                path = %track.path.display(),
                duration_secs = track.duration_secs,
                "Ignoring audio track without a usable duration"
            );
            None
        }
    };

    AudioTracks {
        narration: keep(&audio.narration, AudioRole::Narration),
        background: if config.audio.use_background {
            keep(&audio.background, AudioRole::Background)
        } else {
            None
        },
    }
}

fn reference_secs(tracks: &AudioTracks) -> StoveResult<f64> {
    tracks
        .reference()
        .map(|t| t.duration_secs)
        .ok_or(StoveError::ZeroAudioDuration)
}

/// Fit a track to `target` by trimming or looping it.
pub fn fit_by_loop(track_secs: f64, target: f64) -> TrackFit {
    if approx_eq(track_secs, target) {
        TrackFit::AsIs
    } else if track_secs > target {
        TrackFit::Trim { to_secs: target }
    } else {
        TrackFit::Loop {
            loops: loop_count(track_secs, target),
            to_secs: target,
        }
    }
}

/// Fit a track to `target` by trimming it or padding it with silence.
pub fn fit_by_padding(track_secs: f64, target: f64) -> TrackFit {
    if approx_eq(track_secs, target) {
        TrackFit::AsIs
    } else if track_secs > target {
        TrackFit::Trim { to_secs: target }
    } else {
        TrackFit::PadSilence { to_secs: target }
    }
}

/// Plays needed to cover `target`.
fn loop_count(track_secs: f64, target: f64) -> u32 {
    ((target / track_secs) - TIME_EPSILON).ceil().max(1.0) as u32
}

fn background_fit(tracks: &AudioTracks, final_duration: f64) -> Option<FittedTrack> {
    tracks.background.as_ref().map(|track| FittedTrack {
        role: AudioRole::Background,
        track: track.clone(),
        fit: fit_by_loop(track.duration_secs, final_duration),
    })
}

fn fitted_tracks(tracks: &AudioTracks, narration_fit: Option<TrackFit>, final_duration: f64) -> Vec<FittedTrack> {
    let narration = tracks.narration.as_ref().zip(narration_fit).map(|(track, fit)| FittedTrack {
        role: AudioRole::Narration,
        track: track.clone(),
        fit,
    });
    narration
        .into_iter()
        .chain(background_fit(tracks, final_duration))
        .collect()
}

fn with_audio_total(mut timeline: Timeline, tracks: &AudioTracks) -> Timeline {
    timeline.total_audio_duration = tracks.reference().map(|t| t.duration_secs);
    timeline
}

fn match_audio(timeline: &Timeline, tracks: &AudioTracks) -> StoveResult<ReconciledTimeline> {
    let audio_secs = reference_secs(tracks)?;
    let visual_secs = timeline.total_visual_duration;
    let drift = DurationDrift {
        reference_secs: audio_secs,
        measured_secs: visual_secs,
    };
    let mut scale = drift.scale_to_reference();
    if (scale - 1.0).abs() <= TIME_EPSILON {
        scale = 1.0;
    }

    let scaled = if scale == 1.0 {
        timeline.clone()
    } else {
        let slots = timeline
            .assets
            .iter()
            .map(|a| Slot {
                asset: a.asset.clone(),
                cycle: a.cycle,
                duration: a.duration * scale,
            })
            .collect();
        let overlaps: Vec<f64> = timeline
            .boundary_overlaps()
            .into_iter()
            .map(|o| o * scale)
            .collect();
        layout_with_overlaps(slots, &overlaps)
    };

    tracing::debug!(
        audio_secs,
        visual_secs,
        drift_ms = drift.drift_ms(),
        scale,
        "Scaling visual track to audio"
    );

    Ok(ReconciledTimeline {
        timeline: with_audio_total(scaled, tracks),
        reconciliation: Reconciliation {
            policy: AudioSyncPolicy::MatchAudio,
            scale_factor: scale,
            final_duration: audio_secs,
            reference_audio_secs: Some(audio_secs),
            visual_padding_secs: 0.0,
            narration_loops: 1,
            tracks: fitted_tracks(tracks, Some(TrackFit::AsIs), audio_secs),
            warnings: Vec::new(),
        },
    })
}

fn match_visual(timeline: &Timeline, tracks: &AudioTracks) -> ReconciledTimeline {
    let final_duration = timeline.total_visual_duration;
    let narration_fit = tracks
        .narration
        .as_ref()
        .map(|t| fit_by_loop(t.duration_secs, final_duration));
    let narration_loops = match narration_fit {
        Some(TrackFit::Loop { loops, .. }) => loops,
        _ => 1,
    };

    ReconciledTimeline {
        timeline: with_audio_total(timeline.clone(), tracks),
        reconciliation: Reconciliation {
            policy: AudioSyncPolicy::MatchVisual,
            scale_factor: 1.0,
            final_duration,
            reference_audio_secs: tracks.reference().map(|t| t.duration_secs),
            visual_padding_secs: 0.0,
            narration_loops,
            tracks: fitted_tracks(tracks, narration_fit, final_duration),
            warnings: Vec::new(),
        },
    }
}

fn independent(timeline: &Timeline, tracks: &AudioTracks) -> ReconciledTimeline {
    let visual_secs = timeline.total_visual_duration;
    let audio_secs = tracks.reference().map(|t| t.duration_secs);
    let final_duration = audio_secs.map_or(visual_secs, |a| a.max(visual_secs));

    let padding = final_duration - visual_secs;
    let visual_padding_secs = if padding > TIME_EPSILON { padding } else { 0.0 };

    let narration_fit = tracks
        .narration
        .as_ref()
        .map(|t| fit_by_padding(t.duration_secs, final_duration));

    ReconciledTimeline {
        timeline: with_audio_total(timeline.clone(), tracks),
        reconciliation: Reconciliation {
            policy: AudioSyncPolicy::Independent,
            scale_factor: 1.0,
            final_duration,
            reference_audio_secs: audio_secs,
            visual_padding_secs,
            narration_loops: 1,
            tracks: fitted_tracks(tracks, narration_fit, final_duration),
            warnings: Vec::new(),
        },
    }
}

/// Intro videos once, then the rest of the sequence repeated until the
/// reference audio is covered. The last placement is cut at the audio end.
fn loop_visual(
    timeline: &Timeline,
    tracks: &AudioTracks,
    config: &ProjectConfig,
) -> StoveResult<ReconciledTimeline> {
    let audio_secs = reference_secs(tracks)?;
    let assets = &timeline.assets;
    let overlaps = timeline.boundary_overlaps();

    let intro_len = assets
        .iter()
        .take_while(|a| a.asset.kind.is_video())
        .count();
    // A sequence made only of videos loops as a whole.
    let cycle_start = if intro_len == assets.len() { 0 } else { intro_len };
    let cycle_len = assets.len() - cycle_start;

    let (wrap_overlap, wrap_clamped) = boundary_overlap(
        assets[assets.len() - 1].duration,
        assets[cycle_start].duration,
        config,
    );

    let mut slots = Vec::new();
    let mut slot_overlaps = Vec::new();
    let mut warnings = Vec::new();
    let mut cursor = 0.0;
    let mut position = 0;

    loop {
        let source = locate(position, cycle_start, cycle_len);
        let placed = &assets[source.index];

        let start = cursor;
        let end = start + placed.duration;
        let covered = end >= audio_secs - TIME_EPSILON;

        slots.push(Slot {
            asset: placed.asset.clone(),
            cycle: source.cycle,
            duration: if covered { audio_secs - start } else { placed.duration },
        });
        if covered {
            break;
        }

        let next = locate(position + 1, cycle_start, cycle_len);
        let overlap = if next.wraps {
            if wrap_clamped {
                warnings.push(clamp_warning(position, config.crossfade_duration, wrap_overlap));
            }
            wrap_overlap
        } else {
            overlaps[source.index]
        };
        slot_overlaps.push(overlap);
        cursor = end - overlap;
        position += 1;
    }

    let looped = layout_with_overlaps(slots, &slot_overlaps);
    tracing::debug!(
        audio_secs,
        placements = looped.len(),
        cycles = looped.assets.last().map(|a| a.cycle + 1).unwrap_or(0),
        "Looped visual track to cover audio"
    );

    Ok(ReconciledTimeline {
        timeline: with_audio_total(looped, tracks),
        reconciliation: Reconciliation {
            policy: AudioSyncPolicy::LoopVisual,
            scale_factor: 1.0,
            final_duration: audio_secs,
            reference_audio_secs: Some(audio_secs),
            visual_padding_secs: 0.0,
            narration_loops: 1,
            tracks: fitted_tracks(tracks, Some(TrackFit::AsIs), audio_secs),
            warnings,
        },
    })
}

/// Where the `position`-th placement of a looped sequence comes from.
struct SequencePosition {
    index: usize,
    cycle: usize,
    /// First placement of a repeated (not the first) cycle.
    wraps: bool,
}

fn locate(position: usize, cycle_start: usize, cycle_len: usize) -> SequencePosition {
    if position < cycle_start {
        return SequencePosition {
            index: position,
            cycle: 0,
            wraps: false,
        };
    }
    let offset = position - cycle_start;
    SequencePosition {
        index: cycle_start + offset % cycle_len,
        cycle: offset / cycle_len,
        wraps: offset > 0 && offset % cycle_len == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use stove_project_model::asset::{MediaAsset, MediaKind};

    use crate::transitions::plan_transitions;

    fn image(index: usize, duration: f64) -> MediaAsset {
        MediaAsset {
            index,
            path: PathBuf::from(format!("{index}.png")),
            kind: MediaKind::Image,
            duration_secs: duration,
        }
    }

    fn video(index: usize, duration: f64) -> MediaAsset {
        MediaAsset {
            index,
            path: PathBuf::from(format!("{index}.mp4")),
            kind: MediaKind::Video {
                intrinsic_secs: duration,
            },
            duration_secs: duration,
        }
    }

    fn config(policy: AudioSyncPolicy, crossfade: f64) -> ProjectConfig {
        ProjectConfig {
            audio_sync_policy: policy,
            use_crossfade: crossfade > 0.0,
            crossfade_duration: crossfade,
            ..ProjectConfig::default()
        }
    }

    fn narration(secs: f64) -> AudioTracks {
        AudioTracks {
            narration: Some(AudioTrack::new("voice.mp3", secs)),
            background: None,
        }
    }

    fn planned(assets: &[MediaAsset], config: &ProjectConfig) -> Timeline {
        plan_transitions(assets, config).unwrap().timeline
    }

    #[test]
    fn test_match_audio_scales_durations_and_overlaps() {
        let config = config(AudioSyncPolicy::MatchAudio, 1.0);
        let timeline = planned(&[image(0, 5.0), image(1, 5.0), image(2, 5.0)], &config);

        let reconciled = synchronize(&timeline, &narration(26.0), &config).unwrap();
        let out = &reconciled.timeline;

        assert_eq!(reconciled.reconciliation.scale_factor, 2.0);
        assert_eq!(out.durations(), vec![10.0, 10.0, 10.0]);
        assert_eq!(out.boundary_overlaps(), vec![2.0, 2.0]);
        assert!(approx_eq(out.total_visual_duration, 26.0));
        assert_eq!(reconciled.final_duration(), 26.0);
        assert_eq!(out.total_audio_duration, Some(26.0));
        out.check_invariants().unwrap();
    }

    #[test]
    fn test_match_audio_is_idempotent() {
        let config = config(AudioSyncPolicy::MatchAudio, 0.6);
        let timeline = planned(&[image(0, 8.0), image(1, 8.0), image(2, 3.0)], &config);
        let audio = narration(41.3);

        let first = synchronize(&timeline, &audio, &config).unwrap();
        let second = synchronize(&first.timeline, &audio, &config).unwrap();

        assert_eq!(second.reconciliation.scale_factor, 1.0);
        assert_eq!(second.timeline, first.timeline);
    }

    #[test]
    fn test_match_audio_without_audio_fails() {
        let config = config(AudioSyncPolicy::MatchAudio, 0.0);
        let timeline = planned(&[image(0, 5.0)], &config);

        let err = synchronize(&timeline, &AudioTracks::default(), &config).unwrap_err();
        assert!(matches!(err, StoveError::ZeroAudioDuration));

        let err = synchronize(&timeline, &narration(0.0), &config).unwrap_err();
        assert!(matches!(err, StoveError::ZeroAudioDuration));
    }

    #[test]
    fn test_match_audio_falls_back_to_background() {
        let config = config(AudioSyncPolicy::MatchAudio, 0.0);
        let timeline = planned(&[image(0, 5.0), image(1, 5.0)], &config);
        let audio = AudioTracks {
            narration: None,
            background: Some(AudioTrack::new("music.mp3", 20.0)),
        };

        let reconciled = synchronize(&timeline, &audio, &config).unwrap();
        assert_eq!(reconciled.reconciliation.scale_factor, 2.0);
        assert_eq!(reconciled.reconciliation.tracks.len(), 1);
        assert_eq!(reconciled.reconciliation.tracks[0].fit, TrackFit::AsIs);
    }

    #[test]
    fn test_match_visual_loops_short_narration() {
        let config = config(AudioSyncPolicy::MatchVisual, 0.0);
        let timeline = planned(&[image(0, 10.0), image(1, 15.0)], &config);

        let reconciled = synchronize(&timeline, &narration(10.0), &config).unwrap();
        let r = &reconciled.reconciliation;

        assert_eq!(r.final_duration, 25.0);
        assert_eq!(r.narration_loops, 3);
        assert_eq!(
            r.tracks[0].fit,
            TrackFit::Loop {
                loops: 3,
                to_secs: 25.0
            }
        );
        assert_eq!(reconciled.timeline.durations(), timeline.durations());
    }

    #[test]
    fn test_match_visual_trims_long_narration() {
        let config = config(AudioSyncPolicy::MatchVisual, 0.0);
        let timeline = planned(&[image(0, 10.0)], &config);

        let reconciled = synchronize(&timeline, &narration(30.0), &config).unwrap();
        assert_eq!(reconciled.reconciliation.narration_loops, 1);
        assert_eq!(
            reconciled.reconciliation.tracks[0].fit,
            TrackFit::Trim { to_secs: 10.0 }
        );
    }

    #[test]
    fn test_match_visual_without_audio_is_silent() {
        let config = config(AudioSyncPolicy::MatchVisual, 0.0);
        let timeline = planned(&[image(0, 10.0)], &config);

        let reconciled = synchronize(&timeline, &AudioTracks::default(), &config).unwrap();
        assert!(reconciled.reconciliation.tracks.is_empty());
        assert_eq!(reconciled.final_duration(), 10.0);
        assert_eq!(reconciled.timeline.total_audio_duration, None);
    }

    #[test]
    fn test_independent_pads_shorter_visual() {
        let config = config(AudioSyncPolicy::Independent, 0.0);
        let timeline = planned(&[image(0, 10.0)], &config);

        let reconciled = synchronize(&timeline, &narration(14.0), &config).unwrap();
        let r = &reconciled.reconciliation;
        assert_eq!(r.final_duration, 14.0);
        assert_eq!(r.visual_padding_secs, 4.0);
        assert_eq!(r.tracks[0].fit, TrackFit::AsIs);
    }

    #[test]
    fn test_independent_pads_shorter_audio_with_silence() {
        let config = config(AudioSyncPolicy::Independent, 0.0);
        let timeline = planned(&[image(0, 10.0), image(1, 10.0)], &config);

        let reconciled = synchronize(&timeline, &narration(12.0), &config).unwrap();
        let r = &reconciled.reconciliation;
        assert_eq!(r.final_duration, 20.0);
        assert_eq!(r.visual_padding_secs, 0.0);
        assert_eq!(r.tracks[0].fit, TrackFit::PadSilence { to_secs: 20.0 });
    }

    #[test]
    fn test_background_always_fits_final_duration() {
        let config = config(AudioSyncPolicy::MatchAudio, 0.0);
        let timeline = planned(&[image(0, 10.0)], &config);
        let audio = AudioTracks {
            narration: Some(AudioTrack::new("voice.mp3", 25.0)),
            background: Some(AudioTrack::new("music.mp3", 10.0)),
        };

        let reconciled = synchronize(&timeline, &audio, &config).unwrap();
        let background = reconciled
            .reconciliation
            .tracks
            .iter()
            .find(|t| t.role == AudioRole::Background)
            .unwrap();
        assert_eq!(
            background.fit,
            TrackFit::Loop {
                loops: 3,
                to_secs: 25.0
            }
        );
    }

    #[test]
    fn test_disabled_background_is_dropped() {
        let mut config = config(AudioSyncPolicy::MatchVisual, 0.0);
        config.audio.use_background = false;
        let timeline = planned(&[image(0, 10.0)], &config);
        let audio = AudioTracks {
            narration: None,
            background: Some(AudioTrack::new("music.mp3", 10.0)),
        };

        let reconciled = synchronize(&timeline, &audio, &config).unwrap();
        assert!(reconciled.reconciliation.tracks.is_empty());
    }

    #[test]
    fn test_loop_visual_repeats_images_after_intro() {
        let config = config(AudioSyncPolicy::LoopVisual, 0.0);
        let timeline = planned(&[video(0, 3.0), image(1, 4.0), image(2, 4.0)], &config);

        let reconciled = synchronize(&timeline, &narration(20.0), &config).unwrap();
        let out = &reconciled.timeline;

        let indices: Vec<_> = out.assets.iter().map(|a| a.asset.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 1, 2, 1]);
        let cycles: Vec<_> = out.assets.iter().map(|a| a.cycle).collect();
        assert_eq!(cycles, vec![0, 0, 0, 1, 1, 2]);
        assert!(approx_eq(out.assets[5].duration, 1.0));
        assert!(approx_eq(out.total_visual_duration, 20.0));
        assert_eq!(reconciled.final_duration(), 20.0);
        out.check_invariants().unwrap();
    }

    #[test]
    fn test_loop_visual_keeps_crossfades_across_cycles() {
        let config = config(AudioSyncPolicy::LoopVisual, 1.0);
        let timeline = planned(&[image(0, 5.0), image(1, 5.0)], &config);

        let reconciled = synchronize(&timeline, &narration(20.0), &config).unwrap();
        let out = &reconciled.timeline;

        // Placements start at 0, 4, 8, 12 and 16; the last is cut at 20.
        assert_eq!(out.len(), 5);
        assert!(out.boundary_overlaps().iter().all(|o| *o == 1.0));
        assert!(approx_eq(out.total_visual_duration, 20.0));
        out.check_invariants().unwrap();
    }

    #[test]
    fn test_loop_visual_requires_audio() {
        let config = config(AudioSyncPolicy::LoopVisual, 0.0);
        let timeline = planned(&[image(0, 5.0)], &config);
        let err = synchronize(&timeline, &AudioTracks::default(), &config).unwrap_err();
        assert!(matches!(err, StoveError::ZeroAudioDuration));
    }

    #[test]
    fn test_loop_visual_shorter_audio_trims() {
        let config = config(AudioSyncPolicy::LoopVisual, 0.0);
        let timeline = planned(&[image(0, 5.0), image(1, 5.0)], &config);

        let reconciled = synchronize(&timeline, &narration(7.0), &config).unwrap();
        let out = &reconciled.timeline;
        assert_eq!(out.len(), 2);
        assert!(approx_eq(out.assets[1].duration, 2.0));
    }

    #[test]
    fn test_loop_count_is_exact_on_multiples() {
        assert_eq!(loop_count(10.0, 30.0), 3);
        assert_eq!(loop_count(10.0, 30.5), 4);
        assert_eq!(loop_count(10.0, 5.0), 1);
    }
}
