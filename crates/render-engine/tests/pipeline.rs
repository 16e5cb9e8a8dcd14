use std::path::{Path, PathBuf};

use proptest::prelude::*;
use stove_captions::align_captions;
use stove_common::timecode::secs_to_frames;
use stove_project_model::asset::SourceFile;
use stove_project_model::audio::{AudioTrack, AudioTracks, ReconciledTimeline};
use stove_project_model::caption::RawSegment;
use stove_project_model::config::{AudioSyncPolicy, ProjectConfig};
use stove_project_model::hardware::{EncodeBackend, HardwareCapabilities};
use stove_project_model::plan::{RenderOperation, RenderPlan};
use stove_project_model::warning::PipelineWarning;
use stove_render_engine::{build_command, build_render_plan};
use stove_timeline::{plan_transitions, resolve_assets, synchronize};

fn sources(count: usize) -> Vec<SourceFile> {
    (0..count)
        .map(|i| SourceFile::image(format!("slide_{i}.jpg")))
        .collect()
}

fn config(policy: AudioSyncPolicy) -> ProjectConfig {
    ProjectConfig {
        image_duration: 5.0,
        use_crossfade: true,
        crossfade_duration: 1.0,
        audio_sync_policy: policy,
        use_gpu: false,
        ..ProjectConfig::default()
    }
}

fn narration(secs: f64) -> AudioTracks {
    AudioTracks {
        narration: Some(AudioTrack::new("voice.mp3", secs)),
        background: None,
    }
}

fn reconcile(count: usize, audio: &AudioTracks, config: &ProjectConfig) -> ReconciledTimeline {
    let assets = resolve_assets(&sources(count), config).unwrap();
    let planned = plan_transitions(&assets, config).unwrap();
    synchronize(&planned.timeline, audio, config).unwrap()
}

fn crossfades(plan: &RenderPlan) -> Vec<(f64, f64)> {
    plan.operations_named("crossfade")
        .map(|op| match op {
            RenderOperation::Crossfade { start, duration, .. } => (*start, *duration),
            _ => unreachable!(),
        })
        .collect()
}

#[test]
fn match_audio_stretches_slides_to_narration() {
    let mut config = config(AudioSyncPolicy::MatchAudio);
    config.captions.enabled = true;
    let reconciled = reconcile(3, &narration(26.0), &config);

    let segments = vec![RawSegment::new(1.0, 3.0, "Hello there")];
    let captions = align_captions(&reconciled, &segments, &config.captions).unwrap();
    let plan = build_render_plan(
        &reconciled,
        Some(captions.as_slice()),
        &config,
        &HardwareCapabilities::none(),
    );

    let names: Vec<_> = plan.operations.iter().map(|op| op.name()).collect();
    assert_eq!(
        names,
        vec![
            "scale",
            "scale",
            "scale",
            "crossfade",
            "crossfade",
            "fade",
            "fade",
            "caption_overlay",
            "audio_mix",
            "encode",
        ]
    );
    assert_eq!(crossfades(&plan), vec![(8.0, 2.0), (16.0, 2.0)]);
    assert_eq!(plan.duration_secs, 26.0);
    assert_eq!(plan.total_frames, 650);
    assert!(plan.warnings.is_empty());

    let command = build_command(&plan, Path::new("out/video.mp4")).unwrap();
    assert!(command.args.contains(&"libx264".to_string()));
    assert!(command.args.contains(&"[aout]".to_string()));
    assert_eq!(command.expected_duration_secs, 26.0);
}

#[test]
fn gpu_request_without_hardware_falls_back_to_cpu() {
    let config = ProjectConfig {
        use_gpu: true,
        ..config(AudioSyncPolicy::MatchVisual)
    };
    let reconciled = reconcile(2, &AudioTracks::default(), &config);
    let plan = build_render_plan(&reconciled, None, &config, &HardwareCapabilities::none());

    assert_eq!(plan.backend, EncodeBackend::Cpu);
    assert_eq!(plan.encode().unwrap().encoder, "libx264");
    assert!(plan
        .warnings
        .iter()
        .any(|w| matches!(w, PipelineWarning::BackendFallback { .. })));
}

#[test]
fn independent_policy_pads_short_visuals() {
    let config = config(AudioSyncPolicy::Independent);
    let reconciled = reconcile(3, &narration(20.0), &config);
    let plan = build_render_plan(&reconciled, None, &config, &HardwareCapabilities::none());

    assert!(plan.operations.contains(&RenderOperation::PadTail {
        start: 13.0,
        duration: 7.0,
    }));
    assert_eq!(plan.duration_secs, 20.0);
}

#[test]
fn plan_round_trips_through_json() {
    let config = config(AudioSyncPolicy::LoopVisual);
    let reconciled = reconcile(2, &narration(30.0), &config);
    let plan = build_render_plan(&reconciled, None, &config, &HardwareCapabilities::none());

    let json = plan.to_json().unwrap();
    let parsed: RenderPlan = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, plan);
    assert!(json.contains("\"op\": \"encode\""));
}

fn policy() -> impl Strategy<Value = AudioSyncPolicy> {
    prop_oneof![
        Just(AudioSyncPolicy::MatchAudio),
        Just(AudioSyncPolicy::MatchVisual),
        Just(AudioSyncPolicy::Independent),
        Just(AudioSyncPolicy::LoopVisual),
    ]
}

proptest! {
    #[test]
    fn plans_end_with_a_single_encode(
        count in 1usize..8,
        image_duration in 0.5f64..10.0,
        crossfade in 0.0f64..4.0,
        audio_secs in 1.0f64..120.0,
        policy in policy(),
    ) {
        let config = ProjectConfig {
            image_duration,
            crossfade_duration: crossfade,
            audio_sync_policy: policy,
            use_gpu: false,
            ..ProjectConfig::default()
        };
        let reconciled = reconcile(count, &narration(audio_secs), &config);
        let plan = build_render_plan(&reconciled, None, &config, &HardwareCapabilities::none());

        prop_assert_eq!(plan.operations_named("encode").count(), 1);
        prop_assert!(plan.encode().is_some());
        prop_assert_eq!(plan.total_frames, secs_to_frames(plan.duration_secs, 25));
        prop_assert_eq!(
            plan.operations_named("crossfade").count(),
            reconciled.timeline.overlap_windows().len()
        );
        prop_assert!(build_command(&plan, &PathBuf::from("out.mp4")).is_ok());
    }
}
