use proptest::prelude::*;
use stove_captions::align_captions;
use stove_project_model::audio::{Reconciliation, ReconciledTimeline};
use stove_project_model::caption::RawSegment;
use stove_project_model::config::{AudioSyncPolicy, CaptionConfig, CaptionMode};
use stove_project_model::timeline::Timeline;

fn reconciled(final_duration: f64) -> ReconciledTimeline {
    ReconciledTimeline {
        timeline: Timeline {
            assets: Vec::new(),
            total_visual_duration: final_duration,
            total_audio_duration: Some(final_duration),
        },
        reconciliation: Reconciliation {
            policy: AudioSyncPolicy::MatchAudio,
            scale_factor: 1.0,
            final_duration,
            reference_audio_secs: Some(final_duration),
            visual_padding_secs: 0.0,
            narration_loops: 1,
            tracks: Vec::new(),
            warnings: Vec::new(),
        },
    }
}

fn segment_strategy() -> impl Strategy<Value = RawSegment> {
    (0.0f64..120.0, 0.0f64..8.0, prop::collection::vec("[a-z]{1,12}", 1..10)).prop_map(
        |(start, length, words)| RawSegment::new(start, start + length, words.join(" ")),
    )
}

fn mode_strategy() -> impl Strategy<Value = CaptionMode> {
    prop_oneof![
        Just(CaptionMode::Lines),
        Just(CaptionMode::SingleWords),
        (1usize..4).prop_map(|words| CaptionMode::WordChunks { words }),
        Just(CaptionMode::Typewriter),
    ]
}

proptest! {
    #[test]
    fn captions_never_overlap(
        segments in prop::collection::vec(segment_strategy(), 0..25),
        mode in mode_strategy(),
        max_chars in prop::option::of(5usize..60),
        max_duration in prop::option::of(0.5f64..6.0),
        min_gap in 0.0f64..0.3,
    ) {
        let config = CaptionConfig {
            enabled: true,
            mode,
            max_chars,
            max_duration_secs: max_duration,
            min_gap_secs: min_gap,
            ..CaptionConfig::default()
        };
        let captions = align_captions(&reconciled(100.0), &segments, &config).unwrap();

        for caption in &captions {
            prop_assert!(caption.end > caption.start);
            prop_assert!(caption.start >= 0.0);
            prop_assert!(caption.end <= 100.0);
            if let Some(max) = max_duration {
                prop_assert!(caption.end - caption.start <= max + 1e-9);
            }
        }
        for pair in captions.windows(2) {
            prop_assert!(pair[1].start > pair[0].start);
            prop_assert!(pair[1].start >= pair[0].end + min_gap - 1e-9);
        }
    }
}

#[test]
fn line_captions_respect_character_limit() {
    let config = CaptionConfig {
        enabled: true,
        max_chars: Some(16),
        ..CaptionConfig::default()
    };
    let segments = vec![
        RawSegment::new(0.0, 6.0, "the quick brown fox jumps over the lazy dog"),
        RawSegment::new(6.0, 7.0, "again"),
    ];

    let captions = align_captions(&reconciled(30.0), &segments, &config).unwrap();
    assert!(captions.len() > 2);
    assert!(captions.iter().all(|c| c.text.chars().count() <= 16));
    assert_eq!(captions[0].start, 0.0);
}
