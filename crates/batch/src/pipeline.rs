//! The per-project pipeline, from input list to render plan.

use stove_captions::align_captions;
use stove_common::error::StoveError;
use stove_project_model::caption::CaptionSegment;
use stove_project_model::config::ProjectConfig;
use stove_project_model::hardware::HardwareCapabilities;
use stove_project_model::plan::RenderPlan;
use stove_project_model::warning::PipelineWarning;
use stove_render_engine::build_render_plan;
use stove_timeline::{plan_transitions, resolve_assets, synchronize};

use crate::manifest::ProjectDescriptor;

/// Everything the pipeline produced for one project.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub plan: RenderPlan,

    /// Aligned captions; empty when captions are disabled or the project
    /// has no transcript.
    pub captions: Vec<CaptionSegment>,
}

/// A stage failure plus the warnings raised by the stages before it.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct PipelineFailure {
    pub error: StoveError,
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineFailure {
    fn with_warnings(warnings: &[PipelineWarning]) -> impl FnOnce(StoveError) -> Self + '_ {
        move |error| Self {
            error,
            warnings: warnings.to_vec(),
        }
    }
}

impl From<StoveError> for PipelineFailure {
    fn from(error: StoveError) -> Self {
        Self {
            error,
            warnings: Vec::new(),
        }
    }
}

/// Run every pure stage for one project.
///
/// Warnings from transition planning, reconciliation and backend selection
/// all end up on the returned plan, in that order. On failure the warnings
/// raised so far travel with the error. Captions are aligned only when the
/// effective config enables them.
pub fn run_pipeline(
    project: &ProjectDescriptor,
    shared: &ProjectConfig,
    capabilities: &HardwareCapabilities,
) -> Result<PipelineOutput, PipelineFailure> {
    let config = project.effective_config(shared)?;

    let assets = resolve_assets(&project.sources, &config)?;
    let planned = plan_transitions(&assets, &config)?;
    let mut warnings = planned.warnings;
    let reconciled = synchronize(&planned.timeline, &project.audio, &config)
        .map_err(PipelineFailure::with_warnings(&warnings))?;

    let captions = match &project.transcript {
        Some(source) if config.captions.enabled => {
            let mut so_far = warnings.clone();
            so_far.extend(reconciled.reconciliation.warnings.iter().cloned());
            source
                .segments()
                .and_then(|segments| align_captions(&reconciled, &segments, &config.captions))
                .map_err(PipelineFailure::with_warnings(&so_far))?
        }
        _ => Vec::new(),
    };

    let mut plan = build_render_plan(&reconciled, Some(captions.as_slice()), &config, capabilities);
    warnings.append(&mut plan.warnings);
    plan.warnings = warnings;

    tracing::info!(
        project = %project.id,
        assets = assets.len(),
        captions = captions.len(),
        duration_secs = plan.duration_secs,
        warnings = plan.warnings.len(),
        "Pipeline finished"
    );

    Ok(PipelineOutput { plan, captions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stove_project_model::asset::SourceFile;
    use stove_project_model::audio::AudioTrack;
    use stove_project_model::caption::RawSegment;
    use std::path::PathBuf;

    use crate::manifest::TranscriptSource;

    fn slideshow(id: &str, count: usize) -> ProjectDescriptor {
        let sources = (0..count)
            .map(|i| SourceFile::image(format!("{id}/{i}.jpg")))
            .collect();
        ProjectDescriptor::new(id, sources)
    }

    fn cpu() -> ProjectConfig {
        ProjectConfig {
            use_gpu: false,
            ..ProjectConfig::default()
        }
    }

    #[test]
    fn test_empty_project_fails() {
        let failure = run_pipeline(&slideshow("empty", 0), &cpu(), &HardwareCapabilities::none())
            .unwrap_err();
        assert!(matches!(failure.error, StoveError::EmptyProject));
        assert!(failure.warnings.is_empty());
    }

    #[test]
    fn test_warnings_are_ordered_by_stage() {
        let mut project = slideshow("short", 3);
        project.config_override = Some(serde_json::json!({
            "image_duration": 1.0,
            "crossfade_duration": 2.0,
            "audio_sync_policy": "match_visual",
            "use_gpu": true
        }));

        let output = run_pipeline(&project, &cpu(), &HardwareCapabilities::none()).unwrap();
        let warnings = &output.plan.warnings;
        assert_eq!(warnings.len(), 3);
        assert!(matches!(warnings[0], PipelineWarning::ClampedTransition { boundary: 0, .. }));
        assert!(matches!(warnings[1], PipelineWarning::ClampedTransition { boundary: 1, .. }));
        assert!(matches!(warnings[2], PipelineWarning::BackendFallback { .. }));
    }

    #[test]
    fn test_captions_reach_the_plan() {
        let mut project = slideshow("narrated", 2);
        project.audio.narration = Some(AudioTrack::new("voice.mp3", 10.0));
        project.transcript = Some(TranscriptSource::Inline(vec![
            RawSegment::new(0.5, 2.0, "Welcome"),
            RawSegment::new(3.0, 4.5, "to the show"),
        ]));
        let mut config = cpu();
        config.captions.enabled = true;

        let output = run_pipeline(&project, &config, &HardwareCapabilities::none()).unwrap();
        assert_eq!(output.captions.len(), 2);
        assert_eq!(output.plan.operations_named("caption_overlay").count(), 2);
        assert_eq!(output.plan.duration_secs, 10.0);
    }

    #[test]
    fn test_disabled_captions_skip_the_transcript() {
        let mut project = slideshow("muted", 2);
        project.audio.narration = Some(AudioTrack::new("voice.mp3", 10.0));
        project.transcript = Some(TranscriptSource::Inline(vec![RawSegment::new(3.0, 2.0, "bad")]));

        let output = run_pipeline(&project, &cpu(), &HardwareCapabilities::none()).unwrap();
        assert!(output.captions.is_empty());
        assert_eq!(output.plan.operations_named("caption_overlay").count(), 0);

        project.transcript = Some(TranscriptSource::File(PathBuf::from("/nonexistent/t.json")));
        assert!(run_pipeline(&project, &cpu(), &HardwareCapabilities::none()).is_ok());
    }

    #[test]
    fn test_caption_failure_keeps_earlier_warnings() {
        let mut project = slideshow("clamped", 3);
        project.audio.narration = Some(AudioTrack::new("voice.mp3", 10.0));
        project.transcript = Some(TranscriptSource::Inline(vec![RawSegment::new(3.0, 2.0, "bad")]));
        let mut config = cpu();
        config.image_duration = 1.0;
        config.crossfade_duration = 2.0;
        config.captions.enabled = true;

        let failure = run_pipeline(&project, &config, &HardwareCapabilities::none()).unwrap_err();
        assert!(matches!(failure.error, StoveError::CaptionTiming { index: 0, .. }));
        assert!(matches!(
            failure.warnings[0],
            PipelineWarning::ClampedTransition { boundary: 0, .. }
        ));
        assert_eq!(failure.to_string(), failure.error.to_string());
    }
}
