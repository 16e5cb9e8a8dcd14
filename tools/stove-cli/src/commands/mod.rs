//! Subcommand implementations and the manifest helpers they share.

use std::path::{Path, PathBuf};

use anyhow::Context;
use stove_batch::{BatchManifest, ProjectDescriptor, TranscriptSource};
use stove_project_model::asset::KindHint;
use stove_project_model::audio::AudioTrack;
use stove_project_model::hardware::{EncodeBackend, HardwareCapabilities};
use stove_render_engine::probe_duration;
use stove_timeline::resolver::kind_from_extension;

pub mod batch;
pub mod captions;
pub mod check;
pub mod init;
pub mod plan;

/// Load a manifest, resolve its relative paths against the manifest's
/// directory and probe durations the manifest leaves out.
pub fn load_manifest(path: &Path) -> anyhow::Result<BatchManifest> {
    let mut manifest = BatchManifest::load(path)
        .map_err(|e| anyhow::anyhow!("Failed to load manifest {}: {e}", path.display()))?;

    let base = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    for project in &mut manifest.projects {
        prepare_project(project, &base);
    }
    Ok(manifest)
}

fn prepare_project(project: &mut ProjectDescriptor, base: &Path) {
    for source in &mut project.sources {
        source.path = rebase(base, &source.path);
        let is_video = source.kind.or_else(|| kind_from_extension(&source.path))
            == Some(KindHint::Video);
        if is_video && source.duration_secs.is_none() {
            source.duration_secs = probe_duration(&source.path);
            if source.duration_secs.is_none() {
                tracing::warn!(project = %project.id, path = %source.path.display(), "Could not probe video duration");
            }
        }
    }

    for track in [&mut project.audio.narration, &mut project.audio.background]
        .into_iter()
        .flatten()
    {
        track.path = rebase(base, &track.path);
        probe_track(&project.id, track);
    }

    if let Some(TranscriptSource::File(transcript)) = &mut project.transcript {
        *transcript = rebase(base, transcript);
    }
}

fn probe_track(project_id: &str, track: &mut AudioTrack) {
    if track.has_duration() {
        return;
    }
    match probe_duration(&track.path) {
        Some(duration) => track.duration_secs = duration,
        None => {
            tracing::warn!(project = %project_id, path = %track.path.display(), "Could not probe audio duration");
        }
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Find one project of a manifest by id.
pub fn find_project<'a>(
    manifest: &'a BatchManifest,
    id: &str,
) -> anyhow::Result<&'a ProjectDescriptor> {
    manifest
        .projects
        .iter()
        .find(|p| p.id == id)
        .with_context(|| format!("No project '{id}' in manifest"))
}

/// Parse backend names given on the command line.
pub fn parse_backends(names: &[String]) -> anyhow::Result<HardwareCapabilities> {
    let backends = names
        .iter()
        .map(|name| match name.to_ascii_lowercase().as_str() {
            "nvenc" => Ok(EncodeBackend::Nvenc),
            "vce" | "amf" => Ok(EncodeBackend::Vce),
            "quicksync" | "qsv" => Ok(EncodeBackend::QuickSync),
            other => Err(anyhow::anyhow!(
                "Unknown backend: {other}. Use: nvenc, vce, quicksync"
            )),
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(HardwareCapabilities::with(backends))
}
