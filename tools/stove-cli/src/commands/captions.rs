//! Write a project's subtitles.

use std::path::PathBuf;

use stove_batch::run_pipeline;
use stove_captions::save_subtitles;
use stove_project_model::hardware::HardwareCapabilities;

use super::{find_project, load_manifest};

pub fn run(manifest_path: PathBuf, project_id: String, output: PathBuf) -> anyhow::Result<()> {
    let manifest = load_manifest(&manifest_path)?;
    let project = find_project(&manifest, &project_id)?;
    if project.transcript.is_none() {
        anyhow::bail!("Project '{project_id}' has no transcript");
    }

    // Subtitles are requested explicitly, whatever the project's setting.
    let mut project = project.clone();
    let mut patch = project
        .config_override
        .take()
        .unwrap_or_else(|| serde_json::json!({}));
    force_captions(&mut patch)
        .map_err(|e| anyhow::anyhow!("config_override of project '{project_id}': {e}"))?;
    project.config_override = Some(patch);

    let config = project
        .effective_config(&manifest.config)
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    let result = run_pipeline(&project, &manifest.config, &HardwareCapabilities::none())
        .map_err(|e| anyhow::anyhow!("Project '{project_id}' failed: {e}"))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    save_subtitles(&result.captions, &config.captions.style, &output)
        .map_err(|e| anyhow::anyhow!("Failed to write subtitles: {e}"))?;

    println!("Captions written: {}", output.display());
    println!("  Segments: {}", result.captions.len());
    if let Some(last) = result.captions.last() {
        println!("  Ends at: {:.2}s of {:.2}s", last.end, result.plan.duration_secs);
    }

    Ok(())
}

/// Set `captions.enabled` in a config override patch.
fn force_captions(patch: &mut serde_json::Value) -> anyhow::Result<()> {
    let root = patch
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("must be an object"))?;
    let captions = root
        .entry("captions")
        .or_insert_with(|| serde_json::json!({}));
    let captions = captions
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("captions must be an object"))?;
    captions.insert("enabled".to_string(), serde_json::Value::Bool(true));
    Ok(())
}
