//! Write a sample batch manifest.

use std::path::PathBuf;

use stove_batch::{BatchManifest, ProjectDescriptor};
use stove_project_model::asset::SourceFile;
use stove_project_model::audio::AudioTrack;
use stove_project_model::config::ProjectConfig;

/// A two-slide project narrated by one voice track.
pub fn sample_manifest() -> BatchManifest {
    let mut project = ProjectDescriptor::new(
        "example",
        vec![
            SourceFile::image("example/slide-01.jpg"),
            SourceFile::image("example/slide-02.jpg"),
        ],
    );
    // Zero durations are probed with ffprobe when the manifest is loaded.
    project.audio.narration = Some(AudioTrack::new("example/narration.mp3", 0.0));

    BatchManifest {
        config: ProjectConfig::default(),
        projects: vec![project],
    }
}

pub fn run(path: PathBuf, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    sample_manifest()
        .save(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write manifest: {e}"))?;

    println!("Manifest written: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the project sources and narration paths");
    println!("  2. videostove plan {}", path.display());
    println!("  3. videostove batch {} --jobs 2", path.display());

    Ok(())
}
