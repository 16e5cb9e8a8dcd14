//! Project descriptors and the batch manifest file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stove_captions::load_transcript;
use stove_common::error::{StoveError, StoveResult};
use stove_project_model::asset::SourceFile;
use stove_project_model::audio::AudioTracks;
use stove_project_model::caption::RawSegment;
use stove_project_model::config::ProjectConfig;

/// Where a project's transcription comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranscriptSource {
    /// A transcription JSON file.
    File(PathBuf),
    /// Segments given inline.
    Inline(Vec<RawSegment>),
}

impl TranscriptSource {
    pub fn segments(&self) -> StoveResult<Vec<RawSegment>> {
        match self {
            TranscriptSource::File(path) => load_transcript(path),
            TranscriptSource::Inline(segments) => Ok(segments.clone()),
        }
    }
}

/// One project of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    /// Unique within a batch; substituted into the output template.
    pub id: String,

    /// Ordered visual inputs.
    pub sources: Vec<SourceFile>,

    #[serde(default)]
    pub audio: AudioTracks,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<TranscriptSource>,

    /// Partial configuration merged over the batch configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_override: Option<serde_json::Value>,
}

impl ProjectDescriptor {
    pub fn new(id: impl Into<String>, sources: Vec<SourceFile>) -> Self {
        Self {
            id: id.into(),
            sources,
            audio: AudioTracks::default(),
            transcript: None,
            config_override: None,
        }
    }

    /// The batch configuration with this project's override applied.
    pub fn effective_config(&self, shared: &ProjectConfig) -> StoveResult<ProjectConfig> {
        let Some(patch) = &self.config_override else {
            return Ok(shared.clone());
        };
        if !patch.is_object() {
            return Err(StoveError::invalid_config(format!(
                "config_override of project '{}' must be an object",
                self.id
            )));
        }

        let mut merged = serde_json::to_value(shared)?;
        merge_json(&mut merged, patch);
        let config: ProjectConfig = serde_json::from_value(merged).map_err(|e| {
            StoveError::invalid_config(format!(
                "config_override of project '{}': {e}",
                self.id
            ))
        })?;
        config.validate()?;
        Ok(config)
    }
}

/// Recursively merge `patch` into `base`. Objects merge key by key; any
/// other value replaces what was there.
fn merge_json(base: &mut serde_json::Value, patch: &serde_json::Value) {
    match (base, patch) {
        (serde_json::Value::Object(base), serde_json::Value::Object(patch)) => {
            for (key, value) in patch {
                merge_json(
                    base.entry(key.clone()).or_insert(serde_json::Value::Null),
                    value,
                );
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

/// A batch manifest: shared configuration plus the projects to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchManifest {
    #[serde(default)]
    pub config: ProjectConfig,

    pub projects: Vec<ProjectDescriptor>,
}

impl BatchManifest {
    /// Load a manifest from a JSON file.
    pub fn load(path: &Path) -> StoveResult<Self> {
        if !path.exists() {
            return Err(StoveError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let manifest: BatchManifest = serde_json::from_str(&content)?;
        manifest.config.validate()?;

        tracing::info!(
            path = %path.display(),
            projects = manifest.projects.len(),
            "Loaded batch manifest"
        );
        Ok(manifest)
    }

    /// Write the manifest as pretty JSON.
    pub fn save(&self, path: &Path) -> StoveResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn from_json(json: &str) -> StoveResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
