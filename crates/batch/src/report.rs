//! Batch results and the summary report.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stove_common::error::{ErrorKind, StoveError};
use stove_project_model::warning::PipelineWarning;

/// How one project ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ProjectOutcome {
    Succeeded { output: PathBuf },
    Failed { error: String, kind: ErrorKind },
    Cancelled,
}

impl ProjectOutcome {
    pub fn failed(error: &StoveError) -> Self {
        ProjectOutcome::Failed {
            error: error.to_string(),
            kind: error.kind(),
        }
    }
}

/// Result of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub project_id: String,
    pub outcome: ProjectOutcome,

    #[serde(default)]
    pub warnings: Vec<PipelineWarning>,

    /// Wall-clock time spent on the project.
    pub elapsed_secs: f64,
}

impl BatchResult {
    pub fn cancelled(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            outcome: ProjectOutcome::Cancelled,
            warnings: Vec::new(),
            elapsed_secs: 0.0,
        }
    }

    /// A failure recorded without any pipeline warnings.
    pub fn failed(project_id: impl Into<String>, error: &StoveError) -> Self {
        Self {
            project_id: project_id.into(),
            outcome: ProjectOutcome::failed(error),
            warnings: Vec::new(),
            elapsed_secs: 0.0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ProjectOutcome::Succeeded { .. })
    }
}

/// Outcome counts of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Every project's result plus the batch timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Sorted by project id.
    pub results: Vec<BatchResult>,
}

impl BatchReport {
    pub fn new(started_at: DateTime<Utc>, mut results: Vec<BatchResult>) -> Self {
        results.sort_by(|a, b| a.project_id.cmp(&b.project_id));
        Self {
            started_at,
            finished_at: Utc::now(),
            results,
        }
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.results.len(),
            ..BatchSummary::default()
        };
        for result in &self.results {
            match result.outcome {
                ProjectOutcome::Succeeded { .. } => summary.succeeded += 1,
                ProjectOutcome::Failed { .. } => summary.failed += 1,
                ProjectOutcome::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    pub fn result(&self, project_id: &str) -> Option<&BatchResult> {
        self.results.iter().find(|r| r.project_id == project_id)
    }

    /// Total warnings across all projects.
    pub fn warning_count(&self) -> usize {
        self.results.iter().map(|r| r.warnings.len()).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
