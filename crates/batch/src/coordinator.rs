//! Batch coordination: dispatch, concurrency, cancellation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use stove_common::error::StoveError;
use stove_project_model::config::ProjectConfig;
use stove_project_model::hardware::HardwareCapabilities;
use stove_render_engine::{PlanExecutor, ProgressCallback, RenderProgress};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::manifest::ProjectDescriptor;
use crate::pipeline::run_pipeline;
use crate::report::{BatchReport, BatchResult, ProjectOutcome};

/// Placeholder replaced by the project id in output templates.
pub const PROJECT_PLACEHOLDER: &str = "{project}";

/// Cooperative cancellation shared between the caller and the coordinator.
///
/// Once cancelled, no new project is dispatched. Projects already rendering
/// run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Batch-wide settings.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,

    /// File name template containing [`PROJECT_PLACEHOLDER`].
    pub output_template: String,

    pub max_concurrent_renders: usize,

    pub capabilities: HardwareCapabilities,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            output_template: format!("{PROJECT_PLACEHOLDER}.mp4"),
            max_concurrent_renders: 1,
            capabilities: HardwareCapabilities::none(),
        }
    }
}

impl BatchOptions {
    /// Output path of a project.
    pub fn output_path(&self, project_id: &str) -> PathBuf {
        self.output_dir
            .join(self.output_template.replace(PROJECT_PLACEHOLDER, project_id))
    }
}

/// Run one project end to end, turning any failure into its result.
pub fn process_project(
    project: &ProjectDescriptor,
    config: &ProjectConfig,
    options: &BatchOptions,
    executor: &dyn PlanExecutor,
) -> BatchResult {
    let start = Instant::now();
    let output = options.output_path(&project.id);

    let (outcome, warnings) = match run_pipeline(project, config, &options.capabilities) {
        Ok(pipeline) => {
            let warnings = pipeline.plan.warnings.clone();
            match executor.execute(&pipeline.plan, &output, Some(progress_logger(&project.id))) {
                Ok(()) => (ProjectOutcome::Succeeded { output }, warnings),
                Err(e) => (ProjectOutcome::failed(&e), warnings),
            }
        }
        Err(failure) => (ProjectOutcome::failed(&failure.error), failure.warnings),
    };

    match &outcome {
        ProjectOutcome::Failed { error, kind } => {
            tracing::error!(project = %project.id, ?kind, %error, "Project failed");
        }
        _ => {
            tracing::info!(
                project = %project.id,
                executor = executor.name(),
                warnings = warnings.len(),
                "Project rendered"
            );
        }
    }

    BatchResult {
        project_id: project.id.clone(),
        outcome,
        warnings,
        elapsed_secs: start.elapsed().as_secs_f64(),
    }
}

fn progress_logger(project_id: &str) -> ProgressCallback {
    let project_id = project_id.to_string();
    Box::new(move |p: RenderProgress| {
        tracing::debug!(
            project = %project_id,
            progress = p.progress,
            frames = p.frames_rendered,
            total_frames = p.total_frames,
            eta_secs = p.eta_secs,
            stage = ?p.stage,
            "Render progress"
        );
    })
}

/// Render projects one after another.
pub fn run_sequential(
    projects: &[ProjectDescriptor],
    config: &ProjectConfig,
    options: &BatchOptions,
    executor: &dyn PlanExecutor,
    cancel: &CancellationFlag,
) -> BatchReport {
    let started_at = Utc::now();
    tracing::info!(projects = projects.len(), "Starting sequential batch");

    let results = projects
        .iter()
        .map(|project| {
            if cancel.is_cancelled() {
                BatchResult::cancelled(&project.id)
            } else {
                process_project(project, config, options, executor)
            }
        })
        .collect();

    finish(started_at, results)
}

/// Render projects concurrently, at most `max_concurrent_renders` at a time.
pub async fn run(
    projects: Vec<ProjectDescriptor>,
    config: Arc<ProjectConfig>,
    options: Arc<BatchOptions>,
    executor: Arc<dyn PlanExecutor>,
    cancel: CancellationFlag,
) -> BatchReport {
    let started_at = Utc::now();
    let limit = options.max_concurrent_renders.max(1);
    tracing::info!(
        projects = projects.len(),
        max_concurrent = limit,
        executor = executor.name(),
        "Starting batch"
    );

    let semaphore = Arc::new(Semaphore::new(limit));
    let mut tasks = JoinSet::new();
    let mut results = Vec::with_capacity(projects.len());
    let mut dispatched = Vec::new();

    for project in projects {
        if cancel.is_cancelled() {
            results.push(BatchResult::cancelled(&project.id));
            continue;
        }
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                results.push(BatchResult::cancelled(&project.id));
                continue;
            }
        };
        // Cancellation may have arrived while waiting for a slot.
        if cancel.is_cancelled() {
            results.push(BatchResult::cancelled(&project.id));
            continue;
        }

        dispatched.push(project.id.clone());
        let config = Arc::clone(&config);
        let options = Arc::clone(&options);
        let executor = Arc::clone(&executor);
        tasks.spawn_blocking(move || {
            let _permit = permit;
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                process_project(&project, &config, &options, executor.as_ref())
            }));
            outcome.unwrap_or_else(|_| {
                BatchResult::failed(&project.id, &StoveError::render("render task panicked"))
            })
        });
    }

    while let Some(done) = tasks.join_next().await {
        collect(done, &mut results);
    }
    account_for_lost_tasks(&dispatched, &mut results);

    finish(started_at, results)
}

/// Record a failure for every dispatched project whose task never returned
/// a result, so the report covers each project exactly once.
fn account_for_lost_tasks(dispatched: &[String], results: &mut Vec<BatchResult>) {
    for id in dispatched {
        if !results.iter().any(|r| &r.project_id == id) {
            tracing::error!(project = %id, "Render task ended without a result");
            results.push(BatchResult::failed(
                id,
                &StoveError::render("render task ended without a result"),
            ));
        }
    }
}

fn collect(done: Result<BatchResult, tokio::task::JoinError>, results: &mut Vec<BatchResult>) {
    match done {
        Ok(result) => results.push(result),
        Err(e) => tracing::error!(error = %e, "Render task failed to join"),
    }
}

fn finish(started_at: chrono::DateTime<Utc>, results: Vec<BatchResult>) -> BatchReport {
    let report = BatchReport::new(started_at, results);
    let summary = report.summary();
    tracing::info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        cancelled = summary.cancelled,
        warnings = report.warning_count(),
        "Batch finished"
    );
    report
}
