//! Render every project of a manifest.

use std::path::PathBuf;
use std::sync::Arc;

use stove_batch::{BatchOptions, CancellationFlag, ProjectOutcome};
use stove_common::config::AppConfig;
use stove_project_model::hardware::HardwareCapabilities;
use stove_render_engine::{
    command_exists, detect_capabilities, DryRunExecutor, FfmpegExecutor, PlanExecutor,
};

use super::load_manifest;

pub async fn run(
    app_config: &AppConfig,
    manifest_path: PathBuf,
    output: Option<PathBuf>,
    jobs: Option<usize>,
    dry_run: bool,
    report_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let manifest = load_manifest(&manifest_path)?;
    println!(
        "Batch: {} project(s) from {}",
        manifest.projects.len(),
        manifest_path.display()
    );

    let executor: Arc<dyn PlanExecutor> = if dry_run {
        Arc::new(DryRunExecutor)
    } else {
        let ffmpeg = FfmpegExecutor::new(app_config.ffmpeg_binary.clone());
        if !ffmpeg.is_available() {
            anyhow::bail!(
                "{} not found on PATH. Install ffmpeg or use --dry-run",
                app_config.ffmpeg_binary
            );
        }
        Arc::new(ffmpeg)
    };

    // Overrides may enable the GPU per project, so probe whenever ffmpeg exists.
    let capabilities = if command_exists(&app_config.ffmpeg_binary) {
        detect_capabilities(&app_config.ffmpeg_binary).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Encoder detection failed, assuming CPU only");
            HardwareCapabilities::none()
        })
    } else {
        HardwareCapabilities::none()
    };

    let options = BatchOptions {
        output_dir: output.unwrap_or_else(|| app_config.batch.output_dir.clone()),
        output_template: app_config.batch.output_template.clone(),
        max_concurrent_renders: jobs.unwrap_or(app_config.batch.max_concurrent_renders),
        capabilities,
    };
    if options.max_concurrent_renders == 0 {
        anyhow::bail!("--jobs must be at least 1");
    }
    std::fs::create_dir_all(&options.output_dir)?;

    println!("  Output: {}", options.output_dir.display());
    println!("  Jobs: {}", options.max_concurrent_renders);
    println!("  Executor: {}", executor.name());

    let cancel = CancellationFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling: running renders will finish, queued projects are skipped");
            on_signal.cancel();
        }
    });

    let report = stove_batch::run(
        manifest.projects,
        Arc::new(manifest.config),
        Arc::new(options),
        executor,
        cancel,
    )
    .await;

    println!();
    for result in &report.results {
        match &result.outcome {
            ProjectOutcome::Succeeded { output } => {
                println!("[OK] {} -> {} ({:.1}s)", result.project_id, output.display(), result.elapsed_secs);
            }
            ProjectOutcome::Failed { error, .. } => {
                println!("[FAIL] {}: {error}", result.project_id);
            }
            ProjectOutcome::Cancelled => println!("[SKIP] {}: cancelled", result.project_id),
        }
        for warning in &result.warnings {
            println!("       warning: {warning}");
        }
    }

    let summary = report.summary();
    println!();
    println!(
        "Done: {} succeeded, {} failed, {} cancelled ({} total)",
        summary.succeeded, summary.failed, summary.cancelled, summary.total
    );

    if let Some(path) = report_path {
        std::fs::write(&path, report.to_json()?)?;
        println!("Report written: {}", path.display());
    }

    if summary.failed > 0 {
        anyhow::bail!("{} project(s) failed", summary.failed);
    }
    Ok(())
}
