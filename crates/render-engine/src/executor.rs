//! Plan executors.
//!
//! [`FfmpegExecutor`] spawns ffmpeg with the lowered plan and streams its
//! `-progress` output. [`DryRunExecutor`] only writes the plan as JSON.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use stove_common::error::{StoveError, StoveResult};
use stove_project_model::plan::RenderPlan;

use crate::ffmpeg::{build_command, FfmpegCommand};
use crate::probe::command_exists;

/// Progress callback for plan execution.
pub type ProgressCallback = Box<dyn Fn(RenderProgress) + Send>;

/// Render progress report.
#[derive(Debug, Clone)]
pub struct RenderProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: RenderStage,
}

/// Stages of plan execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Rendering,
    Finalizing,
    Complete,
}

/// Something that turns a render plan into an output file.
pub trait PlanExecutor: Send + Sync {
    /// Execute the plan, writing to `output`.
    fn execute(
        &self,
        plan: &RenderPlan,
        output: &Path,
        progress: Option<ProgressCallback>,
    ) -> StoveResult<()>;

    /// Check if this executor can run on the system.
    fn is_available(&self) -> bool;

    /// Executor name.
    fn name(&self) -> &str;
}

/// Runs plans through an ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegExecutor {
    binary: String,
}

impl FfmpegExecutor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, command: &FfmpegCommand, progress: Option<ProgressCallback>) -> StoveResult<()> {
        tracing::debug!(args = ?command.args, "Running ffmpeg");
        let mut cmd = Command::new(&self.binary);
        cmd.args(&command.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let start = std::time::Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| StoveError::render(format!("Failed to start {}: {e}", self.binary)))?;

        tracing::info!(
            pid = child.id(),
            args_len = command.args.len(),
            total_frames = command.total_frames,
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StoveError::render("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| StoveError::render("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let mut reader = BufReader::new(stdout);
        let mut line = String::new();

        let mut latest = ProgressState::default();
        let mut last_progress_secs = 0.0f64;
        let mut last_progress_wall = std::time::Instant::now();
        loop {
            line.clear();
            let bytes = reader
                .read_line(&mut line)
                .map_err(|e| StoveError::render(format!("Failed reading ffmpeg progress: {e}")))?;
            if bytes == 0 {
                break;
            }

            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            latest.update(key, value);
            if key != "progress" {
                continue;
            }

            if latest.out_time_secs > last_progress_secs + 0.001 {
                last_progress_secs = latest.out_time_secs;
                last_progress_wall = std::time::Instant::now();
            }
            if let Some(cb) = &progress {
                cb(progress_report(
                    &latest,
                    command.total_frames,
                    command.expected_duration_secs,
                    start.elapsed().as_secs_f64(),
                ));
            }
            if last_progress_wall.elapsed().as_secs() >= 10 {
                tracing::warn!(
                    out_time_secs = latest.out_time_secs,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for 10s"
                );
                last_progress_wall = std::time::Instant::now();
            }
        }

        let status = child
            .wait()
            .map_err(|e| StoveError::render(format!("Failed to wait on ffmpeg: {e}")))?;

        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(StoveError::render(format!(
                "ffmpeg render failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }

        if let Some(cb) = &progress {
            cb(RenderProgress {
                progress: 1.0,
                frames_rendered: command.total_frames,
                total_frames: command.total_frames,
                eta_secs: 0.0,
                stage: RenderStage::Complete,
            });
        }

        tracing::info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            "ffmpeg process finished"
        );
        Ok(())
    }
}

impl Default for FfmpegExecutor {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl PlanExecutor for FfmpegExecutor {
    fn execute(
        &self,
        plan: &RenderPlan,
        output: &Path,
        progress: Option<ProgressCallback>,
    ) -> StoveResult<()> {
        if !self.is_available() {
            return Err(StoveError::render(format!(
                "{} not found on PATH",
                self.binary
            )));
        }
        ensure_parent_dir(output)?;

        let command = build_command(plan, output)?;
        self.run(&command, progress)?;

        tracing::info!(output = %output.display(), "Render complete");
        Ok(())
    }

    fn is_available(&self) -> bool {
        command_exists(&self.binary)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Writes each plan to `<output stem>.plan.json` instead of rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

impl DryRunExecutor {
    /// Where the plan for `output` is written.
    pub fn plan_path(output: &Path) -> PathBuf {
        output.with_extension("plan.json")
    }
}

impl PlanExecutor for DryRunExecutor {
    fn execute(
        &self,
        plan: &RenderPlan,
        output: &Path,
        progress: Option<ProgressCallback>,
    ) -> StoveResult<()> {
        ensure_parent_dir(output)?;
        let path = Self::plan_path(output);
        std::fs::write(&path, plan.to_json()?)?;

        if let Some(cb) = &progress {
            cb(RenderProgress {
                progress: 1.0,
                frames_rendered: 0,
                total_frames: plan.total_frames,
                eta_secs: 0.0,
                stage: RenderStage::Complete,
            });
        }

        tracing::info!(path = %path.display(), "Wrote render plan");
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}

fn ensure_parent_dir(output: &Path) -> StoveResult<()> {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both keys.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }
}

fn progress_report(
    state: &ProgressState,
    total_frames: u64,
    expected_duration_secs: f64,
    elapsed_secs: f64,
) -> RenderProgress {
    let progress = if expected_duration_secs <= 0.0 {
        0.0
    } else {
        (state.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    };

    let frames_rendered = (progress * total_frames as f64).round() as u64;
    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    RenderProgress {
        progress: if state.complete { 1.0 } else { progress },
        frames_rendered,
        total_frames,
        eta_secs,
        stage: if state.complete {
            RenderStage::Finalizing
        } else {
            RenderStage::Rendering
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use stove_project_model::hardware::EncodeBackend;

    fn empty_plan() -> RenderPlan {
        RenderPlan {
            operations: Vec::new(),
            backend: EncodeBackend::Cpu,
            duration_secs: 4.0,
            total_frames: 100,
            caption_style: None,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_progress_state_parses_microseconds() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "2500000");
        assert!((state.out_time_secs - 2.5).abs() < 1e-9);
        state.update("out_time_ms", "3000000");
        assert!((state.out_time_secs - 3.0).abs() < 1e-9);
        state.update("progress", "continue");
        assert!(!state.complete);
        state.update("progress", "end");
        assert!(state.complete);
    }

    #[test]
    fn test_progress_report_midway() {
        let state = ProgressState {
            out_time_secs: 5.0,
            complete: false,
        };
        let report = progress_report(&state, 250, 10.0, 4.0);
        assert!((report.progress - 0.5).abs() < 1e-9);
        assert_eq!(report.frames_rendered, 125);
        assert!((report.eta_secs - 4.0).abs() < 1e-9);
        assert_eq!(report.stage, RenderStage::Rendering);
    }

    #[test]
    fn test_progress_report_complete() {
        let state = ProgressState {
            out_time_secs: 9.9,
            complete: true,
        };
        let report = progress_report(&state, 250, 10.0, 4.0);
        assert_eq!(report.progress, 1.0);
        assert_eq!(report.stage, RenderStage::Finalizing);
    }

    #[test]
    fn test_progress_report_zero_duration() {
        let report = progress_report(&ProgressState::default(), 0, 0.0, 1.0);
        assert_eq!(report.progress, 0.0);
        assert_eq!(report.eta_secs, 0.0);
    }

    #[test]
    fn test_dry_run_writes_plan_json() {
        let dir = std::env::temp_dir().join(format!("stove-dry-run-{}", std::process::id()));
        let output = dir.join("nested").join("video.mp4");

        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        DryRunExecutor
            .execute(
                &empty_plan(),
                &output,
                Some(Box::new(move |p: RenderProgress| {
                    sink.lock().unwrap().push(p.stage);
                })),
            )
            .unwrap();

        let written = std::fs::read_to_string(dir.join("nested").join("video.plan.json")).unwrap();
        let plan: RenderPlan = serde_json::from_str(&written).unwrap();
        assert_eq!(plan, empty_plan());
        assert_eq!(*stages.lock().unwrap(), vec![RenderStage::Complete]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_ffmpeg_binary_fails() {
        let executor = FfmpegExecutor::new("definitely-not-an-ffmpeg-binary");
        assert!(!executor.is_available());
        let err = executor
            .execute(&empty_plan(), Path::new("out.mp4"), None)
            .unwrap_err();
        assert!(matches!(err, StoveError::Render { .. }));
    }
}
