//! Host probing: available encoders and media durations.

use std::path::Path;
use std::process::Command;

use stove_common::error::{StoveError, StoveResult};
use stove_project_model::hardware::HardwareCapabilities;

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Detect hardware encoders compiled into the given ffmpeg.
///
/// An encoder listed by ffmpeg may still fail at runtime when no device is
/// present; the listing is the only signal consulted here.
pub fn detect_capabilities(ffmpeg_binary: &str) -> StoveResult<HardwareCapabilities> {
    if !command_exists(ffmpeg_binary) {
        return Err(StoveError::render(format!(
            "{ffmpeg_binary} not found on PATH"
        )));
    }

    let output = Command::new(ffmpeg_binary)
        .args(["-hide_banner", "-encoders"])
        .output()
        .map_err(|e| StoveError::render(format!("Failed to run {ffmpeg_binary}: {e}")))?;

    if !output.status.success() {
        return Err(StoveError::render(format!(
            "{ffmpeg_binary} -encoders failed (status {})",
            output.status
        )));
    }

    let listing = String::from_utf8_lossy(&output.stdout);
    let capabilities = HardwareCapabilities::from_encoder_listing(&listing);
    tracing::info!(
        backends = ?capabilities.backends,
        "Detected hardware encoders"
    );
    Ok(capabilities)
}

/// Container duration in seconds as reported by ffprobe.
pub fn probe_duration(path: &Path) -> Option<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let raw = String::from_utf8(output.stdout).ok()?;
    parse_duration(&raw)
}

fn parse_duration(raw: &str) -> Option<f64> {
    let secs = raw.lines().next()?.trim().parse::<f64>().ok()?;
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("12.480000\n"), Some(12.48));
        assert_eq!(parse_duration("N/A\n"), None);
        assert_eq!(parse_duration("0.000000"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_missing_binary_is_render_error() {
        let err = detect_capabilities("definitely-not-an-ffmpeg-binary").unwrap_err();
        assert!(matches!(err, StoveError::Render { .. }));
    }
}
