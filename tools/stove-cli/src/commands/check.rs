//! Check encoder availability.

use stove_common::config::AppConfig;
use stove_project_model::hardware::EncodeBackend;
use stove_render_engine::{command_exists, detect_capabilities};

pub fn run(app_config: &AppConfig) -> anyhow::Result<()> {
    println!("VideoStove System Check");
    println!("{}", "=".repeat(50));

    let ffmpeg = app_config.ffmpeg_binary.as_str();
    for binary in [ffmpeg, "ffprobe"] {
        if command_exists(binary) {
            println!("[OK] {binary} found");
        } else {
            println!("[MISSING] {binary} not found on PATH");
        }
    }

    println!();
    match detect_capabilities(ffmpeg) {
        Ok(capabilities) => {
            println!("Hardware encoders:");
            for backend in EncodeBackend::GPU_PRIORITY {
                let state = if capabilities.supports(backend) { "OK" } else { "--" };
                println!("  [{state}] {backend}");
            }
            println!();
            if capabilities.is_empty() {
                println!("No hardware encoder detected. Renders will use the CPU encoder.");
            } else {
                println!("GPU encoding is available.");
            }
        }
        Err(e) => {
            println!("[WARN] Could not query encoders: {e}");
            println!("Only dry runs are possible until ffmpeg is installed.");
        }
    }

    Ok(())
}
