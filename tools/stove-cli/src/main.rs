//! VideoStove CLI: plan, caption and batch-render slideshow projects.
//!
//! Usage:
//!   videostove plan <MANIFEST>        Print render plans as JSON
//!   videostove captions <MANIFEST>    Write a project's subtitle file
//!   videostove batch <MANIFEST>       Render every project of a manifest
//!   videostove check                  Check encoder availability
//!   videostove init [PATH]            Write a sample manifest

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "videostove",
    about = "Slideshow and narration video composition",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the render plan of one or all projects of a manifest
    Plan {
        /// Path to the batch manifest
        manifest: PathBuf,

        /// Only plan this project
        #[arg(short, long)]
        project: Option<String>,

        /// Plan as if these hardware encoders were present (nvenc, vce, quicksync)
        #[arg(long, value_delimiter = ',')]
        assume_gpu: Vec<String>,
    },

    /// Align a project's transcript and write subtitles
    Captions {
        /// Path to the batch manifest
        manifest: PathBuf,

        /// Project to caption
        #[arg(short, long)]
        project: String,

        /// Output file; the extension picks the format (srt, vtt, ass)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Render every project of a manifest
    Batch {
        /// Path to the batch manifest
        manifest: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum number of concurrent renders
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Write plans instead of invoking ffmpeg
        #[arg(long)]
        dry_run: bool,

        /// Where to write the JSON batch report
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Check encoder availability
    Check,

    /// Write a sample batch manifest
    Init {
        /// Manifest path
        #[arg(default_value = "videostove.json")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app_config = stove_common::config::AppConfig::load();

    // Initialize logging
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        app_config.logging.level.clone()
    };
    stove_common::logging::init_logging(&stove_common::config::LoggingConfig {
        level: log_level,
        json: cli.json_logs || app_config.logging.json,
    });

    match cli.command {
        Commands::Plan {
            manifest,
            project,
            assume_gpu,
        } => commands::plan::run(manifest, project, assume_gpu),
        Commands::Captions {
            manifest,
            project,
            output,
        } => commands::captions::run(manifest, project, output),
        Commands::Batch {
            manifest,
            output,
            jobs,
            dry_run,
            report,
        } => commands::batch::run(&app_config, manifest, output, jobs, dry_run, report).await,
        Commands::Check => commands::check::run(&app_config),
        Commands::Init { path, force } => commands::init::run(path, force),
    }
}
