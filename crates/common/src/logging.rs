//! Logging and tracing initialization.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Crates whose events follow the configured level.
const STOVE_TARGETS: &[&str] = &[
    "stove_common",
    "stove_project_model",
    "stove_timeline",
    "stove_captions",
    "stove_render_engine",
    "stove_batch",
    "videostove",
];

/// Expand a configured level into filter directives.
///
/// A bare level ("debug") applies to VideoStove crates only; everything else
/// stays at `warn`. A level that already holds directives is used verbatim.
pub fn filter_directives(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }

    std::iter::once("warn".to_string())
        .chain(STOVE_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the tracing subscriber with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to stderr
/// so plan JSON on stdout stays machine readable. Returns `false` when a
/// global subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&config.level)));

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(
            builder
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish(),
        )
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_level_scopes_to_stove_crates() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("stove_timeline=debug"));
        assert!(directives.contains("videostove=debug"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_explicit_directives_pass_through() {
        assert_eq!(
            filter_directives("stove_batch=trace,info"),
            "stove_batch=trace,info"
        );
    }
}
