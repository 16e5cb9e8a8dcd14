//! Asset sequence resolution.
//!
//! Turns the ordered input list into classified [`MediaAsset`]s with their
//! provisional durations. Classification prefers an explicit kind hint and
//! falls back to the file extension.

use std::path::Path;

use stove_common::error::{StoveError, StoveResult};
use stove_project_model::asset::{KindHint, MediaAsset, MediaKind, SourceFile};
use stove_project_model::config::ProjectConfig;

/// Still image extensions (lowercase).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"];

/// Video extensions (lowercase).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "wmv", "flv", "m4v"];

/// Classify a path by extension, case-insensitively.
pub fn kind_from_extension(path: &Path) -> Option<KindHint> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(KindHint::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(KindHint::Video)
    } else {
        None
    }
}

/// Determine the kind of one input file.
pub fn classify(source: &SourceFile) -> StoveResult<KindHint> {
    source
        .kind
        .or_else(|| kind_from_extension(&source.path))
        .ok_or_else(|| StoveError::unsupported_asset(&source.path, "unrecognized file type"))
}

/// Resolve the ordered input list into media assets.
///
/// Videos are dropped when `include_videos` is off and moved ahead of every
/// image (keeping their relative order) when `videos_as_intro` is on.
/// Indices are assigned after both steps.
pub fn resolve_assets(sources: &[SourceFile], config: &ProjectConfig) -> StoveResult<Vec<MediaAsset>> {
    config.validate()?;

    if sources.is_empty() {
        return Err(StoveError::EmptyProject);
    }

    let mut kinds = Vec::with_capacity(sources.len());
    for source in sources {
        let kind = classify(source)?;
        if kind == KindHint::Video && !config.include_videos {
            tracing::debug!(path = %source.path.display(), "Skipping video; videos disabled");
            continue;
        }
        kinds.push((source, media_kind(source, kind)?));
    }

    if config.videos_as_intro {
        // sort_by_key is stable: relative order within each group survives.
        kinds.sort_by_key(|(_, kind)| !kind.is_video());
    }

    if kinds.is_empty() {
        return Err(StoveError::EmptyProject);
    }

    let assets: Vec<MediaAsset> = kinds
        .into_iter()
        .enumerate()
        .map(|(index, (source, kind))| {
            let duration_secs = match kind {
                MediaKind::Image => config.image_duration,
                MediaKind::Video { intrinsic_secs } => intrinsic_secs,
            };
            MediaAsset {
                index,
                path: source.path.clone(),
                kind,
                duration_secs,
            }
        })
        .collect();

    let videos = assets.iter().filter(|a| a.kind.is_video()).count();
    tracing::info!(
        assets = assets.len(),
        images = assets.len() - videos,
        videos,
        "Resolved asset sequence"
    );

    Ok(assets)
}

fn media_kind(source: &SourceFile, kind: KindHint) -> StoveResult<MediaKind> {
    match kind {
        KindHint::Image => Ok(MediaKind::Image),
        KindHint::Video => match source.duration_secs {
            Some(secs) if secs.is_finite() && secs > 0.0 => Ok(MediaKind::Video {
                intrinsic_secs: secs,
            }),
            Some(secs) => Err(StoveError::unsupported_asset(
                &source.path,
                format!("video duration {secs} is not a positive number of seconds"),
            )),
            None => Err(StoveError::unsupported_asset(
                &source.path,
                "video duration is unknown",
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn source(path: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(path),
            kind: None,
            duration_secs: None,
        }
    }

    #[test]
    fn test_classify_by_extension_case_insensitive() {
        assert_eq!(classify(&source("a.PNG")).unwrap(), KindHint::Image);
        assert_eq!(classify(&source("b.Jpeg")).unwrap(), KindHint::Image);
        assert_eq!(classify(&source("c.MKV")).unwrap(), KindHint::Video);
        assert!(classify(&source("notes.txt")).is_err());
        assert!(classify(&source("no_extension")).is_err());
    }

    #[test]
    fn test_hint_overrides_extension() {
        let mut file = source("clip.png");
        file.kind = Some(KindHint::Video);
        file.duration_secs = Some(3.0);
        assert_eq!(classify(&file).unwrap(), KindHint::Video);
    }

    #[test]
    fn test_resolve_assigns_durations_and_indices() {
        let config = ProjectConfig::default();
        let sources = vec![
            source("1.png"),
            SourceFile::video("2.mp4", 4.5),
            source("3.jpg"),
        ];
        let assets = resolve_assets(&sources, &config).unwrap();

        assert_eq!(assets.len(), 3);
        assert_eq!(assets[0].duration_secs, config.image_duration);
        assert_eq!(assets[1].kind, MediaKind::Video { intrinsic_secs: 4.5 });
        assert_eq!(assets[1].duration_secs, 4.5);
        assert_eq!(
            assets.iter().map(|a| a.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_empty_input_is_empty_project() {
        let err = resolve_assets(&[], &ProjectConfig::default()).unwrap_err();
        assert!(matches!(err, StoveError::EmptyProject));
    }

    #[test]
    fn test_video_without_duration_is_unsupported() {
        let err = resolve_assets(&[source("clip.mov")], &ProjectConfig::default()).unwrap_err();
        assert!(matches!(err, StoveError::UnsupportedAsset { .. }));

        let err = resolve_assets(
            &[SourceFile::video("clip.mov", f64::NAN)],
            &ProjectConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StoveError::UnsupportedAsset { .. }));
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let err = resolve_assets(&[source("a.png"), source("b.psd")], &ProjectConfig::default())
            .unwrap_err();
        assert!(matches!(err, StoveError::UnsupportedAsset { .. }));
    }

    #[test]
    fn test_excluding_videos_can_empty_the_project() {
        let config = ProjectConfig {
            include_videos: false,
            ..ProjectConfig::default()
        };
        let err = resolve_assets(&[SourceFile::video("a.mp4", 2.0)], &config).unwrap_err();
        assert!(matches!(err, StoveError::EmptyProject));

        let assets = resolve_assets(&[SourceFile::video("a.mp4", 2.0), source("b.png")], &config)
            .unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].index, 0);
    }

    #[test]
    fn test_videos_as_intro_is_stable() {
        let config = ProjectConfig {
            videos_as_intro: true,
            ..ProjectConfig::default()
        };
        let sources = vec![
            source("1.png"),
            SourceFile::video("2.mp4", 3.0),
            source("3.png"),
            SourceFile::video("4.mp4", 5.0),
        ];
        let assets = resolve_assets(&sources, &config).unwrap();
        let order: Vec<_> = assets
            .iter()
            .map(|a| a.path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(order, vec!["2.mp4", "4.mp4", "1.png", "3.png"]);
        assert_eq!(assets[2].index, 2);
    }

    #[test]
    fn test_invalid_config_rejected_first() {
        let config = ProjectConfig {
            image_duration: 0.0,
            ..ProjectConfig::default()
        };
        let err = resolve_assets(&[source("a.png")], &config).unwrap_err();
        assert!(matches!(err, StoveError::InvalidConfig { .. }));
    }
}
