//! Encode backends and the hardware capability set they are chosen from.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::VideoCodec;

/// Concrete encoding path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeBackend {
    /// Software encode (libx264 / libx265).
    Cpu,
    /// NVIDIA NVENC.
    Nvenc,
    /// AMD VCE / AMF.
    Vce,
    /// Intel QuickSync.
    #[serde(rename = "quicksync")]
    QuickSync,
}

impl EncodeBackend {
    /// Hardware backends in automatic selection order.
    pub const GPU_PRIORITY: [EncodeBackend; 3] = [
        EncodeBackend::Vce,
        EncodeBackend::Nvenc,
        EncodeBackend::QuickSync,
    ];

    pub fn is_gpu(&self) -> bool {
        !matches!(self, EncodeBackend::Cpu)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EncodeBackend::Cpu => "cpu",
            EncodeBackend::Nvenc => "nvenc",
            EncodeBackend::Vce => "vce",
            EncodeBackend::QuickSync => "quicksync",
        }
    }

    /// ffmpeg encoder name for this backend and codec.
    pub fn encoder_name(&self, codec: VideoCodec) -> &'static str {
        match (self, codec) {
            (EncodeBackend::Cpu, VideoCodec::H264) => "libx264",
            (EncodeBackend::Cpu, VideoCodec::H265) => "libx265",
            (EncodeBackend::Nvenc, VideoCodec::H264) => "h264_nvenc",
            (EncodeBackend::Nvenc, VideoCodec::H265) => "hevc_nvenc",
            (EncodeBackend::Vce, VideoCodec::H264) => "h264_amf",
            (EncodeBackend::Vce, VideoCodec::H265) => "hevc_amf",
            (EncodeBackend::QuickSync, VideoCodec::H264) => "h264_qsv",
            (EncodeBackend::QuickSync, VideoCodec::H265) => "hevc_qsv",
        }
    }
}

impl fmt::Display for EncodeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which backend the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Best available hardware encoder.
    #[default]
    Auto,
    Nvenc,
    Vce,
    #[serde(rename = "quicksync")]
    QuickSync,
    Cpu,
}

impl BackendPreference {
    /// The specific backend requested, if any.
    pub fn requested(&self) -> Option<EncodeBackend> {
        match self {
            BackendPreference::Auto => None,
            BackendPreference::Nvenc => Some(EncodeBackend::Nvenc),
            BackendPreference::Vce => Some(EncodeBackend::Vce),
            BackendPreference::QuickSync => Some(EncodeBackend::QuickSync),
            BackendPreference::Cpu => Some(EncodeBackend::Cpu),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendPreference::Auto => "auto",
            other => other.requested().map(|b| b.as_str()).unwrap_or("auto"),
        }
    }
}

/// Hardware encoders detected on the rendering machine.
///
/// Supplied by the caller; the engine never probes the environment itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareCapabilities {
    pub backends: BTreeSet<EncodeBackend>,
}

impl HardwareCapabilities {
    /// No hardware encoders.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(backends: impl IntoIterator<Item = EncodeBackend>) -> Self {
        Self {
            backends: backends.into_iter().filter(|b| b.is_gpu()).collect(),
        }
    }

    pub fn supports(&self, backend: EncodeBackend) -> bool {
        backend == EncodeBackend::Cpu || self.backends.contains(&backend)
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Parse the output of `ffmpeg -hide_banner -encoders`.
    pub fn from_encoder_listing(listing: &str) -> Self {
        let mut backends = BTreeSet::new();
        for line in listing.lines() {
            // " V....D h264_nvenc           NVIDIA NVENC H.264 encoder"
            let Some(name) = line.split_whitespace().nth(1) else {
                continue;
            };
            let backend = match name {
                "h264_nvenc" | "hevc_nvenc" => EncodeBackend::Nvenc,
                "h264_amf" | "hevc_amf" => EncodeBackend::Vce,
                "h264_qsv" | "hevc_qsv" => EncodeBackend::QuickSync,
                _ => continue,
            };
            backends.insert(backend);
        }
        Self { backends }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "Encoders:
 V..... = Video
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
 V....D h264_qsv             H.264 / AVC / MPEG-4 AVC (Intel Quick Sync Video acceleration) (codec h264)
 A....D aac                  AAC (Advanced Audio Coding)
";

    #[test]
    fn test_parse_encoder_listing() {
        let caps = HardwareCapabilities::from_encoder_listing(LISTING);
        assert!(caps.supports(EncodeBackend::Nvenc));
        assert!(caps.supports(EncodeBackend::QuickSync));
        assert!(!caps.supports(EncodeBackend::Vce));
        assert!(caps.supports(EncodeBackend::Cpu));
    }

    #[test]
    fn test_empty_listing_has_no_gpu() {
        let caps = HardwareCapabilities::from_encoder_listing("");
        assert!(caps.is_empty());
    }

    #[test]
    fn test_with_ignores_cpu() {
        let caps = HardwareCapabilities::with([EncodeBackend::Cpu, EncodeBackend::Vce]);
        assert_eq!(caps.backends.len(), 1);
    }

    #[test]
    fn test_encoder_names() {
        assert_eq!(EncodeBackend::Vce.encoder_name(VideoCodec::H264), "h264_amf");
        assert_eq!(
            EncodeBackend::QuickSync.encoder_name(VideoCodec::H265),
            "hevc_qsv"
        );
        assert_eq!(
            serde_json::to_string(&EncodeBackend::QuickSync).unwrap(),
            "\"quicksync\""
        );
    }
}
