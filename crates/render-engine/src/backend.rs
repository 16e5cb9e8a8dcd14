//! Encode backend selection.
//!
//! Selection is a pure function of the project configuration and the
//! hardware capabilities supplied by the caller.

use stove_project_model::config::{EncodeSettings, ProjectConfig};
use stove_project_model::hardware::{BackendPreference, EncodeBackend, HardwareCapabilities};
use stove_project_model::plan::RateControl;
use stove_project_model::warning::PipelineWarning;

/// The chosen backend and the fallback it required, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSelection {
    pub backend: EncodeBackend,
    pub warning: Option<PipelineWarning>,
}

impl BackendSelection {
    fn chosen(backend: EncodeBackend) -> Self {
        Self {
            backend,
            warning: None,
        }
    }

    fn fallback(requested: &str, reason: &str) -> Self {
        let warning = PipelineWarning::BackendFallback {
            requested: requested.to_string(),
            fallback: EncodeBackend::Cpu,
            reason: reason.to_string(),
        };
        tracing::warn!(requested, reason, "{warning}");
        Self {
            backend: EncodeBackend::Cpu,
            warning: Some(warning),
        }
    }
}

/// Pick the encode backend.
///
/// `auto` takes the first detected encoder in [`EncodeBackend::GPU_PRIORITY`]
/// order. A request that cannot be honoured falls back to software encoding
/// with a warning.
pub fn select_backend(config: &ProjectConfig, capabilities: &HardwareCapabilities) -> BackendSelection {
    if !config.use_gpu {
        return BackendSelection::chosen(EncodeBackend::Cpu);
    }

    match config.backend {
        BackendPreference::Auto => EncodeBackend::GPU_PRIORITY
            .into_iter()
            .find(|b| capabilities.supports(*b))
            .map(BackendSelection::chosen)
            .unwrap_or_else(|| {
                BackendSelection::fallback("auto", "no hardware encoder detected")
            }),
        preference => match preference.requested() {
            Some(backend) if capabilities.supports(backend) => BackendSelection::chosen(backend),
            Some(backend) => BackendSelection::fallback(backend.as_str(), "encoder not detected"),
            None => BackendSelection::chosen(EncodeBackend::Cpu),
        },
    }
}

/// Rate control for a backend: an explicit bitrate always wins, software
/// encoders otherwise use CRF and hardware encoders the GPU bitrate.
pub fn rate_control(backend: EncodeBackend, encode: &EncodeSettings) -> RateControl {
    match (encode.bitrate_kbps, backend.is_gpu()) {
        (Some(kbps), _) => RateControl::Bitrate(kbps),
        (None, false) => RateControl::Crf(encode.crf),
        (None, true) => RateControl::Bitrate(encode.gpu_bitrate_kbps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu_config(backend: BackendPreference) -> ProjectConfig {
        ProjectConfig {
            use_gpu: true,
            backend,
            ..ProjectConfig::default()
        }
    }

    #[test]
    fn test_gpu_disabled_is_cpu_without_warning() {
        let config = ProjectConfig {
            use_gpu: false,
            ..ProjectConfig::default()
        };
        let caps = HardwareCapabilities::with([EncodeBackend::Nvenc]);
        assert_eq!(
            select_backend(&config, &caps),
            BackendSelection::chosen(EncodeBackend::Cpu)
        );
    }

    #[test]
    fn test_auto_without_hardware_falls_back() {
        let selection = select_backend(
            &gpu_config(BackendPreference::Auto),
            &HardwareCapabilities::none(),
        );
        assert_eq!(selection.backend, EncodeBackend::Cpu);
        assert!(matches!(
            selection.warning,
            Some(PipelineWarning::BackendFallback { .. })
        ));
    }

    #[test]
    fn test_auto_priority_order() {
        let caps = HardwareCapabilities::with([EncodeBackend::QuickSync, EncodeBackend::Nvenc]);
        let selection = select_backend(&gpu_config(BackendPreference::Auto), &caps);
        assert_eq!(selection.backend, EncodeBackend::Nvenc);

        let caps = HardwareCapabilities::with([
            EncodeBackend::QuickSync,
            EncodeBackend::Nvenc,
            EncodeBackend::Vce,
        ]);
        let selection = select_backend(&gpu_config(BackendPreference::Auto), &caps);
        assert_eq!(selection.backend, EncodeBackend::Vce);
        assert!(selection.warning.is_none());
    }

    #[test]
    fn test_explicit_unavailable_backend_falls_back() {
        let caps = HardwareCapabilities::with([EncodeBackend::Vce]);
        let selection = select_backend(&gpu_config(BackendPreference::Nvenc), &caps);
        assert_eq!(selection.backend, EncodeBackend::Cpu);
        assert_eq!(
            selection.warning,
            Some(PipelineWarning::BackendFallback {
                requested: "nvenc".to_string(),
                fallback: EncodeBackend::Cpu,
                reason: "encoder not detected".to_string(),
            })
        );
    }

    #[test]
    fn test_explicit_cpu_never_warns() {
        let selection = select_backend(
            &gpu_config(BackendPreference::Cpu),
            &HardwareCapabilities::none(),
        );
        assert_eq!(selection, BackendSelection::chosen(EncodeBackend::Cpu));
    }

    #[test]
    fn test_rate_control() {
        let mut encode = EncodeSettings::default();
        assert_eq!(rate_control(EncodeBackend::Cpu, &encode), RateControl::Crf(22));
        assert_eq!(
            rate_control(EncodeBackend::Nvenc, &encode),
            RateControl::Bitrate(8000)
        );
        encode.bitrate_kbps = Some(5000);
        assert_eq!(
            rate_control(EncodeBackend::Cpu, &encode),
            RateControl::Bitrate(5000)
        );
    }
}
