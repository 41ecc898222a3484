//! One-shot host capability classification.
//!
//! The probe never touches global state: callers hand it a `CapabilitySource`
//! (the wgpu-backed one lives in `folio_render`), and the resulting
//! `Capabilities` value is passed down explicitly to whoever needs the tier.
//! Every failure path lands on `PerformanceTier::Low`.

use crate::tier::PerformanceTier;

/// Renderer substrings that identify a known high-end desktop GPU.
const HIGH_END_MARKERS: &[&str] = &["RTX", "GTX", "Radeon RX"];

/// Renderer substrings that identify integrated, mobile, or software adapters.
const LOW_END_MARKERS: &[&str] = &[
    "Intel",
    "Mali",
    "Adreno",
    "PowerVR",
    "llvmpipe",
    "SwiftShader",
    "Software",
];

const MIN_CORES: usize = 4;
const MIN_MEMORY_GIB: f64 = 4.0;

/// Raw readings gathered from the host. Any field may be missing on
/// sandboxed or unsupported platforms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostSignals {
    /// Renderer string reported by a throwaway context. `None` means no
    /// context could be created at all.
    pub renderer: Option<String>,
    pub vendor: Option<String>,
    pub logical_cores: Option<usize>,
    pub device_memory_gib: Option<f64>,
}

/// Something that can read host signals. Implementations must clean up any
/// context they create before returning.
pub trait CapabilitySource {
    fn host_signals(&self) -> Result<HostSignals, String>;
}

/// Startup-time capability snapshot. Created once, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    pub tier: PerformanceTier,
    pub signals: HostSignals,
}

impl Capabilities {
    /// Probe the host and keep the signals around for diagnostics.
    pub fn detect(source: &dyn CapabilitySource) -> Self {
        match source.host_signals() {
            Ok(signals) => {
                let tier = classify(&signals);
                log::info!(
                    "Capability probe: renderer={:?} vendor={:?} cores={:?} memory_gib={:?} -> {}",
                    signals.renderer,
                    signals.vendor,
                    signals.logical_cores,
                    signals.device_memory_gib,
                    tier
                );
                Self { tier, signals }
            }
            Err(err) => {
                log::warn!("Capability probe failed ({err}); defaulting to Low tier");
                Self::default()
            }
        }
    }
}

/// Classify the host. Equivalent to `Capabilities::detect(source).tier`.
pub fn detect_tier(source: &dyn CapabilitySource) -> PerformanceTier {
    Capabilities::detect(source).tier
}

/// Pure classification of already-gathered signals.
pub fn classify(signals: &HostSignals) -> PerformanceTier {
    let Some(renderer) = signals.renderer.as_deref() else {
        return PerformanceTier::Low;
    };
    let vendor = signals.vendor.as_deref().unwrap_or("");

    let mut tier = if contains_any(renderer, HIGH_END_MARKERS) {
        PerformanceTier::High
    } else if contains_any(renderer, LOW_END_MARKERS) || contains_any(vendor, LOW_END_MARKERS) {
        PerformanceTier::Low
    } else {
        PerformanceTier::Medium
    };

    // Missing readings do not count against the host.
    if signals.logical_cores.is_some_and(|cores| cores < MIN_CORES) {
        tier = tier.downgrade();
    }
    if signals
        .device_memory_gib
        .is_some_and(|gib| gib < MIN_MEMORY_GIB)
    {
        tier = tier.downgrade();
    }
    tier
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Result<HostSignals, String>);

    impl CapabilitySource for FixedSource {
        fn host_signals(&self) -> Result<HostSignals, String> {
            self.0.clone()
        }
    }

    fn signals(renderer: &str, cores: usize, memory_gib: f64) -> HostSignals {
        HostSignals {
            renderer: Some(renderer.to_string()),
            vendor: None,
            logical_cores: Some(cores),
            device_memory_gib: Some(memory_gib),
        }
    }

    #[test]
    fn high_end_renderer_is_high() {
        let tier = classify(&signals("NVIDIA GeForce RTX 3080", 16, 32.0));
        assert_eq!(tier, PerformanceTier::High);
    }

    #[test]
    fn mobile_renderer_is_low() {
        assert_eq!(classify(&signals("Mali-G78", 8, 8.0)), PerformanceTier::Low);
        assert_eq!(
            classify(&signals("Intel(R) UHD Graphics 620", 8, 16.0)),
            PerformanceTier::Low
        );
    }

    #[test]
    fn unknown_renderer_is_medium() {
        let tier = classify(&signals("Apple M2", 8, 16.0));
        assert_eq!(tier, PerformanceTier::Medium);
    }

    #[test]
    fn few_cores_downgrades_one_level() {
        let tier = classify(&signals("GeForce GTX 1060", 2, 16.0));
        assert_eq!(tier, PerformanceTier::Medium);
    }

    #[test]
    fn few_cores_and_low_memory_downgrade_twice() {
        let tier = classify(&signals("GeForce GTX 1060", 2, 2.0));
        assert_eq!(tier, PerformanceTier::Low);
    }

    #[test]
    fn downgrades_saturate_at_low() {
        let tier = classify(&signals("Adreno 650", 2, 1.0));
        assert_eq!(tier, PerformanceTier::Low);
    }

    #[test]
    fn missing_renderer_is_low() {
        let tier = classify(&HostSignals {
            renderer: None,
            vendor: Some("NVIDIA".to_string()),
            logical_cores: Some(16),
            device_memory_gib: Some(32.0),
        });
        assert_eq!(tier, PerformanceTier::Low);
    }

    #[test]
    fn missing_core_and_memory_readings_do_not_downgrade() {
        let tier = classify(&HostSignals {
            renderer: Some("Radeon RX 6800".to_string()),
            vendor: None,
            logical_cores: None,
            device_memory_gib: None,
        });
        assert_eq!(tier, PerformanceTier::High);
    }

    #[test]
    fn software_vendor_is_low() {
        let tier = classify(&HostSignals {
            renderer: Some("Generic Adapter".to_string()),
            vendor: Some("llvmpipe".to_string()),
            logical_cores: Some(8),
            device_memory_gib: Some(8.0),
        });
        assert_eq!(tier, PerformanceTier::Low);
    }

    #[test]
    fn failing_source_defaults_to_low() {
        let source = FixedSource(Err("sandboxed".to_string()));
        assert_eq!(detect_tier(&source), PerformanceTier::Low);
        let caps = Capabilities::detect(&source);
        assert_eq!(caps.signals, HostSignals::default());
    }

    #[test]
    fn detect_keeps_signals_for_diagnostics() {
        let source = FixedSource(Ok(signals("GeForce RTX 4090", 24, 64.0)));
        let caps = Capabilities::detect(&source);
        assert_eq!(caps.tier, PerformanceTier::High);
        assert_eq!(caps.signals.logical_cores, Some(24));
    }
}
