//! Host capability readings from a throwaway wgpu adapter plus `sysinfo`.

use folio_core::probe::{CapabilitySource, HostSignals};
use sysinfo::System;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Requests an adapter without a surface, reads its info, and drops it
/// before returning.
#[derive(Debug, Default)]
pub struct WgpuCapabilitySource;

impl CapabilitySource for WgpuCapabilitySource {
    fn host_signals(&self) -> Result<HostSignals, String> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }));

        let (renderer, vendor) = match adapter {
            Some(adapter) => {
                let info = adapter.get_info();
                log::debug!(
                    "Probe adapter: {} ({:?}, {:?}, vendor {:#06x})",
                    info.name,
                    info.device_type,
                    info.backend,
                    info.vendor
                );
                let renderer = if info.device_type == wgpu::DeviceType::Cpu {
                    format!("Software ({})", info.name)
                } else {
                    info.name.clone()
                };
                (Some(renderer), vendor_name(info.vendor).map(str::to_string))
            }
            None => (None, None),
        };

        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu_all();
        let logical_cores = match system.cpus().len() {
            0 => None,
            n => Some(n),
        };
        let device_memory_gib = match system.total_memory() {
            0 => None,
            bytes => Some(bytes as f64 / BYTES_PER_GIB),
        };

        Ok(HostSignals {
            renderer,
            vendor,
            logical_cores,
            device_memory_gib,
        })
    }
}

/// PCI vendor ids of the GPU makers the classifier knows about.
fn vendor_name(id: u32) -> Option<&'static str> {
    match id {
        0x10de => Some("NVIDIA"),
        0x1002 => Some("AMD"),
        0x8086 => Some("Intel"),
        0x13b5 => Some("ARM Mali"),
        0x5143 => Some("Qualcomm Adreno"),
        0x1010 => Some("Imagination PowerVR"),
        0x106b => Some("Apple"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::probe::classify;
    use folio_core::tier::PerformanceTier;

    #[test]
    fn integrated_vendor_classifies_low() {
        let signals = HostSignals {
            renderer: Some("Generic GPU".to_string()),
            vendor: vendor_name(0x8086).map(str::to_string),
            logical_cores: Some(8),
            device_memory_gib: Some(16.0),
        };
        assert_eq!(classify(&signals), PerformanceTier::Low);
    }

    #[test]
    fn unknown_vendor_has_no_name() {
        assert_eq!(vendor_name(0xdead), None);
        assert_eq!(vendor_name(0x10de), Some("NVIDIA"));
    }
}
