//! Periodic memory sampling for diagnostics.
//!
//! Readings come from a `MemorySource` (the `sysinfo` one lives in
//! `folio_platform`). The monitor samples once on its first tick and then
//! every `interval_secs` of frame time, so it costs nothing between samples.

pub const DEFAULT_MEMORY_INTERVAL_SECS: f64 = 5.0;

const BYTES_PER_MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoryReport {
    /// Resident size of this process, when the platform reports it.
    pub process_bytes: Option<u64>,
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl MemoryReport {
    pub fn process_mib(&self) -> Option<u64> {
        self.process_bytes.map(|b| b / BYTES_PER_MIB)
    }

    pub fn used_mib(&self) -> u64 {
        self.used_bytes / BYTES_PER_MIB
    }

    pub fn total_mib(&self) -> u64 {
        self.total_bytes / BYTES_PER_MIB
    }

    /// Share of system memory in use, in `[0, 1]`.
    pub fn used_fraction(&self) -> f32 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.used_bytes as f64 / self.total_bytes as f64).clamp(0.0, 1.0) as f32
        }
    }
}

pub trait MemorySource {
    fn read_memory(&mut self) -> Result<MemoryReport, String>;
}

pub struct MemoryMonitor {
    interval_secs: f64,
    until_next: f64,
    latest: Option<MemoryReport>,
    peak_process_bytes: u64,
    sample_count: u64,
    failing: bool,
}

impl MemoryMonitor {
    pub fn new(interval_secs: f64) -> Self {
        Self {
            interval_secs: sanitize_interval(interval_secs),
            until_next: 0.0,
            latest: None,
            peak_process_bytes: 0,
            sample_count: 0,
            failing: false,
        }
    }

    /// Takes effect after the next sample.
    pub fn set_interval(&mut self, interval_secs: f64) {
        self.interval_secs = sanitize_interval(interval_secs);
        self.until_next = self.until_next.min(self.interval_secs);
    }

    pub fn interval_secs(&self) -> f64 {
        self.interval_secs
    }

    pub fn latest(&self) -> Option<MemoryReport> {
        self.latest
    }

    pub fn peak_process_bytes(&self) -> u64 {
        self.peak_process_bytes
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Advance by `dt` seconds and sample when the interval has elapsed.
    /// Returns the new report, if one was taken.
    pub fn tick(&mut self, dt: f64, source: &mut dyn MemorySource) -> Option<MemoryReport> {
        if dt.is_finite() && dt > 0.0 {
            self.until_next -= dt;
        }
        if self.until_next > 0.0 {
            return None;
        }
        self.until_next = self.interval_secs;

        match source.read_memory() {
            Ok(report) => {
                if self.failing {
                    log::info!("Memory readings available again");
                    self.failing = false;
                }
                self.sample_count += 1;
                if let Some(bytes) = report.process_bytes {
                    self.peak_process_bytes = self.peak_process_bytes.max(bytes);
                }
                self.latest = Some(report);
                log::trace!(
                    "Memory: process {:?} MiB, system {}/{} MiB",
                    report.process_mib(),
                    report.used_mib(),
                    report.total_mib()
                );
                Some(report)
            }
            Err(err) => {
                // Warn on the first failure only; the source is polled forever.
                if !self.failing {
                    log::warn!("Memory reading failed: {err}");
                    self.failing = true;
                }
                None
            }
        }
    }
}

impl Default for MemoryMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_INTERVAL_SECS)
    }
}

fn sanitize_interval(interval_secs: f64) -> f64 {
    if interval_secs.is_finite() && interval_secs > 0.0 {
        interval_secs
    } else {
        DEFAULT_MEMORY_INTERVAL_SECS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    struct FakeSource {
        reads: u32,
        process_mib: Vec<u64>,
        fail: bool,
    }

    impl FakeSource {
        fn new(process_mib: &[u64]) -> Self {
            Self {
                reads: 0,
                process_mib: process_mib.to_vec(),
                fail: false,
            }
        }
    }

    impl MemorySource for FakeSource {
        fn read_memory(&mut self) -> Result<MemoryReport, String> {
            if self.fail {
                return Err("unsupported".to_string());
            }
            let i = (self.reads as usize).min(self.process_mib.len() - 1);
            self.reads += 1;
            Ok(MemoryReport {
                process_bytes: Some(self.process_mib[i] * MIB),
                used_bytes: 4096 * MIB,
                total_bytes: 16384 * MIB,
            })
        }
    }

    #[test]
    fn first_tick_samples_immediately() {
        let mut monitor = MemoryMonitor::default();
        let mut source = FakeSource::new(&[100]);
        let report = monitor.tick(0.016, &mut source).expect("sampled");
        assert_eq!(report.process_mib(), Some(100));
        assert_eq!(monitor.sample_count(), 1);
    }

    #[test]
    fn samples_once_per_interval() {
        let mut monitor = MemoryMonitor::new(5.0);
        let mut source = FakeSource::new(&[100]);
        monitor.tick(0.0, &mut source);
        for _ in 0..299 {
            assert!(monitor.tick(1.0 / 60.0, &mut source).is_none());
        }
        assert!(monitor.tick(0.1, &mut source).is_some());
        assert_eq!(source.reads, 2);
    }

    #[test]
    fn peak_tracks_largest_process_size() {
        let mut monitor = MemoryMonitor::new(1.0);
        let mut source = FakeSource::new(&[100, 300, 200]);
        for _ in 0..3 {
            monitor.tick(1.0, &mut source);
        }
        assert_eq!(monitor.peak_process_bytes(), 300 * MIB);
        assert_eq!(monitor.latest().and_then(|r| r.process_mib()), Some(200));
    }

    #[test]
    fn failures_keep_last_report() {
        let mut monitor = MemoryMonitor::new(1.0);
        let mut source = FakeSource::new(&[100]);
        monitor.tick(0.0, &mut source);
        source.fail = true;
        assert!(monitor.tick(1.0, &mut source).is_none());
        assert_eq!(monitor.latest().and_then(|r| r.process_mib()), Some(100));
        assert_eq!(monitor.sample_count(), 1);
    }

    #[test]
    fn bad_intervals_and_deltas_are_ignored() {
        let mut monitor = MemoryMonitor::new(f64::NAN);
        assert_eq!(monitor.interval_secs(), DEFAULT_MEMORY_INTERVAL_SECS);
        monitor.set_interval(-1.0);
        assert_eq!(monitor.interval_secs(), DEFAULT_MEMORY_INTERVAL_SECS);

        let mut source = FakeSource::new(&[100]);
        monitor.tick(0.0, &mut source);
        assert!(monitor.tick(f64::INFINITY, &mut source).is_none());
        assert!(monitor.tick(-10.0, &mut source).is_none());
    }

    #[test]
    fn used_fraction_handles_missing_total() {
        assert_eq!(MemoryReport::default().used_fraction(), 0.0);
        let report = MemoryReport {
            process_bytes: None,
            used_bytes: 4 * MIB,
            total_bytes: 16 * MIB,
        };
        assert!((report.used_fraction() - 0.25).abs() < 1e-6);
        assert_eq!(report.process_mib(), None);
    }
}
