//! `sysinfo`-backed memory readings for the diagnostics monitor.

use folio_core::memory::{MemoryReport, MemorySource};
use sysinfo::{Pid, ProcessesToUpdate, System};

pub struct SysinfoMemorySource {
    system: System,
    pid: Option<Pid>,
}

impl SysinfoMemorySource {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                log::warn!("Process id unavailable ({e}); reporting system memory only");
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }
}

impl Default for SysinfoMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource for SysinfoMemorySource {
    fn read_memory(&mut self) -> Result<MemoryReport, String> {
        self.system.refresh_memory();
        let total_bytes = self.system.total_memory();
        if total_bytes == 0 {
            return Err("total memory not reported".to_string());
        }

        let process_bytes = match self.pid {
            Some(pid) => {
                self.system
                    .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                self.system.process(pid).map(|p| p.memory())
            }
            None => None,
        };

        Ok(MemoryReport {
            process_bytes,
            used_bytes: self.system.used_memory(),
            total_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_host_memory() {
        let mut source = SysinfoMemorySource::new();
        let report = source.read_memory().expect("host reports memory");
        assert!(report.total_bytes > 0);
        assert!(report.used_bytes <= report.total_bytes);
    }
}
