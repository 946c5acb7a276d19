//! Process memory estimates.

use std::sync::{Mutex, PoisonError};

use sysinfo::{Pid, ProcessExt, System, SystemExt};
use tracing::warn;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of the process memory footprint, in megabytes.
pub trait MemoryProbe: Send + Sync {
    fn memory_mb(&self) -> f64;
}

/// Resident memory of the current process, read through `sysinfo`.
///
/// Reports 0.0 when the platform does not expose the process.
pub struct ProcessMemoryProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl ProcessMemoryProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(reason) => {
                warn!(reason, "Current process id unavailable; memory will read as zero");
                None
            }
        };
        Self {
            system: Mutex::new(System::new()),
            pid,
        }
    }
}

impl Default for ProcessMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessMemoryProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessMemoryProbe")
            .field("pid", &self.pid)
            .finish()
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn memory_mb(&self) -> f64 {
        let Some(pid) = self.pid else {
            return 0.0;
        };
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        if !system.refresh_process(pid) {
            return 0.0;
        }
        system
            .process(pid)
            .map(|process| process.memory() as f64 / BYTES_PER_MB)
            .unwrap_or(0.0)
    }
}
