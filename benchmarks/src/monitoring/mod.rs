//! Memory monitoring for benchmark trials

pub mod memory_monitor;

pub use memory_monitor::{MemoryMonitor, MemoryUsage};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Something that can report the current used memory
pub trait MemorySource: Send + 'static {
    /// Used memory in gigabytes
    fn used_gb(&mut self) -> f64;
}

impl<F> MemorySource for F
where
    F: FnMut() -> f64 + Send + 'static,
{
    fn used_gb(&mut self) -> f64 {
        self()
    }
}

/// System-wide used memory as reported by the OS
pub struct SystemMemory {
    system: sysinfo::System,
}

impl SystemMemory {
    pub fn new() -> Self {
        Self {
            system: sysinfo::System::new(),
        }
    }
}

impl Default for SystemMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource for SystemMemory {
    fn used_gb(&mut self) -> f64 {
        self.system.refresh_memory();
        self.system.used_memory() as f64 / BYTES_PER_GB
    }
}

/// Total physical memory in bytes
pub fn total_memory_bytes() -> u64 {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    system.total_memory()
}
