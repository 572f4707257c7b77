use crate::error::{Error, Result};
use crate::types::MemorySnapshot;
use sysinfo::System;

/// Anything that can produce a fresh memory reading
pub trait MemorySource {
    /// Read current memory statistics. Never cached between calls.
    fn sample(&mut self) -> Result<MemorySnapshot>;
}

impl<T: MemorySource + ?Sized> MemorySource for &mut T {
    fn sample(&mut self) -> Result<MemorySnapshot> {
        (**self).sample()
    }
}

/// Physical memory of the host, read through sysinfo
pub struct SystemMemory {
    system: System,
}

impl SystemMemory {
    pub fn new() -> Result<Self> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(Error::Sampling(format!(
                "memory statistics are not available on {}",
                std::env::consts::OS
            )));
        }

        Ok(Self {
            system: System::new(),
        })
    }
}

impl MemorySource for SystemMemory {
    fn sample(&mut self) -> Result<MemorySnapshot> {
        self.system.refresh_memory();

        snapshot_from_readings(
            self.system.total_memory(),
            self.system.available_memory(),
            self.system.used_memory(),
        )
    }
}

/// Turn raw byte counts into a snapshot.
///
/// A zero total means the OS call failed silently and is an error.
pub fn snapshot_from_readings(total: u64, available: u64, used: u64) -> Result<MemorySnapshot> {
    if total == 0 {
        return Err(Error::Sampling(
            "OS reported zero total memory".to_string(),
        ));
    }

    Ok(MemorySnapshot::from_bytes(total, available, used))
}
