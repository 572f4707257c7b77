use crate::error::{Error, Result};
use crate::types::{ProcessEntry, ProcessState};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid as NixPid;
use sysinfo::{Pid, ProcessStatus, System};

/// Read and signal access to the OS process table.
///
/// Implementations convert every platform failure into [`Error`]; raw
/// errno values never leave the adapter.
pub trait ProcessTable {
    /// Snapshot of every process. Rows that vanished or could not be read
    /// while listing come back as [`Error::EnumerationRace`].
    fn list(&mut self) -> Vec<Result<ProcessEntry>>;

    /// Whether `pid` is still running (zombies count as gone)
    fn is_alive(&mut self, pid: u32) -> Result<bool>;

    /// Graceful termination request (SIGTERM)
    fn terminate(&mut self, pid: u32) -> Result<()>;

    /// Forceful kill (SIGKILL)
    fn kill(&mut self, pid: u32) -> Result<()>;
}

impl<T: ProcessTable + ?Sized> ProcessTable for &mut T {
    fn list(&mut self) -> Vec<Result<ProcessEntry>> {
        (**self).list()
    }

    fn is_alive(&mut self, pid: u32) -> Result<bool> {
        (**self).is_alive(pid)
    }

    fn terminate(&mut self, pid: u32) -> Result<()> {
        (**self).terminate(pid)
    }

    fn kill(&mut self, pid: u32) -> Result<()> {
        (**self).kill(pid)
    }
}

/// Live process table: sysinfo for listing, POSIX signals for the rest
pub struct SystemProcessTable {
    system: System,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// pid 0 and negative pids address process groups in kill(2)
    fn signal_target(pid: u32) -> Result<NixPid> {
        if pid == 0 || pid > i32::MAX as u32 {
            return Err(Error::Other(format!("refusing to signal invalid pid {}", pid)));
        }
        Ok(NixPid::from_raw(pid as i32))
    }

    fn send(&self, pid: u32, signal: Signal) -> Result<()> {
        let target = Self::signal_target(pid)?;

        match kill(target, signal) {
            Ok(()) => Ok(()),
            // Exited between the liveness probe and the signal
            Err(Errno::ESRCH) => Ok(()),
            Err(Errno::EPERM) => Err(Error::AccessDenied(pid)),
            Err(e) => Err(Error::Other(format!(
                "Failed to send {:?} to process {}: {}",
                signal, pid, e
            ))),
        }
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn list(&mut self) -> Vec<Result<ProcessEntry>> {
        self.system.refresh_processes();

        let processes = self.system.processes();
        let mut pids: Vec<&Pid> = processes.keys().collect();
        pids.sort_unstable_by_key(|pid| pid.as_u32());

        pids.into_iter()
            .filter_map(|pid| processes.get(pid))
            .map(|process| {
                let pid = process.pid().as_u32();
                if matches!(process.status(), ProcessStatus::Dead) {
                    return Err(Error::EnumerationRace(pid));
                }
                match is_thread(pid) {
                    Some(false) => {}
                    Some(true) | None => return Err(Error::EnumerationRace(pid)),
                }

                Ok(ProcessEntry {
                    pid,
                    name: process.name().to_string(),
                    memory_bytes: process.memory(),
                    state: map_status(process.status()),
                    cmd: process.cmd().to_vec(),
                })
            })
            .collect()
    }

    fn is_alive(&mut self, pid: u32) -> Result<bool> {
        let target = Self::signal_target(pid)?;

        match kill(target, None) {
            Ok(()) => {}
            // No permission, but the process exists
            Err(Errno::EPERM) => {}
            Err(Errno::ESRCH) => return Ok(false),
            Err(e) => {
                return Err(Error::Other(format!(
                    "Failed to check process {}: {}",
                    pid, e
                )))
            }
        }

        // kill(pid, 0) succeeds on unreaped zombies
        let pid = Pid::from_u32(pid);
        if self.system.refresh_process(pid) {
            if let Some(process) = self.system.process(pid) {
                return Ok(!matches!(
                    process.status(),
                    ProcessStatus::Zombie | ProcessStatus::Dead
                ));
            }
        }

        Ok(true)
    }

    fn terminate(&mut self, pid: u32) -> Result<()> {
        self.send(pid, Signal::SIGTERM)
    }

    fn kill(&mut self, pid: u32) -> Result<()> {
        self.send(pid, Signal::SIGKILL)
    }
}

/// Linux lists threads next to processes; a thread's Tgid differs from its pid.
/// `None` when the task disappeared before it could be read.
#[cfg(target_os = "linux")]
fn is_thread(pid: u32) -> Option<bool> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    let tgid = status
        .lines()
        .find_map(|line| line.strip_prefix("Tgid:"))
        .and_then(|value| value.trim().parse::<u32>().ok())?;
    Some(tgid != pid)
}

#[cfg(not(target_os = "linux"))]
fn is_thread(_pid: u32) -> Option<bool> {
    Some(false)
}

fn map_status(status: ProcessStatus) -> ProcessState {
    match status {
        ProcessStatus::Run => ProcessState::Running,
        ProcessStatus::Sleep | ProcessStatus::Idle => ProcessState::Sleeping,
        ProcessStatus::Stop | ProcessStatus::Tracing => ProcessState::Stopped,
        ProcessStatus::Zombie => ProcessState::Zombie,
        other => ProcessState::Unknown(other.to_string().to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_contains_current_process() {
        let mut table = SystemProcessTable::new();
        let own = std::process::id();

        let found = table
            .list()
            .into_iter()
            .filter_map(|row| row.ok())
            .any(|entry| entry.pid == own);
        assert!(found);
    }

    #[test]
    fn test_list_is_sorted_by_pid() {
        let mut table = SystemProcessTable::new();
        let pids: Vec<u32> = table
            .list()
            .into_iter()
            .filter_map(|row| row.ok())
            .map(|entry| entry.pid)
            .collect();

        assert!(pids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_is_alive_current_process() {
        let mut table = SystemProcessTable::new();
        assert!(table.is_alive(std::process::id()).unwrap());
    }

    #[test]
    fn test_is_alive_missing_pid() {
        // PID 999999 most likely doesn't exist
        let mut table = SystemProcessTable::new();
        assert!(!table.is_alive(999_999).unwrap_or(true));
    }

    #[test]
    fn test_refuses_pid_zero() {
        let mut table = SystemProcessTable::new();
        assert!(matches!(table.terminate(0), Err(Error::Other(_))));
        assert!(matches!(table.kill(0), Err(Error::Other(_))));
        assert!(table.is_alive(0).is_err());
    }

    #[test]
    fn test_signal_to_missing_pid_is_ok() {
        let mut table = SystemProcessTable::new();
        assert!(table.terminate(999_999).is_ok());
    }

    #[test]
    fn test_current_process_is_not_thread() {
        assert_eq!(is_thread(std::process::id()), Some(false));
    }

    #[test]
    fn test_map_status() {
        assert_eq!(map_status(ProcessStatus::Run), ProcessState::Running);
        assert_eq!(map_status(ProcessStatus::Sleep), ProcessState::Sleeping);
        assert_eq!(map_status(ProcessStatus::Zombie), ProcessState::Zombie);
        assert_eq!(map_status(ProcessStatus::Stop), ProcessState::Stopped);
    }
}
