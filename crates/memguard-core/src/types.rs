use serde::{Deserialize, Serialize};
use std::fmt;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Point-in-time reading of system-wide physical memory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub used_percent: f64,
    pub available_bytes: u64,
    pub total_bytes: u64,
    pub used_bytes: u64,
}

impl MemorySnapshot {
    /// Build a snapshot from raw byte counts.
    ///
    /// Usage is `(total - available) / total`, clamped to `[0, 100]`.
    /// Callers must reject `total == 0` before getting here.
    pub fn from_bytes(total_bytes: u64, available_bytes: u64, used_bytes: u64) -> Self {
        let available = available_bytes.min(total_bytes);
        let used_percent = if total_bytes > 0 {
            ((total_bytes - available) as f64 / total_bytes as f64 * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        Self {
            used_percent,
            available_bytes: available,
            total_bytes,
            used_bytes,
        }
    }

    pub fn available_gb(&self) -> f64 {
        self.available_bytes as f64 / BYTES_PER_GB
    }

    pub fn total_gb(&self) -> f64 {
        self.total_bytes as f64 / BYTES_PER_GB
    }

    pub fn used_gb(&self) -> f64 {
        self.used_bytes as f64 / BYTES_PER_GB
    }
}

/// Runtime family of a candidate process, derived from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessKind {
    Python,
    NodeJS,
    Other,
}

impl ProcessKind {
    pub fn from_name(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.contains("python") {
            ProcessKind::Python
        } else if name.contains("node") {
            ProcessKind::NodeJS
        } else {
            ProcessKind::Other
        }
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessKind::Python => write!(f, "Python"),
            ProcessKind::NodeJS => write!(f, "Node.js"),
            ProcessKind::Other => write!(f, "Other"),
        }
    }
}

/// Scheduler state as reported by the process table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    Running,
    Sleeping,
    Stopped,
    Zombie,
    Unknown(String),
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Running => write!(f, "running"),
            ProcessState::Sleeping => write!(f, "sleeping"),
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Zombie => write!(f, "zombie"),
            ProcessState::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// Raw row from a process table listing
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub memory_bytes: u64,
    pub state: ProcessState,
    pub cmd: Vec<String>,
}

/// A live process eligible for operator-initiated termination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessCandidate {
    pub pid: u32,
    pub name: String,
    pub kind: ProcessKind,
    pub memory_bytes: u64,
    pub status: ProcessState,
    pub command_summary: String,
}

impl ProcessCandidate {
    pub fn from_entry(entry: ProcessEntry) -> Self {
        Self {
            pid: entry.pid,
            kind: ProcessKind::from_name(&entry.name),
            command_summary: summarize_command(&entry.cmd),
            name: entry.name,
            memory_bytes: entry.memory_bytes,
            status: entry.state,
        }
    }

    pub fn memory_mb(&self) -> f64 {
        self.memory_bytes as f64 / BYTES_PER_MB
    }
}

/// First three argv entries, capped at 60 chars
fn summarize_command(cmd: &[String]) -> String {
    if cmd.is_empty() {
        return "N/A".to_string();
    }

    let joined = cmd.iter().take(3).map(String::as_str).collect::<Vec<_>>().join(" ");
    if joined.chars().count() > 60 {
        let head: String = joined.chars().take(57).collect();
        format!("{}...", head)
    } else {
        joined
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Exited within the graceful window
    Exited,
    /// Needed the forceful kill
    Killed,
    AlreadyGone,
    AccessDenied,
    /// Survived both the graceful and the forceful window
    TimedOut,
    Other(String),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Exited => write!(f, "exited after graceful request"),
            TerminationReason::Killed => write!(f, "killed after graceful timeout"),
            TerminationReason::AlreadyGone => write!(f, "already terminated"),
            TerminationReason::AccessDenied => write!(f, "access denied"),
            TerminationReason::TimedOut => write!(f, "still alive after forceful kill"),
            TerminationReason::Other(detail) => write!(f, "{}", detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationOutcome {
    pub pid: u32,
    pub succeeded: bool,
    pub reason: TerminationReason,
}

impl TerminationOutcome {
    pub fn success(pid: u32, reason: TerminationReason) -> Self {
        Self {
            pid,
            succeeded: true,
            reason,
        }
    }

    pub fn failure(pid: u32, reason: TerminationReason) -> Self {
        Self {
            pid,
            succeeded: false,
            reason,
        }
    }
}
