use crate::error::Error;
use crate::process::ProcessTable;
use crate::types::{ProcessCandidate, ProcessState};
use std::collections::HashSet;
use tracing::debug;

/// Pids the guardian must never terminate: itself and its parent
pub fn guardian_exclusions() -> HashSet<u32> {
    let mut pids = HashSet::new();
    pids.insert(std::process::id());

    let parent = nix::unistd::getppid().as_raw();
    if parent > 0 {
        pids.insert(parent as u32);
    }

    pids
}

/// Scan `table` for processes whose lowercase name contains one of
/// `target_names`, skipping `exclude_pids`.
///
/// Every call rescans from scratch. Vanished, unreadable and zombie entries
/// are skipped. The result is sorted by memory, largest first; equal memory
/// keeps table order.
pub fn enumerate<T: ProcessTable + ?Sized>(
    table: &mut T,
    target_names: &[String],
    exclude_pids: &HashSet<u32>,
) -> Vec<ProcessCandidate> {
    let targets: Vec<String> = target_names
        .iter()
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    if targets.is_empty() {
        return Vec::new();
    }

    let mut skipped = 0usize;
    let mut candidates: Vec<ProcessCandidate> = table
        .list()
        .into_iter()
        .filter_map(|row| match row {
            Ok(entry) => Some(entry),
            Err(Error::EnumerationRace(_)) => {
                skipped += 1;
                None
            }
            Err(e) => {
                debug!("Skipping unreadable process entry: {}", e);
                skipped += 1;
                None
            }
        })
        .filter(|entry| entry.state != ProcessState::Zombie)
        .filter(|entry| !exclude_pids.contains(&entry.pid))
        .filter(|entry| {
            let name = entry.name.to_lowercase();
            targets.iter().any(|target| name.contains(target.as_str()))
        })
        .map(ProcessCandidate::from_entry)
        .collect();

    // sort_by is stable
    candidates.sort_by(|a, b| b.memory_bytes.cmp(&a.memory_bytes));

    if skipped > 0 {
        debug!("Skipped {} process entries that changed during the scan", skipped);
    }

    candidates
}

/// Enumerator bound to a target list, always excluding the guardian itself
#[derive(Debug, Clone)]
pub struct ProcessScanner {
    target_names: Vec<String>,
    exclude_pids: HashSet<u32>,
}

impl ProcessScanner {
    pub fn new<I, S>(target_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target_names: target_names.into_iter().map(Into::into).collect(),
            exclude_pids: guardian_exclusions(),
        }
    }

    /// Protect another pid in addition to the guardian and its parent
    pub fn exclude(mut self, pid: u32) -> Self {
        self.exclude_pids.insert(pid);
        self
    }

    pub fn excluded(&self) -> &HashSet<u32> {
        &self.exclude_pids
    }

    pub fn scan<T: ProcessTable + ?Sized>(&self, table: &mut T) -> Vec<ProcessCandidate> {
        enumerate(table, &self.target_names, &self.exclude_pids)
    }
}
