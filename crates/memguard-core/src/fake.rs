//! In-memory process table for tests.
//!
//! Enabled for this crate's own tests and, for downstream crates, through the
//! `test-util` feature.

use crate::clock::{Clock, ManualClock};
use crate::error::{Error, Result};
use crate::process::ProcessTable;
use crate::types::{ProcessEntry, ProcessState};
use std::time::{Duration, Instant};

/// How a fake process reacts to signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Exits as soon as SIGTERM arrives
    ExitOnTerm,
    /// Exits this long after SIGTERM (needs a clock)
    ExitAfterTerm(Duration),
    /// Only SIGKILL stops it
    IgnoreTerm,
    /// Nothing stops it
    Unkillable,
    /// Every signal fails with EPERM
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentSignal {
    Terminate(u32),
    Kill(u32),
}

#[derive(Debug, Clone)]
struct FakeProcess {
    entry: ProcessEntry,
    behavior: Behavior,
    alive: bool,
    exits_at: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct FakeProcessTable {
    processes: Vec<FakeProcess>,
    races: Vec<u32>,
    clock: Option<ManualClock>,
    signals: Vec<SentSignal>,
}

impl FakeProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: ManualClock) -> Self {
        Self {
            clock: Some(clock),
            ..Self::default()
        }
    }

    /// Add a sleeping process that exits on SIGTERM
    pub fn spawn(&mut self, pid: u32, name: &str, memory_bytes: u64) -> &mut Self {
        self.spawn_with(
            ProcessEntry {
                pid,
                name: name.to_string(),
                memory_bytes,
                state: ProcessState::Sleeping,
                cmd: vec![name.to_string()],
            },
            Behavior::ExitOnTerm,
        )
    }

    pub fn spawn_with(&mut self, entry: ProcessEntry, behavior: Behavior) -> &mut Self {
        self.processes.push(FakeProcess {
            entry,
            behavior,
            alive: true,
            exits_at: None,
        });
        self
    }

    /// Make the next listings report `pid` as having vanished mid-scan
    pub fn add_race(&mut self, pid: u32) -> &mut Self {
        self.races.push(pid);
        self
    }

    pub fn signals(&self) -> &[SentSignal] {
        &self.signals
    }

    pub fn is_running(&mut self, pid: u32) -> bool {
        self.is_alive(pid).unwrap_or(false)
    }

    fn now(&self) -> Option<Instant> {
        self.clock.as_ref().map(|clock| clock.now())
    }

    fn find(&mut self, pid: u32) -> Option<&mut FakeProcess> {
        self.processes.iter_mut().find(|p| p.entry.pid == pid)
    }
}

impl ProcessTable for FakeProcessTable {
    fn list(&mut self) -> Vec<Result<ProcessEntry>> {
        let now = self.now();
        let mut rows: Vec<Result<ProcessEntry>> = self
            .processes
            .iter()
            .filter(|p| p.alive && !p.exits_at.zip(now).map_or(false, |(at, now)| now >= at))
            .map(|p| Ok(p.entry.clone()))
            .collect();

        rows.extend(self.races.iter().map(|pid| Err(Error::EnumerationRace(*pid))));
        rows
    }

    fn is_alive(&mut self, pid: u32) -> Result<bool> {
        let now = self.now();
        let Some(process) = self.find(pid) else {
            return Ok(false);
        };

        if let (Some(at), Some(now)) = (process.exits_at, now) {
            if now >= at {
                process.alive = false;
            }
        }

        Ok(process.alive && process.entry.state != ProcessState::Zombie)
    }

    fn terminate(&mut self, pid: u32) -> Result<()> {
        let now = self.now();
        self.signals.push(SentSignal::Terminate(pid));

        let Some(process) = self.find(pid) else {
            return Ok(());
        };

        match process.behavior {
            Behavior::ExitOnTerm => process.alive = false,
            Behavior::ExitAfterTerm(delay) => match now {
                Some(now) => process.exits_at = Some(now + delay),
                None => process.alive = false,
            },
            Behavior::IgnoreTerm | Behavior::Unkillable => {}
            Behavior::Denied => return Err(Error::AccessDenied(pid)),
        }

        Ok(())
    }

    fn kill(&mut self, pid: u32) -> Result<()> {
        self.signals.push(SentSignal::Kill(pid));

        let Some(process) = self.find(pid) else {
            return Ok(());
        };

        match process.behavior {
            Behavior::Unkillable => {}
            Behavior::Denied => return Err(Error::AccessDenied(pid)),
            _ => process.alive = false,
        }

        Ok(())
    }
}
