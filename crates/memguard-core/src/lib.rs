//! memguard Core Library
//!
//! Core library for memguard - a memory guardian for development machines.
//! Provides memory sampling, alert level classification, process enumeration,
//! and a bounded two-phase process termination protocol.

pub mod clock;
pub mod error;
pub mod executor;
pub mod level;
pub mod memory;
pub mod process;
pub mod scanner;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use executor::{ProcessExecutor, Progress, Termination, TerminationPolicy};
pub use level::{classify, AlertLevel, Thresholds};
pub use memory::{MemorySource, SystemMemory};
pub use process::{ProcessTable, SystemProcessTable};
pub use scanner::{enumerate, guardian_exclusions, ProcessScanner};
pub use types::{
    MemorySnapshot, ProcessCandidate, ProcessEntry, ProcessKind, ProcessState,
    TerminationOutcome, TerminationReason,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
