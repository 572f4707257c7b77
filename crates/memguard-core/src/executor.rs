use crate::clock::{Clock, SystemClock};
use crate::error::Error;
use crate::process::ProcessTable;
use crate::types::{TerminationOutcome, TerminationReason};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Timing of the graceful → forceful escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    /// How long to wait after SIGTERM before escalating
    pub graceful_timeout: Duration,
    /// Extra time allowed after the graceful window before giving up
    pub forceful_timeout: Duration,
    /// Liveness re-check period while waiting
    pub poll_interval: Duration,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            graceful_timeout: Duration::from_secs(5),
            forceful_timeout: Duration::from_secs(3),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Probe,
    Graceful { deadline: Instant },
    Forceful { deadline: Instant },
    Done(TerminationOutcome),
}

/// Result of advancing a [`Termination`] by one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Still waiting on the process; check again later
    Pending,
    Finished(TerminationOutcome),
}

/// Timed state machine for terminating one process.
///
/// ```text
/// Probe ──gone──────────────────────────────▶ Done(AlreadyGone)
///   │ SIGTERM
///   ▼
/// Graceful ──exited─────────────────────────▶ Done(Exited)
///   │ deadline passed, SIGKILL
///   ▼
/// Forceful ──exited─▶ Done(Killed)   deadline passed ─▶ Done(TimedOut)
/// ```
///
/// The machine never sleeps; the caller supplies `now` on every step. Both
/// deadlines are fixed from the first step, so the whole protocol ends by
/// `start + graceful_timeout + forceful_timeout` however late a step runs.
#[derive(Debug, Clone)]
pub struct Termination {
    pid: u32,
    policy: TerminationPolicy,
    phase: Phase,
}

impl Termination {
    pub fn new(pid: u32, policy: TerminationPolicy) -> Self {
        Self {
            pid,
            policy,
            phase: Phase::Probe,
        }
    }

    /// Deadline of the current waiting phase, if any
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Graceful { deadline } | Phase::Forceful { deadline } => Some(deadline),
            _ => None,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Done(_))
    }

    /// Whether SIGKILL has been sent
    pub fn escalated(&self) -> bool {
        match &self.phase {
            Phase::Forceful { .. } => true,
            Phase::Done(outcome) => matches!(
                outcome.reason,
                TerminationReason::Killed | TerminationReason::TimedOut
            ),
            _ => false,
        }
    }

    pub fn advance<T: ProcessTable + ?Sized>(&mut self, table: &mut T, now: Instant) -> Progress {
        let next = match &self.phase {
            Phase::Done(outcome) => return Progress::Finished(outcome.clone()),
            Phase::Probe => self.probe(table, now),
            Phase::Graceful { deadline } => self.wait_graceful(table, now, *deadline),
            Phase::Forceful { deadline } => self.wait_forceful(table, now, *deadline),
        };

        self.phase = next;
        match &self.phase {
            Phase::Done(outcome) => Progress::Finished(outcome.clone()),
            _ => Progress::Pending,
        }
    }

    fn probe<T: ProcessTable + ?Sized>(&self, table: &mut T, now: Instant) -> Phase {
        match table.is_alive(self.pid) {
            Ok(false) => {
                return self.done(TerminationOutcome::success(
                    self.pid,
                    TerminationReason::AlreadyGone,
                ))
            }
            Ok(true) => {}
            Err(e) => return self.fail(e),
        }

        debug!("Sending SIGTERM to process {}", self.pid);
        match table.terminate(self.pid) {
            Ok(()) => Phase::Graceful {
                deadline: now + self.policy.graceful_timeout,
            },
            Err(e) => self.fail(e),
        }
    }

    fn wait_graceful<T: ProcessTable + ?Sized>(
        &self,
        table: &mut T,
        now: Instant,
        deadline: Instant,
    ) -> Phase {
        match table.is_alive(self.pid) {
            Ok(false) => {
                return self.done(TerminationOutcome::success(self.pid, TerminationReason::Exited))
            }
            Ok(true) if now < deadline => return Phase::Graceful { deadline },
            Ok(true) => {}
            Err(e) => return self.fail(e),
        }

        warn!(
            "Process {} ignored SIGTERM for {:?}, sending SIGKILL",
            self.pid, self.policy.graceful_timeout
        );
        match table.kill(self.pid) {
            Ok(()) => Phase::Forceful {
                deadline: deadline + self.policy.forceful_timeout,
            },
            Err(e) => self.fail(e),
        }
    }

    fn wait_forceful<T: ProcessTable + ?Sized>(
        &self,
        table: &mut T,
        now: Instant,
        deadline: Instant,
    ) -> Phase {
        match table.is_alive(self.pid) {
            Ok(false) => self.done(TerminationOutcome::success(self.pid, TerminationReason::Killed)),
            Ok(true) if now < deadline => Phase::Forceful { deadline },
            Ok(true) => self.done(TerminationOutcome::failure(
                self.pid,
                TerminationReason::TimedOut,
            )),
            Err(e) => self.fail(e),
        }
    }

    fn done(&self, outcome: TerminationOutcome) -> Phase {
        Phase::Done(outcome)
    }

    fn fail(&self, error: Error) -> Phase {
        let reason = match error {
            Error::AccessDenied(_) => TerminationReason::AccessDenied,
            other => TerminationReason::Other(other.to_string()),
        };
        Phase::Done(TerminationOutcome::failure(self.pid, reason))
    }
}

/// Drives [`Termination`] machines to completion against a clock
pub struct ProcessExecutor<C: Clock = SystemClock> {
    clock: C,
    policy: TerminationPolicy,
}

impl ProcessExecutor<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for ProcessExecutor<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> ProcessExecutor<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            policy: TerminationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TerminationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &TerminationPolicy {
        &self.policy
    }

    /// Terminate `pid`, blocking for at most the graceful plus forceful bound.
    ///
    /// "Already gone" counts as success, so calling this twice is harmless.
    pub fn terminate<T: ProcessTable + ?Sized>(&self, table: &mut T, pid: u32) -> TerminationOutcome {
        let mut machine = Termination::new(pid, self.policy);

        loop {
            let now = self.clock.now();
            match machine.advance(table, now) {
                Progress::Finished(outcome) => return outcome,
                Progress::Pending => {
                    // Never sleep past the phase deadline
                    let pause = machine.deadline().map_or(self.policy.poll_interval, |deadline| {
                        self.policy
                            .poll_interval
                            .min(deadline.saturating_duration_since(now))
                    });
                    self.clock.sleep(pause);
                }
            }
        }
    }

    /// Terminate each pid in order; each gets its own independent bounds
    pub fn terminate_all<T, I>(&self, table: &mut T, pids: I) -> Vec<TerminationOutcome>
    where
        T: ProcessTable + ?Sized,
        I: IntoIterator<Item = u32>,
    {
        pids.into_iter()
            .map(|pid| self.terminate(table, pid))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::fake::{Behavior, FakeProcessTable, SentSignal};
    use crate::types::{ProcessEntry, ProcessState};

    fn entry(pid: u32) -> ProcessEntry {
        ProcessEntry {
            pid,
            name: "node".into(),
            memory_bytes: 1024,
            state: ProcessState::Running,
            cmd: vec!["node".into(), "server.js".into()],
        }
    }

    fn setup(behavior: Behavior) -> (ManualClock, FakeProcessTable, ProcessExecutor<ManualClock>) {
        let clock = ManualClock::new();
        let mut table = FakeProcessTable::with_clock(clock.clone());
        table.spawn_with(entry(42), behavior);
        let executor = ProcessExecutor::with_clock(clock.clone());
        (clock, table, executor)
    }

    #[test]
    fn test_graceful_exit() {
        let (clock, mut table, executor) = setup(Behavior::ExitOnTerm);

        let outcome = executor.terminate(&mut table, 42);

        assert!(outcome.succeeded);
        assert_eq!(outcome.reason, TerminationReason::Exited);
        assert_eq!(table.signals(), &[SentSignal::Terminate(42)]);
        assert!(clock.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_slow_graceful_exit_within_bound() {
        let (clock, mut table, executor) = setup(Behavior::ExitAfterTerm(Duration::from_secs(2)));

        let outcome = executor.terminate(&mut table, 42);

        assert_eq!(outcome.reason, TerminationReason::Exited);
        assert!(clock.elapsed() >= Duration::from_secs(2));
        assert!(clock.elapsed() < Duration::from_secs(5));
        assert!(!table.signals().contains(&SentSignal::Kill(42)));
    }

    #[test]
    fn test_escalates_to_kill_after_graceful_bound() {
        let (clock, mut table, executor) = setup(Behavior::IgnoreTerm);

        let outcome = executor.terminate(&mut table, 42);

        assert!(outcome.succeeded);
        assert_eq!(outcome.reason, TerminationReason::Killed);
        assert_eq!(
            table.signals(),
            &[SentSignal::Terminate(42), SentSignal::Kill(42)]
        );
        assert!(clock.elapsed() >= Duration::from_secs(5));
        assert!(clock.elapsed() <= Duration::from_secs(8));
    }

    #[test]
    fn test_unkillable_times_out_within_total_bound() {
        let (clock, mut table, executor) = setup(Behavior::Unkillable);

        let outcome = executor.terminate(&mut table, 42);

        assert!(!outcome.succeeded);
        assert_eq!(outcome.reason, TerminationReason::TimedOut);
        let elapsed = clock.elapsed();
        assert!(elapsed >= Duration::from_secs(8));
        assert!(elapsed <= Duration::from_secs(8) + executor.policy().poll_interval);
    }

    #[test]
    fn test_already_gone_is_success_and_idempotent() {
        let (_clock, mut table, executor) = setup(Behavior::ExitOnTerm);

        let first = executor.terminate(&mut table, 42);
        let second = executor.terminate(&mut table, 42);
        let third = executor.terminate(&mut table, 4242);

        assert!(first.succeeded);
        assert!(second.succeeded);
        assert_eq!(second.reason, TerminationReason::AlreadyGone);
        assert!(third.succeeded);
        assert_eq!(third.reason, TerminationReason::AlreadyGone);
    }

    #[test]
    fn test_access_denied() {
        let (_clock, mut table, executor) = setup(Behavior::Denied);

        let outcome = executor.terminate(&mut table, 42);

        assert!(!outcome.succeeded);
        assert_eq!(outcome.reason, TerminationReason::AccessDenied);
    }

    #[test]
    fn test_state_machine_steps_without_clock() {
        let mut table = FakeProcessTable::new();
        table.spawn_with(entry(7), Behavior::IgnoreTerm);
        let policy = TerminationPolicy::default();
        let start = Instant::now();
        let mut machine = Termination::new(7, policy);

        assert_eq!(machine.advance(&mut table, start), Progress::Pending);
        assert!(!machine.escalated());

        // Still inside the graceful window
        assert_eq!(
            machine.advance(&mut table, start + Duration::from_secs(4)),
            Progress::Pending
        );
        assert!(!machine.escalated());

        // Window over: SIGKILL goes out
        assert_eq!(
            machine.advance(&mut table, start + Duration::from_secs(5)),
            Progress::Pending
        );
        assert!(machine.escalated());

        match machine.advance(&mut table, start + Duration::from_secs(5)) {
            Progress::Finished(outcome) => assert_eq!(outcome.reason, TerminationReason::Killed),
            Progress::Pending => panic!("process should be gone after SIGKILL"),
        }
        assert!(machine.is_finished());
    }

    #[test]
    fn test_terminate_all_independent_bounds() {
        let clock = ManualClock::new();
        let mut table = FakeProcessTable::with_clock(clock.clone());
        table
            .spawn_with(entry(1), Behavior::Unkillable)
            .spawn_with(entry(2), Behavior::ExitOnTerm)
            .spawn_with(entry(3), Behavior::Denied);
        let executor = ProcessExecutor::with_clock(clock.clone());

        let outcomes = executor.terminate_all(&mut table, [1, 2, 3]);

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].reason, TerminationReason::TimedOut);
        assert_eq!(outcomes[1].reason, TerminationReason::Exited);
        assert_eq!(outcomes[2].reason, TerminationReason::AccessDenied);
    }

    #[test]
    fn test_uneven_poll_interval_keeps_total_bound() {
        let (clock, mut table, executor) = setup(Behavior::Unkillable);
        let executor = executor.with_policy(TerminationPolicy {
            poll_interval: Duration::from_millis(1500),
            ..TerminationPolicy::default()
        });

        let outcome = executor.terminate(&mut table, 42);

        assert_eq!(outcome.reason, TerminationReason::TimedOut);
        assert_eq!(clock.elapsed(), Duration::from_secs(8));
    }

    #[test]
    fn test_uneven_poll_sends_kill_at_graceful_deadline() {
        let (clock, mut table, executor) = setup(Behavior::IgnoreTerm);
        let executor = executor.with_policy(TerminationPolicy {
            poll_interval: Duration::from_millis(1500),
            ..TerminationPolicy::default()
        });

        let outcome = executor.terminate(&mut table, 42);

        assert_eq!(outcome.reason, TerminationReason::Killed);
        // SIGKILL at 5 s, confirmed one poll later
        assert_eq!(clock.elapsed(), Duration::from_millis(6500));
    }

    #[test]
    fn test_late_step_does_not_extend_forceful_window() {
        let mut table = FakeProcessTable::new();
        table.spawn_with(entry(8), Behavior::Unkillable);
        let start = Instant::now();
        let mut machine = Termination::new(8, TerminationPolicy::default());

        machine.advance(&mut table, start);
        assert_eq!(machine.deadline(), Some(start + Duration::from_secs(5)));

        // Graceful deadline observed two seconds late
        machine.advance(&mut table, start + Duration::from_secs(7));
        assert!(machine.escalated());
        assert_eq!(machine.deadline(), Some(start + Duration::from_secs(8)));

        match machine.advance(&mut table, start + Duration::from_secs(8)) {
            Progress::Finished(outcome) => assert_eq!(outcome.reason, TerminationReason::TimedOut),
            Progress::Pending => panic!("forceful window should be over at 8 s"),
        }
    }

    #[test]
    fn test_custom_policy() {
        let clock = ManualClock::new();
        let mut table = FakeProcessTable::with_clock(clock.clone());
        table.spawn_with(entry(9), Behavior::IgnoreTerm);
        let executor = ProcessExecutor::with_clock(clock.clone()).with_policy(TerminationPolicy {
            graceful_timeout: Duration::from_secs(1),
            forceful_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(250),
        });

        let outcome = executor.terminate(&mut table, 9);

        assert_eq!(outcome.reason, TerminationReason::Killed);
        assert!(clock.elapsed() < Duration::from_secs(2));
    }

    #[test]
    #[ignore] // Spawns and kills a real process
    fn test_terminate_real_process() {
        use crate::process::SystemProcessTable;
        use std::process::Command;

        let mut child = Command::new("sleep")
            .arg("60")
            .spawn()
            .expect("Failed to spawn test process");
        let pid = child.id();

        let mut table = SystemProcessTable::new();
        let reaper = std::thread::spawn(move || child.wait());
        let outcome = ProcessExecutor::new().terminate(&mut table, pid);

        assert!(outcome.succeeded);
        let _ = reaper.join();
    }
}
