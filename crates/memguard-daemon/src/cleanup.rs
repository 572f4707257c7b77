//! Interactive cleanup: list candidate processes, let the operator pick some,
//! confirm, then terminate them largest first.

use crate::messages::Language;
use memguard_core::{
    Clock, Error, ProcessCandidate, ProcessExecutor, ProcessScanner, ProcessTable, Result,
    SystemClock, TerminationOutcome,
};
use std::collections::HashSet;
use std::io::{BufRead, Write};
use tracing::{info, warn};

const CANCEL_TOKENS: &[&str] = &["q", "quit", "exit", "取消"];
const CONFIRM_TOKENS: &[&str] = &["y", "yes", "是", "确认"];

/// Parsed operator answer to the selection prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Cancel,
    /// `picked` holds zero-based positions in the displayed table, in input
    /// order without duplicates; `invalid` the out-of-range numbers as typed.
    Indices { picked: Vec<usize>, invalid: Vec<i64> },
}

/// Parse a selection against a table of `count` rows.
///
/// Accepts comma-separated 1-based ids, `all`, or a cancel word. Empty input
/// cancels. A single non-numeric token rejects the whole input.
pub fn parse_selection(input: &str, count: usize) -> Result<Selection> {
    let answer = input.trim();
    let lower = answer.to_lowercase();

    if answer.is_empty() || CANCEL_TOKENS.contains(&lower.as_str()) {
        return Ok(Selection::Cancel);
    }
    if lower == "all" {
        return Ok(Selection::All);
    }

    let mut picked = Vec::new();
    let mut seen = HashSet::new();
    let mut invalid = Vec::new();

    for token in answer.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let id: i64 = token
            .parse()
            .map_err(|_| Error::InvalidSelection(format!("'{}' is not a process id", token)))?;

        match usize::try_from(id) {
            Ok(index) if (1..=count).contains(&index) => {
                if seen.insert(index) {
                    picked.push(index - 1);
                }
            }
            _ => invalid.push(id),
        }
    }

    Ok(Selection::Indices { picked, invalid })
}

/// Whether `answer` confirms the termination prompt
pub fn is_confirmation(answer: &str) -> bool {
    let lower = answer.trim().to_lowercase();
    CONFIRM_TOKENS.contains(&lower.as_str())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanupSummary {
    pub selected: usize,
    pub succeeded: usize,
    /// Pre-termination memory of the processes that were stopped
    pub freed_bytes: u64,
    pub outcomes: Vec<TerminationOutcome>,
}

impl CleanupSummary {
    pub fn freed_mb(&self) -> f64 {
        self.freed_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Drives one interactive cleanup session over any reader/writer pair
pub struct CleanupController<T: ProcessTable, C: Clock = SystemClock> {
    table: T,
    scanner: ProcessScanner,
    executor: ProcessExecutor<C>,
    language: Language,
}

impl<T: ProcessTable, C: Clock> CleanupController<T, C> {
    pub fn new(
        table: T,
        scanner: ProcessScanner,
        executor: ProcessExecutor<C>,
        language: Language,
    ) -> Self {
        Self {
            table,
            scanner,
            executor,
            language,
        }
    }

    pub fn table_mut(&mut self) -> &mut T {
        &mut self.table
    }

    /// Current candidates, largest first
    pub fn candidates(&mut self) -> Vec<ProcessCandidate> {
        self.scanner.scan(&mut self.table)
    }

    /// Run a full session.
    ///
    /// Returns `None` when nothing was terminated: no candidates, cancel,
    /// unparseable input, empty selection or a declined confirmation.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<Option<CleanupSummary>> {
        let lang = self.language;
        let candidates = self.candidates();

        if candidates.is_empty() {
            writeln!(
                output,
                "{}",
                lang.pick("未找到可清理的进程", "No cleanable processes found")
            )?;
            return Ok(None);
        }

        write_table(output, &candidates, lang)?;

        write!(
            output,
            "\n{}: ",
            lang.pick(
                "请输入要终止的进程编号 (如 1,3 / all / q)",
                "Enter process IDs to terminate (e.g. 1,3 / all / q)"
            )
        )?;
        output.flush()?;

        let answer = match read_answer(input)? {
            Some(answer) => answer,
            None => {
                writeln!(output)?;
                return cancelled(output, lang);
            }
        };

        let picked = match parse_selection(&answer, candidates.len()) {
            Ok(Selection::Cancel) => return cancelled(output, lang),
            Ok(Selection::All) => (0..candidates.len()).collect::<Vec<_>>(),
            Ok(Selection::Indices { picked, invalid }) => {
                for id in invalid {
                    writeln!(
                        output,
                        "{}",
                        lang.pick(
                            &format!("跳过无效编号: {}", id),
                            &format!("Skipping invalid ID: {}", id)
                        )
                    )?;
                }
                picked
            }
            Err(e) => {
                warn!("Rejected cleanup selection: {}", e);
                writeln!(
                    output,
                    "{}: {}",
                    lang.pick("输入无效", "Invalid input"),
                    e
                )?;
                return Ok(None);
            }
        };

        if picked.is_empty() {
            writeln!(
                output,
                "{}",
                lang.pick("未选择任何进程", "No processes selected")
            )?;
            return Ok(None);
        }

        let mut selected: Vec<ProcessCandidate> =
            picked.into_iter().map(|i| candidates[i].clone()).collect();
        selected.sort_by(|a, b| b.memory_bytes.cmp(&a.memory_bytes));

        let selected_mb: f64 = selected.iter().map(ProcessCandidate::memory_mb).sum();
        writeln!(output)?;
        for candidate in &selected {
            writeln!(
                output,
                "  PID {} ({}) {:.1} MB",
                candidate.pid,
                candidate.name,
                candidate.memory_mb()
            )?;
        }
        write!(
            output,
            "{} ",
            lang.pick(
                &format!("确认终止以上 {} 个进程 ({:.1} MB)? [y/N]", selected.len(), selected_mb),
                &format!(
                    "Terminate these {} processes ({:.1} MB)? [y/N]",
                    selected.len(),
                    selected_mb
                )
            )
        )?;
        output.flush()?;

        let confirmed = read_answer(input)?.map_or(false, |a| is_confirmation(&a));
        if !confirmed {
            writeln!(output)?;
            return cancelled(output, lang);
        }

        let summary = self.terminate(&selected, output)?;

        writeln!(
            output,
            "\n{}",
            lang.pick(
                &format!(
                    "已终止 {}/{} 个进程，释放约 {:.1} MB",
                    summary.succeeded,
                    summary.selected,
                    summary.freed_mb()
                ),
                &format!(
                    "Terminated {}/{} processes, freed about {:.1} MB",
                    summary.succeeded,
                    summary.selected,
                    summary.freed_mb()
                )
            )
        )?;

        Ok(Some(summary))
    }

    fn terminate<W: Write>(
        &mut self,
        selected: &[ProcessCandidate],
        output: &mut W,
    ) -> Result<CleanupSummary> {
        let mut outcomes = Vec::with_capacity(selected.len());
        let mut freed_bytes = 0u64;

        for candidate in selected {
            let outcome = self.executor.terminate(&mut self.table, candidate.pid);
            let mark = if outcome.succeeded { "✅" } else { "❌" };
            writeln!(
                output,
                "{} PID {} ({}): {}",
                mark, candidate.pid, candidate.name, outcome.reason
            )?;

            if outcome.succeeded {
                freed_bytes += candidate.memory_bytes;
            }
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.succeeded).count();
        info!(
            "Cleanup finished: {}/{} terminated, {} bytes freed",
            succeeded,
            selected.len(),
            freed_bytes
        );

        Ok(CleanupSummary {
            selected: selected.len(),
            succeeded,
            freed_bytes,
            outcomes,
        })
    }
}

fn cancelled<W: Write>(output: &mut W, lang: Language) -> Result<Option<CleanupSummary>> {
    writeln!(output, "{}", lang.pick("已取消", "Cancelled"))?;
    Ok(None)
}

/// Read one line; `None` on end of input
fn read_answer<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn write_table<W: Write>(
    output: &mut W,
    candidates: &[ProcessCandidate],
    lang: Language,
) -> Result<()> {
    writeln!(
        output,
        "{}",
        lang.pick(
            &format!("找到 {} 个可清理的进程:", candidates.len()),
            &format!("Found {} cleanable processes:", candidates.len())
        )
    )?;
    writeln!(
        output,
        "{:<4} {:<8} {:>8} {:>12} {:<10} {}",
        "ID", "Type", "PID", "Memory(MB)", "Status", "Command"
    )?;
    writeln!(output, "{}", "-".repeat(80))?;

    for (i, c) in candidates.iter().enumerate() {
        writeln!(
            output,
            "{:<4} {:<8} {:>8} {:>12.1} {:<10} {}",
            i + 1,
            c.kind.to_string(),
            c.pid,
            c.memory_mb(),
            c.status.to_string(),
            c.command_summary
        )?;
    }

    let total_mb: f64 = candidates.iter().map(ProcessCandidate::memory_mb).sum();
    writeln!(output, "{}", "-".repeat(80))?;
    writeln!(
        output,
        "{}",
        lang.pick(
            &format!("总计: {:.1} MB", total_mb),
            &format!("Total: {:.1} MB", total_mb)
        )
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use memguard_core::fake::{Behavior, FakeProcessTable, SentSignal};
    use memguard_core::{ManualClock, ProcessEntry, ProcessState, TerminationReason};
    use std::io::Cursor;

    const MB: u64 = 1024 * 1024;
    // Above any real pid_max so the guardian exclusions never collide
    const BASE: u32 = 5_000_000;

    #[test]
    fn test_parse_indices() {
        assert_eq!(
            parse_selection("1, 3", 3).unwrap(),
            Selection::Indices {
                picked: vec![0, 2],
                invalid: vec![]
            }
        );
    }

    #[test]
    fn test_parse_all_and_cancel() {
        assert_eq!(parse_selection("ALL", 2).unwrap(), Selection::All);
        for answer in ["q", "Quit", "exit", "取消", "", "   \n"] {
            assert_eq!(parse_selection(answer, 2).unwrap(), Selection::Cancel);
        }
    }

    #[test]
    fn test_parse_out_of_range_reported_individually() {
        assert_eq!(
            parse_selection("0,2,9,2", 3).unwrap(),
            Selection::Indices {
                picked: vec![1],
                invalid: vec![0, 9]
            }
        );
    }

    #[test]
    fn test_parse_garbage_rejects_everything() {
        let result = parse_selection("1, two, 3", 3);
        assert!(matches!(result, Err(Error::InvalidSelection(_))));
        assert!(parse_selection("1.5", 3).is_err());
    }

    #[test]
    fn test_parse_negative_id_is_out_of_range() {
        assert_eq!(
            parse_selection("-1, 2", 3).unwrap(),
            Selection::Indices {
                picked: vec![1],
                invalid: vec![-1]
            }
        );
    }

    #[test]
    fn test_confirmation_tokens() {
        for yes in ["y", "YES", " 是 ", "确认"] {
            assert!(is_confirmation(yes));
        }
        for no in ["n", "", "yeah", "否"] {
            assert!(!is_confirmation(no));
        }
    }

    struct Session {
        clock: ManualClock,
        controller: CleanupController<FakeProcessTable, ManualClock>,
    }

    /// python 100 MB, node 300 MB, python3 200 MB plus an unrelated bash
    fn session() -> Session {
        let clock = ManualClock::new();
        let mut table = FakeProcessTable::with_clock(clock.clone());
        table
            .spawn(BASE + 1, "python", 100 * MB)
            .spawn(BASE + 2, "node", 300 * MB)
            .spawn(BASE + 3, "python3", 200 * MB)
            .spawn(BASE + 4, "bash", 900 * MB);

        let controller = CleanupController::new(
            table,
            ProcessScanner::new(["python", "node"]),
            ProcessExecutor::with_clock(clock.clone()),
            Language::En,
        );
        Session { clock, controller }
    }

    fn run(session: &mut Session, answers: &str) -> (Option<CleanupSummary>, String) {
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output = Vec::new();
        let summary = session.controller.run(&mut input, &mut output).unwrap();
        (summary, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_table_lists_candidates_largest_first() {
        let mut s = session();
        let (_, out) = run(&mut s, "q\n");

        assert!(out.contains("Found 3 cleanable processes"));
        assert!(out.contains("Total: 600.0 MB"));
        assert!(!out.contains("bash"));
        let node = out.find("Node.js").unwrap();
        let python = out.find("Python").unwrap();
        assert!(node < python);
    }

    #[test]
    fn test_selected_processes_terminated_largest_first() {
        let mut s = session();
        // Row 1 is node (300 MB), row 3 is python (100 MB)
        let (summary, out) = run(&mut s, "3,1\ny\n");
        let summary = summary.unwrap();

        assert_eq!(summary.selected, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.freed_bytes, 400 * MB);
        assert_eq!(
            s.controller.table_mut().signals(),
            &[SentSignal::Terminate(BASE + 2), SentSignal::Terminate(BASE + 1)]
        );
        assert!(out.contains("Terminated 2/2 processes, freed about 400.0 MB"));
        assert!(s.controller.table_mut().is_running(BASE + 3));
    }

    #[test]
    fn test_all_selects_every_candidate() {
        let mut s = session();
        let (summary, _) = run(&mut s, "all\nyes\n");

        assert_eq!(summary.unwrap().succeeded, 3);
        assert!(s.controller.candidates().is_empty());
        assert!(s.controller.table_mut().is_running(BASE + 4));
    }

    #[test]
    fn test_cancel_has_no_side_effects() {
        let mut s = session();
        let (summary, out) = run(&mut s, "q\n");

        assert!(summary.is_none());
        assert!(out.contains("Cancelled"));
        assert!(s.controller.table_mut().signals().is_empty());
    }

    #[test]
    fn test_eof_cancels() {
        let mut s = session();
        let (summary, out) = run(&mut s, "");

        assert!(summary.is_none());
        assert!(out.contains("Cancelled"));
    }

    #[test]
    fn test_garbage_input_aborts() {
        let mut s = session();
        let (summary, out) = run(&mut s, "1,x\ny\n");

        assert!(summary.is_none());
        assert!(out.contains("Invalid input"));
        assert!(s.controller.table_mut().signals().is_empty());
    }

    #[test]
    fn test_out_of_range_skipped_rest_proceeds() {
        let mut s = session();
        let (summary, out) = run(&mut s, "2, 7\ny\n");

        assert!(out.contains("Skipping invalid ID: 7"));
        assert_eq!(summary.unwrap().succeeded, 1);
    }

    #[test]
    fn test_negative_id_skipped_rest_proceeds() {
        let mut s = session();
        let (summary, out) = run(&mut s, "-1,1\ny\n");

        assert!(out.contains("Skipping invalid ID: -1"));
        assert_eq!(summary.unwrap().succeeded, 1);
    }

    #[test]
    fn test_only_invalid_ids_selects_nothing() {
        let mut s = session();
        let (summary, out) = run(&mut s, "8,9\n");

        assert!(summary.is_none());
        assert!(out.contains("No processes selected"));
    }

    #[test]
    fn test_declined_confirmation() {
        let mut s = session();
        let (summary, _) = run(&mut s, "1\nn\n");

        assert!(summary.is_none());
        assert!(s.controller.table_mut().signals().is_empty());
    }

    #[test]
    fn test_no_candidates() {
        let mut table = FakeProcessTable::new();
        table.spawn(BASE + 1, "bash", MB);
        let mut controller = CleanupController::new(
            table,
            ProcessScanner::new(["python"]),
            ProcessExecutor::with_clock(ManualClock::new()),
            Language::Zh,
        );

        let mut output = Vec::new();
        let summary = controller
            .run(&mut Cursor::new(Vec::new()), &mut output)
            .unwrap();

        assert!(summary.is_none());
        assert!(String::from_utf8(output).unwrap().contains("未找到可清理的进程"));
    }

    #[test]
    fn test_failures_not_counted_as_freed() {
        let clock = ManualClock::new();
        let mut table = FakeProcessTable::with_clock(clock.clone());
        let entry = |pid, name: &str, mb| ProcessEntry {
            pid,
            name: name.to_string(),
            memory_bytes: mb * MB,
            state: ProcessState::Running,
            cmd: vec![name.to_string()],
        };
        table
            .spawn_with(entry(BASE + 1, "node", 500), Behavior::Unkillable)
            .spawn_with(entry(BASE + 2, "python", 400), Behavior::Denied)
            .spawn_with(entry(BASE + 3, "python3", 300), Behavior::IgnoreTerm);

        let mut controller = CleanupController::new(
            table,
            ProcessScanner::new(["python", "node"]),
            ProcessExecutor::with_clock(clock.clone()),
            Language::En,
        );
        let mut output = Vec::new();
        let summary = controller
            .run(&mut Cursor::new(b"all\ny\n".to_vec()), &mut output)
            .unwrap()
            .unwrap();

        assert_eq!(summary.selected, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.freed_bytes, 300 * MB);
        assert_eq!(summary.outcomes[0].reason, TerminationReason::TimedOut);
        assert_eq!(summary.outcomes[1].reason, TerminationReason::AccessDenied);
        assert_eq!(summary.outcomes[2].reason, TerminationReason::Killed);
        // 8 s for the unkillable one, 5 s plus one poll for the SIGTERM ignorer
        assert_eq!(clock.elapsed(), std::time::Duration::from_millis(13_100));
    }

    #[test]
    fn test_cooperative_processes_exit_on_first_poll() {
        let mut s = session();
        run(&mut s, "all\ny\n");
        assert_eq!(s.clock.elapsed(), std::time::Duration::from_millis(300));
    }
}
