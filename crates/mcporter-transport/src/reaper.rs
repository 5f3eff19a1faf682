//! Process Reaper (C8): stderr ring buffer, exit detection, escalating
//! termination.
//!
//! Grounded on the teacher's `child_process::ChildProcessTransport`
//! STDIN/STDOUT task-pair pattern, extended with a third STDERR task that
//! buffers into a ring instead of only logging, and with the three-stage
//! escalating shutdown the teacher does not implement (it only force-kills
//! on `Drop`).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::time::timeout;

/// `T1`: soft-close budget before escalating to `SIGTERM`.
pub const SOFT_CLOSE_TIMEOUT: Duration = Duration::from_millis(700);
/// `T2`: `SIGTERM` budget before escalating to `SIGKILL`.
pub const SIGTERM_TIMEOUT: Duration = Duration::from_millis(700);
/// `T3`: `SIGKILL` budget before giving up and logging a warning.
pub const SIGKILL_TIMEOUT: Duration = Duration::from_millis(500);

const STDERR_RING_CAPACITY: usize = 200;

/// A bounded in-memory ring of the child's stderr lines, keyed implicitly
/// by owning exactly one child process.
#[derive(Debug, Default, Clone)]
pub struct StderrRing {
    lines: Arc<StdMutex<VecDeque<String>>>,
}

impl StderrRing {
    /// An empty ring with the default capacity.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, line: String) {
        let mut guard = self.lines.lock().expect("stderr ring mutex poisoned");
        if guard.len() >= STDERR_RING_CAPACITY {
            guard.pop_front();
        }
        guard.push_back(line);
    }

    /// Snapshot of the buffered lines, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().expect("stderr ring mutex poisoned").iter().cloned().collect()
    }

    /// Spawn the reader task that feeds this ring from `stderr`, returning
    /// its join handle so the caller can abort it during close.
    pub fn spawn_reader(&self, stderr: tokio::process::ChildStderr) -> tokio::task::JoinHandle<()> {
        let ring = self.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                ring.push(line);
            }
        })
    }

    /// Emit the buffered stderr to the operator-facing log, with a one-line
    /// heading identifying the failing command, per spec.md §4.8.
    pub fn log_if_noteworthy(&self, command_label: &str, exit_code: Option<i32>) {
        let forced = std::env::var("MCPORTER_STDIO_LOGS").as_deref() == Ok("1");
        let failed = matches!(exit_code, Some(code) if code != 0);
        if !forced && !failed {
            return;
        }
        let lines = self.snapshot();
        if lines.is_empty() {
            return;
        }
        tracing::warn!(
            command = command_label,
            exit_code,
            "stderr from `{command_label}`:\n{}",
            lines.join("\n")
        );
    }
}

/// What happened during [`reap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapOutcome {
    /// The process had already exited, or exited during the soft-close wait.
    ExitedCleanly,
    /// `SIGTERM` (or the soft-close wait, on platforms without signals)
    /// caused the process to exit.
    Terminated,
    /// `SIGKILL` was required.
    Killed,
    /// The process was still alive after `SIGKILL` + `T3`. Shutdown
    /// proceeds anyway; this is logged, never escalated further.
    StillAlive,
}

/// Escalating termination: soft-close, then `SIGTERM`, then `SIGKILL`, each
/// bounded by its own timeout. Never blocks shutdown indefinitely.
pub async fn reap(child: &mut Child) -> ReapOutcome {
    if matches!(child.try_wait(), Ok(Some(_))) {
        return ReapOutcome::ExitedCleanly;
    }

    if timeout(SOFT_CLOSE_TIMEOUT, child.wait()).await.is_ok() {
        return ReapOutcome::ExitedCleanly;
    }

    send_signal(child, Signal::Term);
    if timeout(SIGTERM_TIMEOUT, child.wait()).await.is_ok() {
        return ReapOutcome::Terminated;
    }

    send_signal(child, Signal::Kill);
    if timeout(SIGKILL_TIMEOUT, child.wait()).await.is_ok() {
        return ReapOutcome::Killed;
    }

    if let Some(pid) = child.id() {
        tracing::warn!(pid, "child process still alive after SIGKILL; giving up without blocking shutdown");
    }
    ReapOutcome::StillAlive
}

enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn send_signal(child: &Child, signal: Signal) {
    use nix::sys::signal::{self, Signal as NixSignal};
    use nix::unistd::Pid;

    let nix_signal = match signal {
        Signal::Term => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
    };
    let Some(pid) = child.id() else { return };
    for descendant in process_tree(pid) {
        if let Err(e) = signal::kill(Pid::from_raw(descendant as i32), nix_signal) {
            tracing::debug!(pid = descendant, error = %e, "failed to signal descendant process");
        }
    }
    if let Err(e) = signal::kill(Pid::from_raw(pid as i32), nix_signal) {
        tracing::debug!(pid, error = %e, "failed to signal child process");
    }
}

#[cfg(not(unix))]
fn send_signal(child: &mut Child, signal: Signal) {
    // Windows has no SIGTERM; escalate straight to a hard kill and let the
    // soft-close/SIGTERM stages degrade to no-ops, per spec.md §4.8's
    // allowance to skip tree-walking on non-POSIX platforms.
    if matches!(signal, Signal::Kill) {
        let _ = child.start_kill();
    }
}

/// Enumerate descendants of `pid` via a `ps pid,ppid` snapshot, returning
/// pids in leaf-first order so descendants are signalled before the root.
#[cfg(unix)]
fn process_tree(root: u32) -> Vec<u32> {
    let output = match std::process::Command::new("ps").args(["-eo", "pid,ppid"]).output() {
        Ok(o) => o,
        Err(_) => return Vec::new(),
    };
    let text = String::from_utf8_lossy(&output.stdout);
    let mut children_of: std::collections::HashMap<u32, Vec<u32>> = std::collections::HashMap::new();
    for line in text.lines().skip(1) {
        let mut fields = line.split_whitespace();
        let (Some(pid), Some(ppid)) = (fields.next(), fields.next()) else { continue };
        let (Ok(pid), Ok(ppid)) = (pid.parse::<u32>(), ppid.parse::<u32>()) else { continue };
        children_of.entry(ppid).or_default().push(pid);
    }

    let mut descendants = Vec::new();
    let mut frontier = vec![root];
    while let Some(pid) = frontier.pop() {
        if let Some(children) = children_of.get(&pid) {
            for &child in children {
                descendants.push(child);
                frontier.push(child);
            }
        }
    }
    descendants.reverse();
    descendants
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    #[tokio::test]
    async fn reaps_a_process_that_ignores_nothing() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let outcome = reap(&mut child).await;
        assert!(matches!(
            outcome,
            ReapOutcome::Terminated | ReapOutcome::Killed | ReapOutcome::ExitedCleanly
        ));
    }

    #[tokio::test]
    async fn reaps_an_already_exited_process_cleanly() {
        let mut child = Command::new("true").spawn().unwrap();
        let _ = child.wait().await;
        let outcome = reap(&mut child).await;
        assert_eq!(outcome, ReapOutcome::ExitedCleanly);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn escalates_to_sigkill_when_the_child_ignores_sigterm() {
        let mut child = Command::new("sh")
            .args(["-c", "trap '' TERM; while true; do sleep 1; done"])
            .spawn()
            .unwrap();

        let started = std::time::Instant::now();
        let outcome = reap(&mut child).await;
        let elapsed = started.elapsed();

        assert_eq!(outcome, ReapOutcome::Killed);
        assert!(
            elapsed < SOFT_CLOSE_TIMEOUT + SIGTERM_TIMEOUT + SIGKILL_TIMEOUT + Duration::from_millis(500),
            "reap took {elapsed:?}, expected to stay within T1+T2+T3 plus jitter"
        );
        assert!(matches!(child.try_wait(), Ok(Some(_))), "child should be gone after SIGKILL");
    }

    #[test]
    fn stderr_ring_bounds_its_length() {
        let ring = StderrRing::new();
        for i in 0..(STDERR_RING_CAPACITY + 50) {
            ring.push(format!("line {i}"));
        }
        assert_eq!(ring.snapshot().len(), STDERR_RING_CAPACITY);
        assert_eq!(ring.snapshot().first().unwrap(), &format!("line {}", 50));
    }

    #[test]
    fn log_if_noteworthy_is_silent_on_success_without_override() {
        std::env::remove_var("MCPORTER_STDIO_LOGS");
        let ring = StderrRing::new();
        ring.push("some diagnostic".into());
        // Nothing to assert on directly (this only exercises the early
        // return for `exit_code == Some(0)`); absence of a panic is the test.
        ring.log_if_noteworthy("echo", Some(0));
    }
}
