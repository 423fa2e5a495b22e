use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::host::{HostOs, SignalError, SignalKind};

pub const DEFAULT_GRACE_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum TerminationOutcome {
    /// Exited within the grace period after SIGTERM.
    Terminated,
    /// Outlived the grace period and was sent SIGKILL.
    ForceKilled,
    AlreadyGone,
    PermissionDenied,
    Failed(String),
}

impl TerminationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            TerminationOutcome::Terminated
                | TerminationOutcome::ForceKilled
                | TerminationOutcome::AlreadyGone
        )
    }
}

impl fmt::Display for TerminationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationOutcome::Terminated => f.write_str("terminated"),
            TerminationOutcome::ForceKilled => f.write_str("forcefully killed"),
            TerminationOutcome::AlreadyGone => f.write_str("no such process"),
            TerminationOutcome::PermissionDenied => f.write_str("permission denied"),
            TerminationOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Graceful-then-forceful process termination.
///
/// `terminate` blocks for up to the grace timeout and must not run on a
/// latency-sensitive thread. Signals already sent are not undone if the
/// caller stops waiting.
pub struct ProcessController<H> {
    host: Arc<H>,
    grace_timeout: Duration,
    poll_interval: Duration,
}

impl<H: HostOs> ProcessController<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self::with_timing(host, DEFAULT_GRACE_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_timing(host: Arc<H>, grace_timeout: Duration, poll_interval: Duration) -> Self {
        ProcessController {
            host,
            grace_timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn terminate(&self, pid: u32) -> TerminationOutcome {
        let outcome = self.run_protocol(pid);
        tracing::info!(pid, %outcome, "termination finished");
        outcome
    }

    fn run_protocol(&self, pid: u32) -> TerminationOutcome {
        if !self.host.process_alive(pid) {
            return TerminationOutcome::AlreadyGone;
        }

        match self.host.signal_process(pid, SignalKind::Graceful) {
            Ok(()) => {}
            Err(SignalError::NoSuchProcess) => return TerminationOutcome::AlreadyGone,
            Err(err) => return signal_failure(err),
        }

        if self.wait_for_exit(pid) {
            return TerminationOutcome::Terminated;
        }

        tracing::debug!(pid, timeout = ?self.grace_timeout, "grace period elapsed, forcing");
        match self.host.signal_process(pid, SignalKind::Force) {
            Ok(()) => TerminationOutcome::ForceKilled,
            // Exited between the last check and the kill.
            Err(SignalError::NoSuchProcess) => TerminationOutcome::Terminated,
            Err(err) => signal_failure(err),
        }
    }

    fn wait_for_exit(&self, pid: u32) -> bool {
        let deadline = Instant::now() + self.grace_timeout;
        loop {
            if !self.host.process_alive(pid) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }
}

fn signal_failure(err: SignalError) -> TerminationOutcome {
    match err {
        SignalError::PermissionDenied => TerminationOutcome::PermissionDenied,
        SignalError::NoSuchProcess => TerminationOutcome::AlreadyGone,
        SignalError::Failed(reason) => TerminationOutcome::Failed(reason),
    }
}
