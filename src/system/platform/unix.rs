use super::PlatformSignals;
use crate::system::host::{SignalError, SignalKind};

pub struct Platform;

impl PlatformSignals for Platform {
    fn send_signal(pid: u32, kind: SignalKind) -> Result<(), SignalError> {
        // kill(2) treats 0 and negative pids as process groups
        let raw_pid = match libc::pid_t::try_from(pid) {
            Ok(p) if p > 0 => p,
            _ => return Err(SignalError::NoSuchProcess),
        };
        let signal = match kind {
            SignalKind::Graceful => libc::SIGTERM,
            SignalKind::Force => libc::SIGKILL,
        };

        // SAFETY: kill has no memory preconditions and raw_pid addresses a single process.
        let rc = unsafe { libc::kill(raw_pid, signal) };
        if rc == 0 {
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ESRCH) => Err(SignalError::NoSuchProcess),
            Some(libc::EPERM) => Err(SignalError::PermissionDenied),
            _ => Err(SignalError::Failed(format!(
                "Failed to send {} to PID {pid}: {err}",
                kind.name()
            ))),
        }
    }
}
