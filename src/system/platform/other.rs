use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System};

use super::PlatformSignals;
use crate::system::host::{SignalError, SignalKind};

pub struct Platform;

impl PlatformSignals for Platform {
    fn send_signal(pid: u32, kind: SignalKind) -> Result<(), SignalError> {
        if pid == 0 {
            return Err(SignalError::NoSuchProcess);
        }
        let sysinfo_pid = Pid::from_u32(pid);
        let mut sys = System::new();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sysinfo_pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
        let Some(process) = sys.process(sysinfo_pid) else {
            return Err(SignalError::NoSuchProcess);
        };

        let signal = match kind {
            SignalKind::Graceful => Signal::Term,
            SignalKind::Force => Signal::Kill,
        };
        match process.kill_with(signal) {
            Some(true) => Ok(()),
            Some(false) => Err(SignalError::Failed(format!(
                "Failed to send {} to PID {pid}",
                kind.name()
            ))),
            // Signal not supported on this platform, fall back to kill()
            None => {
                if process.kill() {
                    Ok(())
                } else {
                    Err(SignalError::PermissionDenied)
                }
            }
        }
    }
}
