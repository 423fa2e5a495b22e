//! The host capabilities the sampling engine depends on.
//!
//! Every call may fail on its own. Implementations must be shareable across
//! worker threads so a cycle can fan its sub-samples out.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Error of a system-wide host read, and therefore of the sub-sample built on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    /// The host platform does not expose this reading at all.
    Unavailable(&'static str),
    /// The requested mount point does not exist or cannot be inspected.
    DiskUnavailable { mount: PathBuf, reason: String },
    /// Any other failure reported by the host.
    Host(String),
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::Unavailable(what) => write!(f, "{what} is not available on this host"),
            SampleError::DiskUnavailable { mount, reason } => {
                write!(f, "disk at {} is unavailable: {reason}", mount.display())
            }
            SampleError::Host(reason) => write!(f, "host read failed: {reason}"),
        }
    }
}

impl std::error::Error for SampleError {}

/// Why a single process was left out of a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Exited between enumeration and the stat read.
    Vanished,
    PermissionDenied,
    Zombie,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::Vanished => "process vanished",
            SkipReason::PermissionDenied => "permission denied",
            SkipReason::Zombie => "zombie process",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Interceptable request to exit (SIGTERM on unix).
    Graceful,
    /// Non-interceptable kill (SIGKILL on unix).
    Force,
}

impl SignalKind {
    pub fn name(self) -> &'static str {
        match self {
            SignalKind::Graceful => "SIGTERM",
            SignalKind::Force => "SIGKILL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    NoSuchProcess,
    PermissionDenied,
    Failed(String),
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalError::NoSuchProcess => f.write_str("no such process"),
            SignalError::PermissionDenied => f.write_str("permission denied"),
            SignalError::Failed(reason) => f.write_str(reason),
        }
    }
}

impl std::error::Error for SignalError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreCounts {
    pub logical: usize,
    pub physical: usize,
}

/// Physical memory in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawMemory {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// Space of the filesystem backing a path, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawDisk {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// Byte counters summed over every interface since boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawNetwork {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

/// One process as read from the host.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProcessStats {
    pub pid: u32,
    pub name: String,
    /// Resident set size in bytes.
    pub resident_bytes: u64,
    /// Cumulative CPU time (user + system) in milliseconds.
    pub cpu_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawTemperature {
    pub label: String,
    pub celsius: f32,
}

pub trait HostOs: Send + Sync {
    /// Visible pids in ascending order.
    fn enumerate_processes(&self) -> Result<Vec<u32>, SampleError>;

    fn read_process_stats(&self, pid: u32) -> Result<RawProcessStats, SkipReason>;

    /// Whole-system CPU usage measured over `window`. Blocks for that long.
    fn read_system_cpu(&self, window: Duration) -> Result<f32, SampleError>;

    fn read_core_counts(&self) -> Result<CoreCounts, SampleError>;

    /// Current clock frequency in MHz.
    fn read_cpu_frequency(&self) -> Result<f64, SampleError>;

    fn read_system_memory(&self) -> Result<RawMemory, SampleError>;

    fn read_disk_usage(&self, path: &Path) -> Result<RawDisk, SampleError>;

    fn read_network_counters(&self) -> Result<RawNetwork, SampleError>;

    /// Boot time as seconds since the unix epoch.
    fn read_boot_time(&self) -> Result<u64, SampleError>;

    fn read_temperatures(&self) -> Result<Vec<RawTemperature>, SampleError>;

    /// True while `pid` names a process that has not exited (zombies count as exited).
    fn process_alive(&self, pid: u32) -> bool;

    fn signal_process(&self, pid: u32, kind: SignalKind) -> Result<(), SignalError>;
}
