//! Scriptable in-memory [`HostOs`] with call counters, for tests and benches.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::host::{
    CoreCounts, HostOs, RawDisk, RawMemory, RawNetwork, RawProcessStats, RawTemperature,
    SampleError, SignalError, SignalKind, SkipReason,
};

const GB: u64 = 1024 * 1024 * 1024;

/// How many times each host capability was exercised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub system_cpu: usize,
    pub core_counts: usize,
    pub enumerations: usize,
    pub process_reads: usize,
    pub liveness_checks: usize,
    pub signals: usize,
}

/// How a fake process reacts to termination signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationBehavior {
    /// Exits once the graceful signal has been observed by `after_checks`
    /// further liveness checks.
    ExitsOnGraceful { after_checks: usize },
    /// Ignores the graceful signal and only dies to a forced kill.
    IgnoresGraceful,
    /// Every signal is refused for lack of privilege.
    Protected,
}

#[derive(Debug, Clone)]
struct FakeProcess {
    stats: Result<RawProcessStats, SkipReason>,
    alive: bool,
    behavior: TerminationBehavior,
    exit_countdown: Option<usize>,
}

#[derive(Debug)]
struct FakeState {
    system_cpu: Result<f32, SampleError>,
    cores: CoreCounts,
    frequency: Result<f64, SampleError>,
    memory: Result<RawMemory, SampleError>,
    disks: HashMap<PathBuf, RawDisk>,
    network: Result<RawNetwork, SampleError>,
    boot_time: Result<u64, SampleError>,
    temperatures: Result<Vec<RawTemperature>, SampleError>,
    enumerate_error: Option<SampleError>,
    processes: BTreeMap<u32, FakeProcess>,
    calls: CallCounts,
}

pub struct FakeHost {
    state: Mutex<FakeState>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHost {
    /// A healthy host with no processes, booted an hour ago.
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        let mut disks = HashMap::new();
        disks.insert(
            PathBuf::from("/"),
            RawDisk {
                total: 500 * GB,
                used: 200 * GB,
                free: 300 * GB,
            },
        );

        FakeHost {
            state: Mutex::new(FakeState {
                system_cpu: Ok(25.0),
                cores: CoreCounts {
                    logical: 8,
                    physical: 4,
                },
                frequency: Ok(2_400.0),
                memory: Ok(RawMemory {
                    total: 16 * GB,
                    used: 8 * GB,
                    free: 8 * GB,
                }),
                disks,
                network: Ok(RawNetwork {
                    bytes_sent: GB,
                    bytes_recv: 2 * GB,
                }),
                boot_time: Ok(now.saturating_sub(3_600)),
                temperatures: Ok(vec![RawTemperature {
                    label: "cpu".to_string(),
                    celsius: 45.0,
                }]),
                enumerate_error: None,
                processes: BTreeMap::new(),
                calls: CallCounts::default(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn edit(self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(&mut self.state());
        self
    }

    pub fn with_system_cpu(self, pct: f32) -> Self {
        self.edit(|s| s.system_cpu = Ok(pct))
    }

    pub fn with_system_cpu_error(self, error: SampleError) -> Self {
        self.edit(|s| s.system_cpu = Err(error))
    }

    pub fn with_cpu_frequency(self, frequency: Result<f64, SampleError>) -> Self {
        self.edit(|s| s.frequency = frequency)
    }

    /// Memory sizes in whole GB.
    pub fn with_memory(self, total_gb: u64, used_gb: u64, free_gb: u64) -> Self {
        self.edit(|s| {
            s.memory = Ok(RawMemory {
                total: total_gb * GB,
                used: used_gb * GB,
                free: free_gb * GB,
            })
        })
    }

    pub fn with_memory_error(self, error: SampleError) -> Self {
        self.edit(|s| s.memory = Err(error))
    }

    pub fn with_disk(self, mount: impl Into<PathBuf>, disk: RawDisk) -> Self {
        self.edit(|s| {
            s.disks.insert(mount.into(), disk);
        })
    }

    pub fn with_network(self, bytes_sent: u64, bytes_recv: u64) -> Self {
        self.edit(|s| {
            s.network = Ok(RawNetwork {
                bytes_sent,
                bytes_recv,
            })
        })
    }

    pub fn with_boot_time(self, unix_secs: u64) -> Self {
        self.edit(|s| s.boot_time = Ok(unix_secs))
    }

    pub fn with_temperatures(self, temperatures: Result<Vec<RawTemperature>, SampleError>) -> Self {
        self.edit(|s| s.temperatures = temperatures)
    }

    pub fn with_enumerate_error(self, error: SampleError) -> Self {
        self.edit(|s| s.enumerate_error = Some(error))
    }

    pub fn with_process(self, pid: u32, name: &str, resident_bytes: u64, cpu_time_ms: u64) -> Self {
        let stats = RawProcessStats {
            pid,
            name: name.to_string(),
            resident_bytes,
            cpu_time_ms,
        };
        self.edit(|s| {
            s.processes.insert(pid, FakeProcess::new(Ok(stats)));
        })
    }

    /// A pid that enumerates but cannot be read.
    pub fn with_unreadable_process(self, pid: u32, reason: SkipReason) -> Self {
        self.edit(|s| {
            s.processes.insert(pid, FakeProcess::new(Err(reason)));
        })
    }

    pub fn with_termination(self, pid: u32, behavior: TerminationBehavior) -> Self {
        self.edit(|s| {
            if let Some(process) = s.processes.get_mut(&pid) {
                process.behavior = behavior;
            }
        })
    }

    pub fn set_system_cpu(&self, pct: f32) {
        self.state().system_cpu = Ok(pct);
    }

    pub fn set_process_cpu_time(&self, pid: u32, cpu_time_ms: u64) {
        if let Some(FakeProcess {
            stats: Ok(stats), ..
        }) = self.state().processes.get_mut(&pid)
        {
            stats.cpu_time_ms = cpu_time_ms;
        }
    }

    pub fn remove_process(&self, pid: u32) {
        self.state().processes.remove(&pid);
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }
}

impl FakeProcess {
    fn new(stats: Result<RawProcessStats, SkipReason>) -> Self {
        FakeProcess {
            stats,
            alive: true,
            behavior: TerminationBehavior::ExitsOnGraceful { after_checks: 0 },
            exit_countdown: None,
        }
    }
}

impl HostOs for FakeHost {
    fn enumerate_processes(&self) -> Result<Vec<u32>, SampleError> {
        let mut state = self.state();
        state.calls.enumerations += 1;
        if let Some(error) = &state.enumerate_error {
            return Err(error.clone());
        }
        Ok(state
            .processes
            .iter()
            .filter(|(_, p)| p.alive)
            .map(|(pid, _)| *pid)
            .collect())
    }

    fn read_process_stats(&self, pid: u32) -> Result<RawProcessStats, SkipReason> {
        let mut state = self.state();
        state.calls.process_reads += 1;
        match state.processes.get(&pid) {
            Some(process) if process.alive => process.stats.clone(),
            _ => Err(SkipReason::Vanished),
        }
    }

    fn read_system_cpu(&self, window: Duration) -> Result<f32, SampleError> {
        let value = {
            let mut state = self.state();
            state.calls.system_cpu += 1;
            state.system_cpu.clone()
        };
        std::thread::sleep(window);
        value
    }

    fn read_core_counts(&self) -> Result<CoreCounts, SampleError> {
        let mut state = self.state();
        state.calls.core_counts += 1;
        Ok(state.cores)
    }

    fn read_cpu_frequency(&self) -> Result<f64, SampleError> {
        self.state().frequency.clone()
    }

    fn read_system_memory(&self) -> Result<RawMemory, SampleError> {
        self.state().memory.clone()
    }

    fn read_disk_usage(&self, path: &Path) -> Result<RawDisk, SampleError> {
        self.state()
            .disks
            .get(path)
            .copied()
            .ok_or_else(|| SampleError::DiskUnavailable {
                mount: path.to_path_buf(),
                reason: "No such file or directory".to_string(),
            })
    }

    fn read_network_counters(&self) -> Result<RawNetwork, SampleError> {
        self.state().network.clone()
    }

    fn read_boot_time(&self) -> Result<u64, SampleError> {
        self.state().boot_time.clone()
    }

    fn read_temperatures(&self) -> Result<Vec<RawTemperature>, SampleError> {
        self.state().temperatures.clone()
    }

    fn process_alive(&self, pid: u32) -> bool {
        let mut state = self.state();
        state.calls.liveness_checks += 1;
        let Some(process) = state.processes.get_mut(&pid) else {
            return false;
        };
        match process.exit_countdown {
            Some(0) => process.alive = false,
            Some(n) => process.exit_countdown = Some(n - 1),
            None => {}
        }
        process.alive
    }

    fn signal_process(&self, pid: u32, kind: SignalKind) -> Result<(), SignalError> {
        let mut state = self.state();
        state.calls.signals += 1;
        let process = match state.processes.get_mut(&pid) {
            Some(p) if p.alive => p,
            _ => return Err(SignalError::NoSuchProcess),
        };

        match (process.behavior, kind) {
            (TerminationBehavior::Protected, _) => Err(SignalError::PermissionDenied),
            (_, SignalKind::Force) => {
                process.alive = false;
                Ok(())
            }
            (TerminationBehavior::ExitsOnGraceful { after_checks }, SignalKind::Graceful) => {
                process.exit_countdown = Some(after_checks);
                Ok(())
            }
            (TerminationBehavior::IgnoresGraceful, SignalKind::Graceful) => Ok(()),
        }
    }
}
