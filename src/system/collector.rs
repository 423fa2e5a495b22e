use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sysinfo::{
    Components, Disks, Networks, Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate,
    System,
};

use super::host::{
    CoreCounts, HostOs, RawDisk, RawMemory, RawNetwork, RawProcessStats, RawTemperature,
    SampleError, SignalError, SignalKind, SkipReason,
};
use super::platform;

/// [`HostOs`] backed by `sysinfo`.
///
/// Each OS subsystem gets its own handle and lock so independent sub-samples
/// never wait on each other. In particular the blocking CPU measurement only
/// holds `cpu`.
pub struct SysinfoHost {
    cpu: Mutex<System>,
    cpu_info: Mutex<System>,
    memory: Mutex<System>,
    processes: Mutex<System>,
    disks: Mutex<Disks>,
    networks: Mutex<Networks>,
    components: Mutex<Components>,
}

impl Default for SysinfoHost {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SysinfoHost {
    pub fn new() -> Self {
        let mut cpu = System::new();
        cpu.refresh_cpu_usage();
        let mut cpu_info = System::new();
        cpu_info.refresh_cpu_all();
        let mut processes = System::new();
        processes.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );

        SysinfoHost {
            cpu: Mutex::new(cpu),
            cpu_info: Mutex::new(cpu_info),
            memory: Mutex::new(System::new()),
            processes: Mutex::new(processes),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
            networks: Mutex::new(Networks::new_with_refreshed_list()),
            components: Mutex::new(Components::new_with_refreshed_list()),
        }
    }
}

impl HostOs for SysinfoHost {
    fn enumerate_processes(&self) -> Result<Vec<u32>, SampleError> {
        let _span = tracing::debug_span!("collector.enumerate_processes").entered();

        let mut sys = lock(&self.processes);
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );
        // sysinfo lists the tasks of multithreaded programs next to their
        // process on Linux; those are threads, not processes.
        let mut pids: Vec<u32> = sys
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, _)| pid.as_u32())
            .collect();
        if pids.is_empty() {
            return Err(SampleError::Host("process table is empty".to_string()));
        }
        pids.sort_unstable();
        Ok(pids)
    }

    /// sysinfo reports unreadable fields of a foreign process as zero rather
    /// than failing, so this never yields [`SkipReason::PermissionDenied`].
    /// That reason only comes from hosts that surface access errors.
    fn read_process_stats(&self, pid: u32) -> Result<RawProcessStats, SkipReason> {
        let sys = lock(&self.processes);
        let process = sys
            .process(Pid::from_u32(pid))
            .filter(|process| process.thread_kind().is_none())
            .ok_or(SkipReason::Vanished)?;
        if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
            return Err(SkipReason::Zombie);
        }

        Ok(RawProcessStats {
            pid,
            name: process.name().to_string_lossy().to_string(),
            resident_bytes: process.memory(),
            cpu_time_ms: process.accumulated_cpu_time(),
        })
    }

    fn read_system_cpu(&self, window: Duration) -> Result<f32, SampleError> {
        let _span = tracing::debug_span!("collector.read_system_cpu").entered();

        let mut sys = lock(&self.cpu);
        sys.refresh_cpu_usage();
        std::thread::sleep(window);
        sys.refresh_cpu_usage();
        if sys.cpus().is_empty() {
            return Err(SampleError::Unavailable("cpu usage"));
        }
        Ok(sys.global_cpu_usage())
    }

    fn read_core_counts(&self) -> Result<CoreCounts, SampleError> {
        let sys = lock(&self.cpu_info);
        let logical = match sys.cpus().len() {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .map_err(|e| SampleError::Host(format!("logical core count: {e}")))?,
            n => n,
        };
        let physical = System::physical_core_count().unwrap_or(logical);
        Ok(CoreCounts { logical, physical })
    }

    fn read_cpu_frequency(&self) -> Result<f64, SampleError> {
        let mut sys = lock(&self.cpu_info);
        sys.refresh_cpu_frequency();
        match sys.cpus().first().map(|cpu| cpu.frequency()) {
            Some(mhz) if mhz > 0 => Ok(mhz as f64),
            _ => Err(SampleError::Unavailable("cpu frequency")),
        }
    }

    fn read_system_memory(&self) -> Result<RawMemory, SampleError> {
        let mut sys = lock(&self.memory);
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return Err(SampleError::Unavailable("physical memory"));
        }
        Ok(RawMemory {
            total,
            used: sys.used_memory(),
            free: sys.free_memory(),
        })
    }

    /// `free` is the space available to unprivileged users and `used` is
    /// `total - free`, so blocks reserved for root count as used. On ext4 this
    /// reads a few percent higher than `used / (used + free)`.
    fn read_disk_usage(&self, path: &Path) -> Result<RawDisk, SampleError> {
        let unavailable = |reason: String| SampleError::DiskUnavailable {
            mount: path.to_path_buf(),
            reason,
        };
        let target = std::fs::canonicalize(path).map_err(|e| unavailable(e.to_string()))?;

        let mut disks = lock(&self.disks);
        disks.refresh(true);
        // The deepest mount point containing the path is the filesystem backing it.
        let disk = disks
            .list()
            .iter()
            .filter(|disk| target.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .ok_or_else(|| unavailable("no mounted filesystem contains this path".to_string()))?;

        let total = disk.total_space();
        let free = disk.available_space().min(total);
        Ok(RawDisk {
            total,
            used: total - free,
            free,
        })
    }

    fn read_network_counters(&self) -> Result<RawNetwork, SampleError> {
        let mut networks = lock(&self.networks);
        networks.refresh(true);
        let counters = networks
            .list()
            .values()
            .fold(RawNetwork::default(), |acc, data| RawNetwork {
                bytes_sent: acc.bytes_sent.saturating_add(data.total_transmitted()),
                bytes_recv: acc.bytes_recv.saturating_add(data.total_received()),
            });
        Ok(counters)
    }

    fn read_boot_time(&self) -> Result<u64, SampleError> {
        match System::boot_time() {
            0 => Err(SampleError::Unavailable("boot time")),
            secs => Ok(secs),
        }
    }

    fn read_temperatures(&self) -> Result<Vec<RawTemperature>, SampleError> {
        let mut components = lock(&self.components);
        components.refresh(true);
        let readings: Vec<RawTemperature> = components
            .list()
            .iter()
            .filter_map(|component| {
                component.temperature().map(|celsius| RawTemperature {
                    label: component.label().to_string(),
                    celsius,
                })
            })
            .collect();
        if readings.is_empty() {
            return Err(SampleError::Unavailable("temperature sensors"));
        }
        Ok(readings)
    }

    fn process_alive(&self, pid: u32) -> bool {
        let sysinfo_pid = Pid::from_u32(pid);
        let mut sys = lock(&self.processes);
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sysinfo_pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
        sys.process(sysinfo_pid).is_some_and(|process| {
            !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
        })
    }

    fn signal_process(&self, pid: u32, kind: SignalKind) -> Result<(), SignalError> {
        platform::send_signal(pid, kind)
    }
}
