use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use super::cache::{CounterCache, DEFAULT_STALENESS};
use super::host::{CoreCounts, HostOs, SampleError};
use super::snapshot::{
    CpuMetrics, DiskMetrics, MemoryMetrics, NetworkMetrics, SampleField, Snapshot, Temperature,
    bytes_to_gb, percent_of,
};

pub const DEFAULT_CPU_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SamplerSettings {
    /// How long a fresh system CPU reading blocks to measure usage.
    pub cpu_window: Duration,
    /// Maximum age of a cached system CPU reading.
    pub cpu_staleness: Duration,
    pub disk_mount: PathBuf,
    /// Run the blocking CPU measurement on a scoped worker thread while the
    /// other sub-samples proceed.
    pub parallel: bool,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        SamplerSettings {
            cpu_window: DEFAULT_CPU_WINDOW,
            cpu_staleness: DEFAULT_STALENESS,
            disk_mount: PathBuf::from("/"),
            parallel: true,
        }
    }
}

/// Turns raw host counters into normalized system metrics.
pub struct MetricSampler<H> {
    host: Arc<H>,
    cache: Arc<CounterCache>,
    settings: SamplerSettings,
    cores: OnceLock<CoreCounts>,
}

impl<H: HostOs> MetricSampler<H> {
    pub fn new(host: Arc<H>, cache: Arc<CounterCache>, settings: SamplerSettings) -> Self {
        MetricSampler {
            host,
            cache,
            settings,
            cores: OnceLock::new(),
        }
    }

    pub fn sample_cpu(&self) -> Result<CpuMetrics, SampleError> {
        self.sample_cpu_at(Instant::now())
    }

    pub fn sample_cpu_at(&self, now: Instant) -> Result<CpuMetrics, SampleError> {
        let cores = self.core_counts()?;
        let window = self.settings.cpu_window;
        let usage_pct =
            self.cache
                .get_or_refresh_system_cpu(now, self.settings.cpu_staleness, || {
                    self.host.read_system_cpu(window)
                })?;

        let frequency_mhz = match self.host.read_cpu_frequency() {
            Ok(mhz) if mhz > 0.0 => Some(mhz),
            Ok(_) => None,
            Err(error) => {
                tracing::debug!(%error, "cpu frequency unavailable");
                None
            }
        };

        Ok(CpuMetrics {
            usage_pct,
            logical_cores: cores.logical,
            physical_cores: cores.physical,
            frequency_mhz,
        })
    }

    // Core counts do not change while we run.
    fn core_counts(&self) -> Result<CoreCounts, SampleError> {
        if let Some(cores) = self.cores.get() {
            return Ok(*cores);
        }
        let cores = self.host.read_core_counts()?;
        Ok(*self.cores.get_or_init(|| cores))
    }

    pub fn sample_memory(&self) -> Result<MemoryMetrics, SampleError> {
        let mem = self.host.read_system_memory()?;
        Ok(MemoryMetrics {
            total_gb: bytes_to_gb(mem.total),
            used_gb: bytes_to_gb(mem.used),
            free_gb: bytes_to_gb(mem.free),
            usage_pct: percent_of(mem.used, mem.total),
        })
    }

    pub fn sample_disk(&self, mount: &Path) -> Result<DiskMetrics, SampleError> {
        let disk = self.host.read_disk_usage(mount)?;
        Ok(DiskMetrics {
            total_gb: bytes_to_gb(disk.total),
            used_gb: bytes_to_gb(disk.used),
            free_gb: bytes_to_gb(disk.free),
            usage_pct: percent_of(disk.used, disk.total),
        })
    }

    pub fn sample_network(&self) -> Result<NetworkMetrics, SampleError> {
        let counters = self.host.read_network_counters()?;
        let sent_gb = bytes_to_gb(counters.bytes_sent);
        let recv_gb = bytes_to_gb(counters.bytes_recv);
        Ok(NetworkMetrics {
            sent_gb,
            recv_gb,
            total_gb: sent_gb + recv_gb,
        })
    }

    pub fn sample_uptime(&self) -> Result<Duration, SampleError> {
        self.sample_uptime_at(SystemTime::now())
    }

    /// Time since boot as seen at `now`. A boot time later than `now` (clock
    /// skew) yields zero.
    pub fn sample_uptime_at(&self, now: SystemTime) -> Result<Duration, SampleError> {
        let boot = UNIX_EPOCH + Duration::from_secs(self.host.read_boot_time()?);
        Ok(now.duration_since(boot).unwrap_or(Duration::ZERO))
    }

    pub fn sample_temperatures(&self) -> Result<Vec<Temperature>, SampleError> {
        let readings = self.host.read_temperatures()?;
        Ok(readings
            .into_iter()
            .map(|r| Temperature {
                label: r.label,
                celsius: r.celsius,
            })
            .collect())
    }

    /// Runs every sub-sample once. A failing sub-sample is recorded in
    /// `Snapshot::failures` and never prevents the others.
    pub fn sample(&self) -> Snapshot {
        let _span = tracing::debug_span!("sampler.sample").entered();

        let results = if self.settings.parallel {
            std::thread::scope(|scope| {
                let cpu = scope.spawn(|| self.sample_cpu());
                let rest = self.sample_rest();
                let cpu = cpu
                    .join()
                    .unwrap_or_else(|_| Err(SampleError::Host("cpu sampler panicked".into())));
                (cpu, rest)
            })
        } else {
            (self.sample_cpu(), self.sample_rest())
        };
        let (cpu, (memory, disk, network, uptime, temperatures)) = results;

        let mut snapshot = Snapshot::default();
        snapshot.record(SampleField::Cpu, cpu, |s, v| s.cpu = Some(v));
        snapshot.record(SampleField::Memory, memory, |s, v| s.memory = Some(v));
        snapshot.record(SampleField::Disk, disk, |s, v| s.disk = Some(v));
        snapshot.record(SampleField::Network, network, |s, v| s.network = Some(v));
        snapshot.record(SampleField::Uptime, uptime, |s, v: Duration| {
            s.uptime_seconds = Some(v.as_secs_f64())
        });
        snapshot.record(SampleField::Temperatures, temperatures, |s, v| {
            s.temperatures = Some(v)
        });
        snapshot
    }

    #[allow(clippy::type_complexity)]
    fn sample_rest(
        &self,
    ) -> (
        Result<MemoryMetrics, SampleError>,
        Result<DiskMetrics, SampleError>,
        Result<NetworkMetrics, SampleError>,
        Result<Duration, SampleError>,
        Result<Vec<Temperature>, SampleError>,
    ) {
        (
            self.sample_memory(),
            self.sample_disk(&self.settings.disk_mount),
            self.sample_network(),
            self.sample_uptime(),
            self.sample_temperatures(),
        )
    }
}
