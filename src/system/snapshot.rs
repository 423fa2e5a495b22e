use std::fmt;

use serde::Serialize;

use super::host::SampleError;

pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

/// `part / whole` as a percentage in `[0, 100]`; `0` when `whole` is zero.
pub fn percent_of(part: u64, whole: u64) -> f32 {
    if whole == 0 {
        return 0.0;
    }
    ((part as f64 / whole as f64) * 100.0).clamp(0.0, 100.0) as f32
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuMetrics {
    pub usage_pct: f32,
    pub logical_cores: usize,
    pub physical_cores: usize,
    /// `None` when the host cannot report a clock frequency.
    pub frequency_mhz: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryMetrics {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub usage_pct: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskMetrics {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub usage_pct: f32,
}

/// Traffic summed over all interfaces since boot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkMetrics {
    pub sent_gb: f64,
    pub recv_gb: f64,
    /// `sent_gb + recv_gb`. A cumulative volume in GB, not a utilization
    /// percentage.
    pub total_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Temperature {
    pub label: String,
    pub celsius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleField {
    Cpu,
    Memory,
    Disk,
    Network,
    Uptime,
    Temperatures,
}

impl SampleField {
    pub fn label(self) -> &'static str {
        match self {
            SampleField::Cpu => "cpu",
            SampleField::Memory => "memory",
            SampleField::Disk => "disk",
            SampleField::Network => "network",
            SampleField::Uptime => "uptime",
            SampleField::Temperatures => "temperatures",
        }
    }
}

impl fmt::Display for SampleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleFailure {
    pub field: SampleField,
    #[serde(serialize_with = "serialize_display")]
    pub error: SampleError,
}

fn serialize_display<S: serde::Serializer>(
    error: &SampleError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// One cycle's system metrics.
///
/// Every field is either present or listed in `failures`, never both.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Snapshot {
    pub cpu: Option<CpuMetrics>,
    pub memory: Option<MemoryMetrics>,
    pub disk: Option<DiskMetrics>,
    pub network: Option<NetworkMetrics>,
    pub uptime_seconds: Option<f64>,
    pub temperatures: Option<Vec<Temperature>>,
    pub failures: Vec<SampleFailure>,
}

impl Snapshot {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure(&self, field: SampleField) -> Option<&SampleError> {
        self.failures
            .iter()
            .find(|f| f.field == field)
            .map(|f| &f.error)
    }

    /// Stores `result` in the slot for `field`, or records it as a failure.
    pub(crate) fn record<T>(
        &mut self,
        field: SampleField,
        result: Result<T, SampleError>,
        slot: impl FnOnce(&mut Self, T),
    ) {
        match result {
            Ok(value) => slot(self, value),
            Err(error) => {
                tracing::warn!(field = field.label(), %error, "sub-sample failed");
                self.failures.push(SampleFailure { field, error });
            }
        }
    }
}
