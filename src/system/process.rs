use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::cache::CounterCache;
use super::host::{HostOs, RawProcessStats, SampleError, SkipReason};
use super::snapshot::percent_of;

pub const DEFAULT_LIMIT: usize = 10;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessSample {
    pub pid: u32,
    /// Full process name. Consumers truncate for display.
    pub name: String,
    /// CPU% since the previous ranking; `0.0` the first time a pid is seen.
    /// Can exceed 100 for a process busy on several cores.
    pub cpu_pct: f32,
    pub memory_pct: f32,
    pub memory_mb: f64,
}

/// Outcome of reading a single enumerated process.
#[derive(Clone, Debug, PartialEq)]
pub enum ProcessRead {
    Sampled(ProcessSample),
    Skipped { pid: u32, reason: SkipReason },
}

impl ProcessRead {
    pub fn sample(self) -> Option<ProcessSample> {
        match self {
            ProcessRead::Sampled(sample) => Some(sample),
            ProcessRead::Skipped { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RankedProcesses {
    pub top_cpu: Vec<ProcessSample>,
    pub top_memory: Vec<ProcessSample>,
    /// Processes read successfully this cycle, before truncation.
    pub total_processes: usize,
}

/// Orders `samples` by CPU and by memory, descending, keeping the first
/// `limit` of each. Ties keep their input order.
pub fn rank(samples: Vec<ProcessSample>, limit: usize) -> RankedProcesses {
    let total_processes = samples.len();

    let mut top_cpu = samples.clone();
    top_cpu.sort_by(|a, b| b.cpu_pct.total_cmp(&a.cpu_pct));
    top_cpu.truncate(limit);

    let mut top_memory = samples;
    top_memory.sort_by(|a, b| b.memory_pct.total_cmp(&a.memory_pct));
    top_memory.truncate(limit);

    RankedProcesses {
        top_cpu,
        top_memory,
        total_processes,
    }
}

pub struct ProcessRanker<H> {
    host: Arc<H>,
    cache: Arc<CounterCache>,
}

impl<H: HostOs> ProcessRanker<H> {
    pub fn new(host: Arc<H>, cache: Arc<CounterCache>) -> Self {
        ProcessRanker { host, cache }
    }

    pub fn rank_top(&self, limit: usize) -> Result<RankedProcesses, SampleError> {
        self.rank_top_at(limit, Instant::now())
    }

    pub fn rank_top_at(&self, limit: usize, now: Instant) -> Result<RankedProcesses, SampleError> {
        let _span = tracing::debug_span!("ranker.rank_top", limit).entered();

        let samples: Vec<ProcessSample> = self
            .read_all(now)?
            .into_iter()
            .filter_map(ProcessRead::sample)
            .collect();
        Ok(rank(samples, limit))
    }

    /// Reads every visible process in enumeration order. Per-process failures
    /// become [`ProcessRead::Skipped`]; only a failed enumeration or an
    /// unreadable memory total is an error.
    pub fn read_all(&self, now: Instant) -> Result<Vec<ProcessRead>, SampleError> {
        let pids = self.host.enumerate_processes()?;
        let memory_total = self.host.read_system_memory()?.total;

        let reads: Vec<ProcessRead> = pids
            .iter()
            .map(|&pid| match self.host.read_process_stats(pid) {
                Ok(stats) => ProcessRead::Sampled(self.to_sample(stats, memory_total, now)),
                Err(reason) => {
                    tracing::debug!(pid, %reason, "skipping process");
                    ProcessRead::Skipped { pid, reason }
                }
            })
            .collect();

        let alive: HashSet<u32> = pids.into_iter().collect();
        self.cache.retain_processes(&alive);
        Ok(reads)
    }

    fn to_sample(&self, stats: RawProcessStats, memory_total: u64, now: Instant) -> ProcessSample {
        ProcessSample {
            pid: stats.pid,
            cpu_pct: self
                .cache
                .process_cpu_percent(stats.pid, stats.cpu_time_ms, now),
            memory_pct: percent_of(stats.resident_bytes, memory_total),
            memory_mb: stats.resident_bytes as f64 / BYTES_PER_MB,
            name: stats.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::system::fake::FakeHost;

    const MB: u64 = 1024 * 1024;

    fn sample(pid: u32, cpu_pct: f32, memory_pct: f32) -> ProcessSample {
        ProcessSample {
            pid,
            name: format!("proc_{pid}"),
            cpu_pct,
            memory_pct,
            memory_mb: 0.0,
        }
    }

    fn ranker(host: FakeHost) -> (Arc<FakeHost>, ProcessRanker<FakeHost>) {
        let host = Arc::new(host);
        let ranker = ProcessRanker::new(Arc::clone(&host), Arc::new(CounterCache::new()));
        (host, ranker)
    }

    #[test]
    fn rank_orders_descending_and_truncates() {
        let samples = vec![
            sample(1, 5.0, 40.0),
            sample(2, 50.0, 10.0),
            sample(3, 20.0, 30.0),
        ];
        let ranked = rank(samples, 2);

        let cpu: Vec<u32> = ranked.top_cpu.iter().map(|p| p.pid).collect();
        let mem: Vec<u32> = ranked.top_memory.iter().map(|p| p.pid).collect();
        assert_eq!(cpu, vec![2, 3]);
        assert_eq!(mem, vec![1, 3]);
        assert_eq!(ranked.total_processes, 3);
    }

    #[test]
    fn ties_keep_enumeration_order() {
        let samples = vec![
            sample(4, 1.0, 2.0),
            sample(9, 3.0, 2.0),
            sample(6, 1.0, 2.0),
        ];
        let ranked = rank(samples, 10);

        let cpu: Vec<u32> = ranked.top_cpu.iter().map(|p| p.pid).collect();
        let mem: Vec<u32> = ranked.top_memory.iter().map(|p| p.pid).collect();
        assert_eq!(cpu, vec![9, 4, 6]);
        assert_eq!(mem, vec![4, 9, 6]);
    }

    #[test]
    fn skipped_processes_are_excluded_from_total() {
        let (_, ranker) = ranker(
            FakeHost::new()
                .with_process(1, "init", 10 * MB, 0)
                .with_unreadable_process(2, SkipReason::PermissionDenied)
                .with_unreadable_process(3, SkipReason::Zombie)
                .with_process(4, "shell", 20 * MB, 0),
        );

        let reads = ranker.read_all(Instant::now()).unwrap();
        assert_eq!(
            reads[1],
            ProcessRead::Skipped {
                pid: 2,
                reason: SkipReason::PermissionDenied
            }
        );
        assert_eq!(
            reads[2],
            ProcessRead::Skipped {
                pid: 3,
                reason: SkipReason::Zombie
            }
        );

        let ranked = ranker.rank_top(10).unwrap();
        assert_eq!(ranked.total_processes, 2);
        assert_eq!(ranked.top_memory[0].pid, 4);
    }

    #[test]
    fn memory_fields_are_derived_from_resident_size() {
        let (_, ranker) = ranker(
            FakeHost::new()
                .with_memory(16, 8, 8)
                .with_process(1, "db", 4 * 1024 * MB, 0),
        );
        let ranked = ranker.rank_top(10).unwrap();
        let db = &ranked.top_memory[0];
        assert_eq!(db.memory_mb, 4096.0);
        assert_eq!(db.memory_pct, 25.0);
    }

    #[test]
    fn cpu_is_zero_on_first_sight_then_delta() {
        let (host, ranker) = ranker(FakeHost::new().with_process(1, "worker", MB, 1_000));
        let t0 = Instant::now();

        let first = ranker.rank_top_at(10, t0).unwrap();
        assert_eq!(first.top_cpu[0].cpu_pct, 0.0);

        host.set_process_cpu_time(1, 2_000);
        let second = ranker.rank_top_at(10, t0 + Duration::from_secs(2)).unwrap();
        assert!((second.top_cpu[0].cpu_pct - 50.0).abs() < 1e-3);
    }

    #[test]
    fn names_are_not_truncated() {
        let long = "a-very-long-process-name-that-exceeds-thirty-columns";
        let (_, ranker) = ranker(FakeHost::new().with_process(1, long, MB, 0));
        let ranked = ranker.rank_top(10).unwrap();
        assert_eq!(ranked.top_cpu[0].name, long);
    }

    #[test]
    fn enumeration_failure_is_an_error() {
        let (_, ranker) = ranker(
            FakeHost::new().with_enumerate_error(SampleError::Host("no /proc".into())),
        );
        assert_eq!(
            ranker.rank_top(10),
            Err(SampleError::Host("no /proc".into()))
        );
    }

    #[test]
    fn exited_processes_are_pruned_from_cache() {
        let host = Arc::new(
            FakeHost::new()
                .with_process(1, "a", MB, 0)
                .with_process(2, "b", MB, 0),
        );
        let cache = Arc::new(CounterCache::new());
        let ranker = ProcessRanker::new(Arc::clone(&host), Arc::clone(&cache));

        ranker.rank_top(10).unwrap();
        assert_eq!(cache.tracked_processes(), 2);

        host.remove_process(2);
        ranker.rank_top(10).unwrap();
        assert_eq!(cache.tracked_processes(), 1);

        let calls = host.calls();
        assert_eq!(calls.enumerations, 2);
        assert_eq!(calls.process_reads, 3);
    }
}
