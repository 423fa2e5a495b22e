use std::sync::Arc;

use serde::Serialize;

use super::cache::CounterCache;
use super::history::{HistoryBuffer, HistoryPoint};
use super::host::{HostOs, SampleError};
use super::process::{ProcessRanker, RankedProcesses};
use super::sampler::{MetricSampler, SamplerSettings};
use super::snapshot::Snapshot;

/// Everything one sampling cycle produced.
#[derive(Debug, Clone, Serialize)]
pub struct Cycle {
    pub snapshot: Snapshot,
    #[serde(serialize_with = "serialize_ranking")]
    pub processes: Result<RankedProcesses, SampleError>,
}

fn serialize_ranking<S: serde::Serializer>(
    ranking: &Result<RankedProcesses, SampleError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(1))?;
    match ranking {
        Ok(ranked) => map.serialize_entry("ranked", ranked)?,
        Err(error) => map.serialize_entry("error", &error.to_string())?,
    }
    map.end()
}

/// Owns one sampler, ranker and history window over a shared host.
pub struct Monitor<H> {
    sampler: MetricSampler<H>,
    ranker: ProcessRanker<H>,
    history: HistoryBuffer,
    limit: usize,
}

impl<H: HostOs> Monitor<H> {
    pub fn new(host: Arc<H>, settings: SamplerSettings, limit: usize, history: usize) -> Self {
        let cache = Arc::new(CounterCache::new());
        Monitor {
            sampler: MetricSampler::new(Arc::clone(&host), Arc::clone(&cache), settings),
            ranker: ProcessRanker::new(host, cache),
            history: HistoryBuffer::new(history),
            limit,
        }
    }

    /// Runs one full cycle: system sub-samples, the process ranking, and a
    /// history append when both CPU and memory were read.
    pub fn sample_cycle(&mut self) -> Cycle {
        let _span = tracing::debug_span!("monitor.sample_cycle").entered();

        let snapshot = self.sampler.sample();
        let processes = self.ranker.rank_top(self.limit);
        if let Err(error) = &processes {
            tracing::warn!(%error, "process ranking failed");
        }

        if let (Some(cpu), Some(memory)) = (&snapshot.cpu, &snapshot.memory) {
            self.history
                .append(HistoryPoint::now(cpu.usage_pct, memory.usage_pct));
        }

        Cycle {
            snapshot,
            processes,
        }
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::system::fake::FakeHost;

    fn monitor(host: FakeHost, history: usize) -> Monitor<FakeHost> {
        let settings = SamplerSettings {
            cpu_window: Duration::ZERO,
            cpu_staleness: Duration::ZERO,
            ..SamplerSettings::default()
        };
        Monitor::new(Arc::new(host), settings, 3, history)
    }

    #[test]
    fn cycle_appends_history() {
        let mut monitor = monitor(FakeHost::new().with_process(1, "a", 1024, 0), 2);
        for _ in 0..3 {
            let cycle = monitor.sample_cycle();
            assert!(cycle.snapshot.is_complete());
            assert_eq!(cycle.processes.unwrap().total_processes, 1);
        }
        assert_eq!(monitor.history().len(), 2);
        let latest = monitor.history().latest().unwrap();
        assert_eq!(latest.cpu_pct, 25.0);
        assert_eq!(latest.mem_pct, 50.0);
    }

    #[test]
    fn missing_cpu_skips_history_but_not_ranking() {
        let mut monitor = monitor(
            FakeHost::new()
                .with_system_cpu_error(SampleError::Unavailable("cpu usage"))
                .with_process(1, "a", 1024, 0),
            10,
        );
        let cycle = monitor.sample_cycle();
        assert!(cycle.snapshot.cpu.is_none());
        assert!(cycle.processes.is_ok());
        assert!(monitor.history().is_empty());
    }

    #[test]
    fn ranking_failure_is_reported_alongside_snapshot() {
        let mut monitor = monitor(
            FakeHost::new().with_enumerate_error(SampleError::Host("denied".into())),
            10,
        );
        let cycle = monitor.sample_cycle();
        assert!(cycle.snapshot.is_complete());
        assert!(cycle.processes.is_err());

        let json = serde_json::to_value(&cycle).unwrap();
        assert_eq!(json["processes"]["error"], "host read failed: denied");
    }
}
