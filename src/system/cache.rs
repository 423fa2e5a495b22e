use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::host::SampleError;

pub const DEFAULT_STALENESS: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct CachedCpu {
    value: f32,
    refreshed_at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct CpuTimeMark {
    cpu_time_ms: u64,
    seen_at: Instant,
}

/// Previous counter readings used to skip redundant samples and derive rates.
///
/// Both maps sit behind their own lock, so the cache can be shared by
/// sub-samples running on different threads.
#[derive(Debug, Default)]
pub struct CounterCache {
    system_cpu: Mutex<Option<CachedCpu>>,
    process_cpu: Mutex<HashMap<u32, CpuTimeMark>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CounterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached system CPU% if it was refreshed less than `staleness`
    /// before `now`, otherwise calls `refresh` and caches its result.
    ///
    /// The lock is held across `refresh`, so concurrent callers inside one
    /// window trigger a single host read. A failed refresh leaves the previous
    /// entry untouched and is returned to the caller.
    pub fn get_or_refresh_system_cpu<F>(
        &self,
        now: Instant,
        staleness: Duration,
        refresh: F,
    ) -> Result<f32, SampleError>
    where
        F: FnOnce() -> Result<f32, SampleError>,
    {
        let mut entry = lock(&self.system_cpu);
        if let Some(cached) = *entry
            && now.saturating_duration_since(cached.refreshed_at) < staleness
        {
            tracing::debug!(value = cached.value, "system cpu cache hit");
            return Ok(cached.value);
        }

        let raw = refresh()?;
        let value = if raw.is_finite() {
            raw.clamp(0.0, 100.0)
        } else {
            0.0
        };
        tracing::debug!(value, "system cpu cache refreshed");
        *entry = Some(CachedCpu {
            value,
            refreshed_at: now,
        });
        Ok(value)
    }

    /// CPU% of `pid` since it was last observed, from its cumulative CPU time.
    ///
    /// The first observation of a pid has no baseline and yields `0.0`. A
    /// counter that went backwards means the pid was reused, and also yields
    /// `0.0` while re-seeding the baseline.
    pub fn process_cpu_percent(&self, pid: u32, cpu_time_ms: u64, now: Instant) -> f32 {
        let mut marks = lock(&self.process_cpu);
        let previous = marks.insert(
            pid,
            CpuTimeMark {
                cpu_time_ms,
                seen_at: now,
            },
        );
        let Some(previous) = previous else {
            return 0.0;
        };

        let wall_ms = now.saturating_duration_since(previous.seen_at).as_secs_f64() * 1000.0;
        if wall_ms <= 0.0 || cpu_time_ms < previous.cpu_time_ms {
            return 0.0;
        }
        let busy_ms = (cpu_time_ms - previous.cpu_time_ms) as f64;
        (busy_ms / wall_ms * 100.0) as f32
    }

    /// Drop per-process baselines for pids that are no longer alive.
    pub fn retain_processes(&self, alive: &HashSet<u32>) {
        lock(&self.process_cpu).retain(|pid, _| alive.contains(pid));
    }

    pub fn tracked_processes(&self) -> usize {
        lock(&self.process_cpu).len()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn second_call_within_window_reuses_value() {
        let cache = CounterCache::new();
        let calls = Cell::new(0);
        let t0 = Instant::now();

        let first = cache
            .get_or_refresh_system_cpu(t0, DEFAULT_STALENESS, || {
                calls.set(calls.get() + 1);
                Ok(42.5)
            })
            .unwrap();
        let second = cache
            .get_or_refresh_system_cpu(t0 + Duration::from_millis(500), DEFAULT_STALENESS, || {
                calls.set(calls.get() + 1);
                Ok(99.0)
            })
            .unwrap();

        assert_eq!(first, 42.5);
        assert_eq!(second, 42.5);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn concurrent_callers_in_one_window_share_a_single_read() {
        let cache = CounterCache::new();
        let reads = AtomicUsize::new(0);
        let now = Instant::now();

        let values: Vec<f32> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let (cache, reads) = (&cache, &reads);
                    scope.spawn(move || {
                        cache
                            .get_or_refresh_system_cpu(now, DEFAULT_STALENESS, || {
                                reads.fetch_add(1, Ordering::SeqCst);
                                // Hold the refresh open so the other callers pile up.
                                std::thread::sleep(Duration::from_millis(20));
                                Ok(10.0 + i as f32)
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|&v| v == values[0]));
    }

    #[test]
    fn stale_entry_is_refreshed() {
        let cache = CounterCache::new();
        let t0 = Instant::now();
        cache
            .get_or_refresh_system_cpu(t0, DEFAULT_STALENESS, || Ok(10.0))
            .unwrap();
        let value = cache
            .get_or_refresh_system_cpu(t0 + Duration::from_secs(1), DEFAULT_STALENESS, || {
                Ok(20.0)
            })
            .unwrap();
        assert_eq!(value, 20.0);
    }

    #[test]
    fn failed_refresh_propagates_and_keeps_nothing() {
        let cache = CounterCache::new();
        let t0 = Instant::now();
        let err = cache
            .get_or_refresh_system_cpu(t0, DEFAULT_STALENESS, || {
                Err(SampleError::Host("boom".into()))
            })
            .unwrap_err();
        assert_eq!(err, SampleError::Host("boom".into()));

        let value = cache
            .get_or_refresh_system_cpu(t0, DEFAULT_STALENESS, || Ok(7.0))
            .unwrap();
        assert_eq!(value, 7.0);
    }

    #[test]
    fn refreshed_value_is_clamped() {
        let cache = CounterCache::new();
        let value = cache
            .get_or_refresh_system_cpu(Instant::now(), DEFAULT_STALENESS, || Ok(100.4))
            .unwrap();
        assert_eq!(value, 100.0);
    }

    #[test]
    fn process_cpu_is_delta_over_wall_time() {
        let cache = CounterCache::new();
        let t0 = Instant::now();
        assert_eq!(cache.process_cpu_percent(7, 1_000, t0), 0.0);
        // 500ms of CPU over 2s of wall time
        let pct = cache.process_cpu_percent(7, 1_500, t0 + Duration::from_secs(2));
        assert!((pct - 25.0).abs() < 1e-3);
    }

    #[test]
    fn reused_pid_reseeds_baseline() {
        let cache = CounterCache::new();
        let t0 = Instant::now();
        cache.process_cpu_percent(7, 5_000, t0);
        assert_eq!(
            cache.process_cpu_percent(7, 10, t0 + Duration::from_secs(1)),
            0.0
        );
        let pct = cache.process_cpu_percent(7, 110, t0 + Duration::from_secs(2));
        assert!((pct - 10.0).abs() < 1e-3);
    }

    #[test]
    fn retain_drops_dead_pids() {
        let cache = CounterCache::new();
        let now = Instant::now();
        cache.process_cpu_percent(1, 0, now);
        cache.process_cpu_percent(2, 0, now);
        cache.process_cpu_percent(3, 0, now);

        let alive: HashSet<u32> = [1, 3].into_iter().collect();
        cache.retain_processes(&alive);
        assert_eq!(cache.tracked_processes(), 2);
    }
}
