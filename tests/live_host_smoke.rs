use std::path::PathBuf;
use std::sync::Arc;

use vitals::system::collector::SysinfoHost;
use vitals::system::host::SampleError;
use vitals::system::monitor::Monitor;
use vitals::system::sampler::SamplerSettings;
use vitals::system::snapshot::SampleField;

#[test]
fn live_cycle_has_sane_values() {
    let mut monitor = Monitor::new(
        Arc::new(SysinfoHost::new()),
        SamplerSettings::default(),
        5,
        10,
    );

    let cycle = monitor.sample_cycle();
    let snapshot = &cycle.snapshot;

    let cpu = snapshot.cpu.as_ref().expect("cpu sample failed");
    assert!((0.0..=100.0).contains(&cpu.usage_pct));
    assert!(cpu.logical_cores >= 1);
    assert!(cpu.physical_cores >= 1);
    if let Some(mhz) = cpu.frequency_mhz {
        assert!(mhz > 0.0);
    }

    let memory = snapshot.memory.as_ref().expect("memory sample failed");
    assert!((0.0..=100.0).contains(&memory.usage_pct));
    assert!(memory.total_gb > 0.0);

    if let Some(disk) = &snapshot.disk {
        assert!((0.0..=100.0).contains(&disk.usage_pct));
        assert!(disk.free_gb >= 0.0);
    }

    let network = snapshot.network.as_ref().expect("network sample failed");
    assert!(network.total_gb >= network.sent_gb);

    assert!(snapshot.uptime_seconds.expect("uptime sample failed") >= 0.0);

    let ranked = cycle.processes.expect("process ranking failed");
    assert!(ranked.total_processes >= 1);
    assert!(ranked.top_cpu.len() <= 5);
    assert!(ranked.top_memory.len() <= 5);
}

#[test]
fn live_missing_mount_leaves_siblings_intact() {
    let mut monitor = Monitor::new(
        Arc::new(SysinfoHost::new()),
        SamplerSettings {
            disk_mount: PathBuf::from("/nonexistent"),
            ..SamplerSettings::default()
        },
        5,
        10,
    );

    let cycle = monitor.sample_cycle();
    assert!(matches!(
        cycle.snapshot.failure(SampleField::Disk),
        Some(SampleError::DiskUnavailable { .. })
    ));
    assert!(cycle.snapshot.cpu.is_some());
    assert!(cycle.snapshot.memory.is_some());
    assert!(cycle.snapshot.network.is_some());
    assert!(cycle.snapshot.uptime_seconds.is_some());
}
