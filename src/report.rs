//! Text and JSON renderings of a cycle for the command-line consumer.

use crate::format::{NAME_WIDTH, format_gb, format_pct, format_uptime, or_na, pad_unicode};
use crate::system::history::HistoryBuffer;
use crate::system::host::SampleError;
use crate::system::monitor::Cycle;
use crate::system::process::ProcessSample;
use crate::system::snapshot::{SampleField, Snapshot};

fn field_line<T>(
    lines: &mut Vec<String>,
    label: &str,
    value: Option<&T>,
    failure: Option<&SampleError>,
    render: impl FnOnce(&T) -> String,
) {
    let body = match (value, failure) {
        (Some(v), _) => render(v),
        (None, Some(err)) => format!("N/A ({err})"),
        (None, None) => "N/A".to_string(),
    };
    lines.push(format!("{label:<10}{body}"));
}

fn overview(lines: &mut Vec<String>, snapshot: &Snapshot) {
    field_line(
        lines,
        "CPU",
        snapshot.cpu.as_ref(),
        snapshot.failure(SampleField::Cpu),
        |cpu| {
            format!(
                "{} ({} logical / {} physical, {})",
                format_pct(cpu.usage_pct),
                cpu.logical_cores,
                cpu.physical_cores,
                or_na(cpu.frequency_mhz, |mhz| format!("{mhz:.0} MHz"))
            )
        },
    );
    field_line(
        lines,
        "Memory",
        snapshot.memory.as_ref(),
        snapshot.failure(SampleField::Memory),
        |m| {
            format!(
                "{} ({} used / {} total, {} free)",
                format_pct(m.usage_pct),
                format_gb(m.used_gb),
                format_gb(m.total_gb),
                format_gb(m.free_gb)
            )
        },
    );
    field_line(
        lines,
        "Disk",
        snapshot.disk.as_ref(),
        snapshot.failure(SampleField::Disk),
        |d| {
            format!(
                "{} ({} used / {} total, {} free)",
                format_pct(d.usage_pct),
                format_gb(d.used_gb),
                format_gb(d.total_gb),
                format_gb(d.free_gb)
            )
        },
    );
    field_line(
        lines,
        "Network",
        snapshot.network.as_ref(),
        snapshot.failure(SampleField::Network),
        |n| {
            format!(
                "{:.2} GB sent, {:.2} GB received ({:.2} GB cumulative)",
                n.sent_gb, n.recv_gb, n.total_gb
            )
        },
    );
    field_line(
        lines,
        "Uptime",
        snapshot.uptime_seconds.as_ref(),
        snapshot.failure(SampleField::Uptime),
        |secs| format_uptime(*secs),
    );
    field_line(
        lines,
        "Temps",
        snapshot.temperatures.as_ref(),
        snapshot.failure(SampleField::Temperatures),
        |temps| {
            temps
                .iter()
                .map(|t| format!("{} {:.1}\u{b0}C", t.label, t.celsius))
                .collect::<Vec<_>>()
                .join(", ")
        },
    );
}

fn process_table(lines: &mut Vec<String>, title: &str, rows: &[ProcessSample]) {
    lines.push(String::new());
    lines.push(title.to_string());
    lines.push(format!(
        "{:>7}  {}  {:>6}  {:>6}  {:>9}",
        "PID",
        pad_unicode("NAME", NAME_WIDTH),
        "CPU%",
        "MEM%",
        "MEM MB"
    ));
    for p in rows {
        lines.push(format!(
            "{:>7}  {}  {:>6.1}  {:>6.1}  {:>9.1}",
            p.pid,
            pad_unicode(&p.name, NAME_WIDTH),
            p.cpu_pct,
            p.memory_pct,
            p.memory_mb
        ));
    }
}

pub fn render_text(cycle: &Cycle) -> String {
    let mut lines = Vec::new();
    overview(&mut lines, &cycle.snapshot);

    match &cycle.processes {
        Ok(ranked) => {
            lines.push(format!("{:<10}{}", "Processes", ranked.total_processes));
            process_table(&mut lines, "Top processes by CPU", &ranked.top_cpu);
            process_table(&mut lines, "Top processes by memory", &ranked.top_memory);
        }
        Err(err) => lines.push(format!("{:<10}N/A ({err})", "Processes")),
    }

    lines
        .iter()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_json(cycle: &Cycle, history: &HistoryBuffer) -> serde_json::Result<String> {
    let value = serde_json::json!({
        "cycle": cycle,
        "history": history.snapshot(),
    });
    serde_json::to_string(&value)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use insta::assert_snapshot;

    use super::*;
    use crate::system::history::HistoryPoint;
    use crate::system::process::RankedProcesses;
    use crate::system::snapshot::{
        CpuMetrics, MemoryMetrics, NetworkMetrics, SampleFailure, Temperature,
    };

    fn process(
        pid: u32,
        name: &str,
        cpu_pct: f32,
        memory_pct: f32,
        memory_mb: f64,
    ) -> ProcessSample {
        ProcessSample {
            pid,
            name: name.to_string(),
            cpu_pct,
            memory_pct,
            memory_mb,
        }
    }

    fn cycle() -> Cycle {
        let init = process(1, "init", 0.0, 1.5, 245.8);
        let long = process(
            4242,
            "a-very-long-process-name-that-exceeds-thirty-columns",
            75.3,
            10.0,
            1638.4,
        );
        Cycle {
            snapshot: Snapshot {
                cpu: Some(CpuMetrics {
                    usage_pct: 12.5,
                    logical_cores: 8,
                    physical_cores: 4,
                    frequency_mhz: Some(2400.0),
                }),
                memory: Some(MemoryMetrics {
                    total_gb: 16.0,
                    used_gb: 8.0,
                    free_gb: 8.0,
                    usage_pct: 50.0,
                }),
                disk: None,
                network: Some(NetworkMetrics {
                    sent_gb: 1.0,
                    recv_gb: 2.0,
                    total_gb: 3.0,
                }),
                uptime_seconds: Some(3_660.0),
                temperatures: Some(vec![Temperature {
                    label: "cpu".to_string(),
                    celsius: 45.0,
                }]),
                failures: vec![SampleFailure {
                    field: SampleField::Disk,
                    error: SampleError::DiskUnavailable {
                        mount: PathBuf::from("/nonexistent"),
                        reason: "No such file or directory".to_string(),
                    },
                }],
            },
            processes: Ok(RankedProcesses {
                top_cpu: vec![long.clone(), init.clone()],
                top_memory: vec![long, init],
                total_processes: 2,
            }),
        }
    }

    #[test]
    fn text_report() {
        assert_snapshot!(render_text(&cycle()), @r"
CPU       12.5% (8 logical / 4 physical, 2400 MHz)
Memory    50.0% (8.0 GB used / 16.0 GB total, 8.0 GB free)
Disk      N/A (disk at /nonexistent is unavailable: No such file or directory)
Network   1.00 GB sent, 2.00 GB received (3.00 GB cumulative)
Uptime    0d 1h 1m
Temps     cpu 45.0°C
Processes 2

Top processes by CPU
    PID  NAME                              CPU%    MEM%     MEM MB
   4242  a-very-long-process-name-that…    75.3    10.0     1638.4
      1  init                               0.0     1.5      245.8

Top processes by memory
    PID  NAME                              CPU%    MEM%     MEM MB
   4242  a-very-long-process-name-that…    75.3    10.0     1638.4
      1  init                               0.0     1.5      245.8
");
    }

    #[test]
    fn ranking_failure_is_shown_as_na() {
        let mut cycle = cycle();
        cycle.processes = Err(SampleError::Host("no /proc".into()));
        let text = render_text(&cycle);
        assert!(text.ends_with("Processes N/A (host read failed: no /proc)"));
    }

    #[test]
    fn json_report_includes_history() {
        let mut history = HistoryBuffer::new(2);
        history.append(HistoryPoint {
            timestamp: "12:00:00".to_string(),
            cpu_pct: 12.5,
            mem_pct: 50.0,
        });
        let json = render_json(&cycle(), &history).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["history"][0]["timestamp"], "12:00:00");
        assert_eq!(value["cycle"]["snapshot"]["cpu"]["usage_pct"], 12.5);
        assert!(value["cycle"]["snapshot"]["disk"].is_null());
        assert_eq!(
            value["cycle"]["processes"]["ranked"]["top_cpu"][0]["name"],
            "a-very-long-process-name-that-exceeds-thirty-columns"
        );
        assert_eq!(value["cycle"]["snapshot"]["network"]["total_gb"], 3.0);
    }
}
