use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::system::history::DEFAULT_CAPACITY;
use crate::system::process::DEFAULT_LIMIT;
use crate::system::sampler::SamplerSettings;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub sampling: SamplingConfig,
    pub history: HistoryConfig,
    pub termination: TerminationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub refresh_rate_ms: u64,
    pub process_limit: usize,
    pub log_level: String,
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            refresh_rate_ms: 2000,
            process_limit: DEFAULT_LIMIT,
            log_level: "warn".to_string(),
            log_format: "text".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub cpu_window_ms: u64,
    pub cpu_staleness_ms: u64,
    pub disk_mount: PathBuf,
    pub parallel: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            cpu_window_ms: 100,
            cpu_staleness_ms: 1000,
            disk_mount: PathBuf::from("/"),
            parallel: true,
        }
    }
}

impl SamplingConfig {
    pub fn sampler_settings(&self) -> SamplerSettings {
        SamplerSettings {
            cpu_window: Duration::from_millis(self.cpu_window_ms),
            cpu_staleness: Duration::from_millis(self.cpu_staleness_ms),
            disk_mount: self.disk_mount.clone(),
            parallel: self.parallel,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TerminationConfig {
    pub grace_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        TerminationConfig {
            grace_timeout_ms: 3000,
            poll_interval_ms: 50,
        }
    }
}

impl TerminationConfig {
    pub fn grace_timeout(&self) -> Duration {
        Duration::from_millis(self.grace_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("vitals").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(path = %path.display(), %err, "invalid config, using defaults");
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}
