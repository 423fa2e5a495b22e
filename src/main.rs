use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use vitals::config::{self, Config, load_config, load_config_from_path};
use vitals::event::{Event, Ticker};
use vitals::logging::{self, LogFormat};
use vitals::report;
use vitals::system::collector::SysinfoHost;
use vitals::system::kill::ProcessController;
use vitals::system::monitor::Monitor;

#[derive(Parser)]
#[command(
    name = "vitals",
    about = "Samples host CPU, memory, disk, network and top processes"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Refresh rate in milliseconds
    #[arg(long)]
    refresh_rate: Option<u64>,

    /// Number of processes in each ranking
    #[arg(long)]
    limit: Option<usize>,

    /// Mount point reported as the disk
    #[arg(long)]
    mount: Option<PathBuf>,

    /// Number of points kept in the CPU/memory history window
    #[arg(long)]
    history: Option<usize>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<String>,

    /// Print one JSON document per cycle instead of the text report
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Sample a single cycle and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Stop after this many cycles
    #[arg(long)]
    cycles: Option<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Terminate a process: SIGTERM, then SIGKILL if it outlives the grace period
    Kill {
        pid: u32,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);
    logging::init(
        logging::parse_level(&config.general.log_level)?,
        LogFormat::from_str_config(&config.general.log_format),
    )?;

    match cli.command {
        Some(Command::Kill { pid }) => kill(config, pid).await,
        None => {
            let max_cycles = if cli.once { Some(1) } else { cli.cycles };
            run(config, cli.json, max_cycles).await
        }
    }
}

async fn run(config: Config, json: bool, max_cycles: Option<usize>) -> Result<()> {
    if config.general.refresh_rate_ms == 0 {
        return Err(eyre!("--refresh-rate must be greater than 0"));
    }
    let tick_rate = Duration::from_millis(config.general.refresh_rate_ms);
    let host = Arc::new(SysinfoHost::new());
    let mut monitor = Monitor::new(
        host,
        config.sampling.sampler_settings(),
        config.general.process_limit,
        config.history.capacity,
    );
    let mut ticker = Ticker::new(tick_rate);
    let mut completed = 0usize;

    while let Some(event) = ticker.next().await {
        match event {
            Event::Tick => {
                // The CPU measurement blocks, keep it off the event loop.
                let (returned, cycle) = tokio::task::spawn_blocking(move || {
                    let cycle = monitor.sample_cycle();
                    (monitor, cycle)
                })
                .await?;
                monitor = returned;

                if json {
                    println!("{}", report::render_json(&cycle, monitor.history())?);
                } else {
                    println!("{}\n", report::render_text(&cycle));
                }

                completed += 1;
                if max_cycles.is_some_and(|max| completed >= max) {
                    break;
                }
            }
            Event::Shutdown => break,
        }
    }

    Ok(())
}

async fn kill(config: Config, pid: u32) -> Result<()> {
    let controller = ProcessController::with_timing(
        Arc::new(SysinfoHost::new()),
        config.termination.grace_timeout(),
        config.termination.poll_interval(),
    );
    let outcome = tokio::task::spawn_blocking(move || controller.terminate(pid)).await?;

    println!("PID {pid}: {outcome}");
    if outcome.is_success() {
        Ok(())
    } else {
        Err(eyre!("could not terminate PID {pid}: {outcome}"))
    }
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(rate) = cli.refresh_rate {
        config.general.refresh_rate_ms = rate;
    }
    if let Some(limit) = cli.limit {
        config.general.process_limit = limit;
    }
    if let Some(ref mount) = cli.mount {
        config.sampling.disk_mount = mount.clone();
    }
    if let Some(history) = cli.history {
        config.history.capacity = history;
    }
    if let Some(ref level) = cli.log_level {
        config.general.log_level = level.clone();
    }

    config
}
