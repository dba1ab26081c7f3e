use clap::{Parser, Subcommand, ValueEnum};
use spdlog::{Level, LevelFilter, error, info};
use stall_watch::{AlertRouter, Config, ShutdownHandle, StallMonitor, StreamQueues, replay_csv};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "stall-watch")]
#[command(about = "Replays smoker sensor data and watches it for stalls", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the stream queues (overrides `queues.dir`)
    #[arg(long, global = true)]
    queue_dir: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish every row of a smoker CSV export to the stream queues
    Produce {
        /// CSV file with a header and `timestamp,smoker,foodA,foodB` rows
        #[arg(long)]
        csv: PathBuf,

        /// Seconds to wait between rows (overrides `replay.interval_secs`)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Watch the stream queues and write stall alerts
    Consume,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Critical,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Critical => Level::Critical,
            LogLevel::Error => Level::Error,
            LogLevel::Warn => Level::Warn,
            LogLevel::Info => Level::Info,
            LogLevel::Debug => Level::Debug,
            LogLevel::Trace => Level::Trace,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    spdlog::default_logger().set_level_filter(LevelFilter::MoreSevereEqual(cli.log_level.into()));

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = cli.queue_dir {
        config.queues.dir = dir;
    }

    let shutdown = ShutdownHandle::new();
    let handle = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Interrupt received, shutting down");
        handle.request();
    })?;

    match cli.command {
        Commands::Produce { csv, interval_secs } => {
            if let Some(secs) = interval_secs {
                config.replay.interval_secs = secs;
            }
            produce(&config, csv, shutdown)
        }
        Commands::Consume => consume(&config, shutdown),
    }
}

fn produce(config: &Config, csv: PathBuf, shutdown: ShutdownHandle) -> Result<(), Box<dyn Error>> {
    let mut queues = StreamQueues::open(&config.queues.dir, config.queues.capacity)?;
    let input = BufReader::new(File::open(&csv)?);
    info!(
        "Replaying {:?} into {:?} every {}s",
        csv, config.queues.dir, config.replay.interval_secs
    );
    replay_csv(input, &mut queues, config.replay.interval(), &shutdown)?;
    Ok(())
}

fn consume(config: &Config, shutdown: ShutdownHandle) -> Result<(), Box<dyn Error>> {
    let queues = StreamQueues::open(&config.queues.dir, config.queues.capacity)?;
    let router = AlertRouter::csv(&config.alerts.smoker_log, &config.alerts.food_log);
    let monitor = StallMonitor::start_with_shutdown(config, &queues, router, shutdown.clone())?;
    info!(" [*] Waiting for readings. To exit press CTRL+C");

    while shutdown.sleep(Duration::from_millis(200)) {
        if monitor.is_any_worker_panicked() {
            error!("A stream worker died, shutting down");
            break;
        }
    }

    let result = monitor.stop();
    queues.flush()?;
    result?;
    Ok(())
}
