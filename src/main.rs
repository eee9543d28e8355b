use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use epaper_agenda::config::Config;
use epaper_agenda::runner::{self, Clock, LocalClock};
use epaper_agenda::schedule::{AgendaFile, NoSchedule, ScheduleSource};

const USAGE: &str = "usage: epaper-agenda [--dry-run PATH]";

/// Output path of `--dry-run`, if given.
fn parse_args() -> Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let mut dry_run = None;

    while let Some(arg) = args.next() {
        if arg == "--dry-run" {
            let path = args.next().context(USAGE)?;
            dry_run = Some(PathBuf::from(path));
        } else if let Some(path) = arg.strip_prefix("--dry-run=") {
            dry_run = Some(PathBuf::from(path));
        } else {
            bail!("unexpected argument {:?}\n{}", arg, USAGE);
        }
    }

    Ok(dry_run)
}

fn schedule_source(config: &Config) -> Box<dyn ScheduleSource> {
    match &config.agenda_file {
        Some(path) => {
            log::info!("Reading agenda from {}", path.display());
            Box::new(AgendaFile::new(path))
        }
        None => {
            log::info!("No AGENDA_FILE set, showing a free day");
            Box::new(NoSchedule)
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let dry_run = parse_args()?;

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    log::debug!("{:?}", config);

    let mut source = schedule_source(&config);

    if let Some(path) = dry_run {
        runner::dry_run(&config, &mut source, LocalClock.now(), &path)?;
        return Ok(());
    }

    log::info!("Starting epaper-agenda {}", env!("CARGO_PKG_VERSION"));
    run_display(&config, source)
}

#[cfg(target_os = "linux")]
fn run_display(config: &Config, source: Box<dyn ScheduleSource>) -> Result<()> {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use epaper_agenda::epd::waveshare::WaveshareLoader;
    use epaper_agenda::runner::Runner;

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        log::info!("Termination signal received");
        flag.store(true, Ordering::SeqCst);
    })
    .context("installing signal handler")?;

    let mut runner = Runner::new(config, source, WaveshareLoader::new(config), LocalClock);
    runner.run(&stop)
}

#[cfg(not(target_os = "linux"))]
fn run_display(_config: &Config, _source: Box<dyn ScheduleSource>) -> Result<()> {
    bail!("driving the panel needs Linux spidev and GPIO, use --dry-run PATH")
}
