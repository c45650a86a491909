use std::fs::File;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, error, info};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger, format_description,
};
use time::OffsetDateTime;

use hardlink_dedupe::report::{self, RunReport};
use hardlink_dedupe::utils::format_human_elapsed;
use hardlink_dedupe::{Cli, Config, Dedupe, DedupeError, ExitCode, StopFlag, summary_line};

/// Logger configuration, and whether timestamps use the local offset.
fn log_config() -> (simplelog::Config, bool) {
    let mut builder = ConfigBuilder::new();
    builder.set_time_format_custom(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));
    let local_offset = builder.set_time_offset_to_local().is_ok();
    (builder.build(), local_offset)
}

fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let (config, local_offset) = log_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file: '{}'", path.display()))?;
        loggers.push(WriteLogger::new(level, config, file));
    }
    CombinedLogger::init(loggers).context("Failed to initialize logger")?;
    if !local_offset {
        debug!("Local time offset unavailable, logging timestamps in UTC");
    }
    Ok(())
}

fn run(cli: &Cli, config: &Config, started_at: OffsetDateTime) -> Result<()> {
    let start_time = Instant::now();
    info!("Starting hardlink-dedupe v{}", env!("CARGO_PKG_VERSION"));
    debug!("Command line arguments: {:?}", cli);
    debug!("Effective configuration: {:?}", config);

    let root = cli
        .path
        .canonicalize()
        .with_context(|| format!("Failed to resolve path: {}", cli.path.display()))?;
    if !root.is_dir() {
        bail!("Path is not a directory: {}", root.display());
    }
    info!("Target directory: '{}'", root.display());
    if config.dry_run {
        info!("Dry run: no files will be changed");
    }

    let stop = StopFlag::new();
    stop.install_handler()
        .context("Failed to install interrupt handler")?;

    let summary = Dedupe::new(config)
        .with_progress(!cli.no_progress)
        .with_stop_flag(stop)
        .run(&root)?;

    if let Some(path) = &cli.report {
        RunReport::new(started_at, &root, config, &summary)?.write_to(path)?;
        info!("Report written to '{}'", path.display());
    }
    if !cli.quiet {
        println!("{}", summary_line(&summary, config.dry_run));
    }

    info!(
        "Completed in {}",
        format_human_elapsed(start_time.elapsed())
    );
    Ok(())
}

fn main() -> std::process::ExitCode {
    // Read the local offset before any thread is spawned.
    let started_at = report::now();
    let cli = Cli::parse();

    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::Failure.into();
        }
    };
    if let Err(err) = init_logging(config.log_level.to_level_filter(), cli.log_file.as_deref()) {
        eprintln!("Error: {err:#}");
        return ExitCode::Failure.into();
    }

    match run(&cli, &config, started_at) {
        Ok(()) => ExitCode::Success.into(),
        Err(err) => {
            error!("{err:#}");
            err.downcast_ref::<DedupeError>()
                .map_or(ExitCode::Failure, DedupeError::exit_code)
                .into()
        }
    }
}
