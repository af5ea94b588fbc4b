use clap::Parser;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

use ralphr::config::Config;
use ralphr::prompt;
use ralphr::runner::{LoopRunner, RunOptions};

mod cli;

use cli::Cli;

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ralphr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("ralphr.log");

    // Setup env_logger with file output; the console belongs to the
    // iteration display.
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::from_default_env();
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;
    info!("Starting with config from: {:?}", cli.config);

    // CLI flags override config values
    if let Some(path) = &cli.activity_file {
        config.activity.path = path.clone();
    }
    if cli.no_notify {
        config.notify.enabled = false;
    }

    // Fatal precondition: a missing prompt file is reported before any
    // iteration starts and before any activity log exists.
    let prompt_text = prompt::load(&cli.prompt_file)?;

    let options = RunOptions {
        iterations: cli.iterations,
        prompt: prompt_text,
        prompt_label: cli.prompt_file.display().to_string(),
        stop_on_complete: cli.effective_stop_on_complete(),
        verbose: cli.verbose,
    };

    // One process-wide interrupt listener for the life of the run. The
    // watch channel is observed between iterations and inside the
    // supervisor's read loop.
    let (interrupt_tx, interrupt_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            let _ = interrupt_tx.send(true);
        }
    });

    let runner = LoopRunner::new(options, &config);
    let report = runner.run(interrupt_rx).await.context("Run failed")?;

    info!("Exiting with code {}", report.exit_code());
    std::process::exit(report.exit_code());
}
