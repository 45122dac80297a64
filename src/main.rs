use anyhow::Context;
use clap::Parser;
use herowatch::cli::{self, output::OutputMode, Cli, Commands};
use herowatch::config::{AppConfig, LoggingConfig};
use herowatch::domain::RunStatus;
use herowatch::error::{Result, TrackerError};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config_dir)
        .with_context(|| format!("loading configuration from {}", cli.config_dir))?;
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Configuration error: {}", e);
        }
        return Err(TrackerError::Validation(format!(
            "{} configuration error(s)",
            errors.len()
        )));
    }

    match &cli.command {
        Commands::Scrape => {
            let guard = init_logging(&config.logging);
            let summary = cli::run_scrape(&config).await;
            match summary {
                Ok(summary) if summary.status == RunStatus::Failed => {
                    error!("Every combination failed");
                    drop(guard);
                    std::process::exit(1);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Scrape run aborted: {}", e);
                    drop(guard);
                    return Err(e);
                }
            }
        }
        Commands::Serve { port } => {
            let _guard = init_logging(&config.logging);
            info!("Starting herowatch API");
            cli::run_serve(&config, *port).await?;
        }
        command => {
            init_logging_simple();
            cli::run_query(command, &config, OutputMode::from_json_flag(cli.json)).await?;
        }
    }

    Ok(())
}

/// Console logging plus an optional daily-rotated `scraper.log`.
///
/// `RUST_LOG` overrides the configured level. The returned guard flushes the
/// file writer on drop.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("info,herowatch={},sqlx=warn", config.level))
    });

    // Log directory: config first, then HEROWATCH_LOG_DIR
    let log_dir = config
        .dir
        .clone()
        .or_else(|| std::env::var("HEROWATCH_LOG_DIR").ok());

    let mut guard = None;
    let file_layer = match log_dir {
        Some(dir) => match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::daily(&dir, "scraper.log");
                let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
                guard = Some(worker_guard);
                eprintln!("Logging to: {}/scraper.log", dir);
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not create log directory {} ({}), file logging disabled",
                    dir, e
                );
                None
            }
        },
        None => None,
    };

    // Console layer, plain or JSON
    let json_layer = config
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_target(true));
    let console_layer = (!config.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    guard
}

fn init_logging_simple() {
    // Minimal logging for query commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
