use anyhow::Result;
use chrono::Local;
use std::fs;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Filter used when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info";

pub fn init_logger(log_dir: &Path, log_to_stdout: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(false);

    if log_to_stdout {
        tracing::subscriber::set_global_default(builder.finish())?;
        info!("Logger initialized (stdout)");
        return Ok(());
    }

    // Create log directory if it doesn't exist
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    // Create log file with timestamp
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let log_file = log_dir.join(format!("sensitivity_gateway_{}.log", timestamp));

    let subscriber = builder
        .with_ansi(false)
        .with_writer(fs::File::create(&log_file)?)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    info!("Logger initialized, writing to {}", log_file.display());

    Ok(())
}
