use std::fs::{self, OpenOptions};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chatflow_core::config::{LogFormat, LoggingConfig};
use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Installs the global subscriber once. Logs go to stderr, or are appended
/// to `logging.file`, so stdout stays reserved for the conversation.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let log_level = config.level.trim().parse::<Level>().unwrap_or(Level::INFO);

    let (writer, ansi) = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("could not create log directory `{}`", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("could not open log file `{}`", path.display()))?;
            (BoxMakeWriter::new(Arc::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(ansi)
        .with_max_level(log_level)
        .with_writer(writer);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|error| anyhow!("could not install tracing subscriber: {error}"))
}
