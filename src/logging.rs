use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where log lines go. The TUI owns the terminal, so it logs to a file.
pub enum LogTarget<'a> {
    Stderr,
    File(&'a Path),
}

/// Initialize structured logging.
///
/// `RUST_LOG` wins when set (e.g. `RUST_LOG=netspeed=debug`); otherwise
/// `level` is used. `json` switches the formatter to one JSON object per line.
pub fn init_logging(level: &str, json: bool, target: LogTarget<'_>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match target {
        LogTarget::Stderr => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_names(true);
            if json {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer.json())
                    .init();
            } else {
                tracing_subscriber::registry().with(filter).with(layer).init();
            }
        }
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false)
                .with_thread_names(true);
            if json {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(layer.json())
                    .init();
            } else {
                tracing_subscriber::registry().with(filter).with(layer).init();
            }
        }
    }
    Ok(())
}
