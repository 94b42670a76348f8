//! Logging and tracing initialization.

use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize the tracing subscriber with the given configuration.
///
/// `RUST_LOG` takes precedence over `config.level` when set.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file = config.file.as_ref().and_then(|path| {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(BoxMakeWriter::new(Mutex::new(file))),
            Err(e) => {
                eprintln!("montage: cannot open log file {}: {e}", path.display());
                None
            }
        }
    });

    let subscriber = build_subscriber(config.json, env_filter, file);
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Initialize logging with defaults (useful for tests and quick scripts).
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}

/// Writes to `file` when given, stdout otherwise. The format choice applies to both.
fn build_subscriber(
    json: bool,
    env_filter: EnvFilter,
    file: Option<BoxMakeWriter>,
) -> Box<dyn Subscriber + Send + Sync> {
    let to_file = file.is_some();
    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_ansi(!to_file)
        .with_writer(file.unwrap_or_else(|| BoxMakeWriter::new(std::io::stdout)));

    if json {
        Box::new(builder.json().finish())
    } else {
        Box::new(
            builder
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish(),
        )
    }
}
