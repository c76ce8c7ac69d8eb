use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber: stderr plus an append-only log file.
///
/// `RUST_LOG` wins over the default directive. If the log file cannot be
/// opened, logging continues on stderr only.
pub fn init(log_file: &Path, verbose: bool) {
    let default = if verbose {
        "slotclaim=debug"
    } else {
        "slotclaim=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let (file_layer, file_error) = match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(f) => (
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(f))),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        tracing::warn!(path = %log_file.display(), "cannot open log file ({e}), logging to stderr only");
    }
}
