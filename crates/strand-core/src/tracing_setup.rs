use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter directives for the stderr layer, e.g. `STRAND_LOG=strand_core=debug`
const LOG_FILTER_ENV: &str = "STRAND_LOG";
/// When set, DEBUG output is also appended to this file
const LOG_FILE_ENV: &str = "STRAND_LOG_FILE";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let Ok(log_path) = std::env::var(LOG_FILE_ENV) else {
        registry.init();
        return;
    };

    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => {
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

            registry.with(file_layer).init();
        }
        Err(e) => {
            registry.init();
            tracing::warn!("Failed to open log file {}: {}", log_path, e);
        }
    }
}
