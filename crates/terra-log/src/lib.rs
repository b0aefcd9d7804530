//! Structured logging for Terra.
//!
//! Console output with an uptime timer and module targets, plus a JSON log
//! file in debug builds. The filter honours `RUST_LOG` first, then the
//! configured level, then a default that quiets the GPU stack.

use std::path::Path;

use terra_config::EarthConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names a level.
pub const DEFAULT_FILTER: &str = "info,wgpu=warn,naga=warn";

/// Name of the JSON log file written in debug builds.
pub const LOG_FILE_NAME: &str = "terra.log";

/// Filter directive derived from the configuration.
///
/// A bare level such as `debug` keeps the GPU crates at `warn` so that frame
/// logging stays readable; anything containing `=` is taken verbatim.
pub fn filter_directive(config: Option<&EarthConfig>) -> String {
    match config.map(|c| c.debug.log_level.trim()) {
        Some(level) if level.contains('=') => level.to_string(),
        Some(level) if !level.is_empty() => format!("{level},wgpu=warn,naga=warn"),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - enables the file layer
/// * `config` - source of the log level
///
/// Calling this twice is harmless; the second installation is ignored.
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&EarthConfig>) {
    let directive = filter_directive(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        let _ = subscriber.with(file_layer).try_init();
        return;
    }

    let _ = subscriber.try_init();
}
