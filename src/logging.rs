/*!
 * Logging and tracing initialization
 */

use std::fs::File;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::MonitorConfig;
use crate::error::{PermSyncError, Result};

/// Crate targets that emit engine events
const LOG_TARGETS: [&str; 4] = [
    "permsync",
    "permsync_core_identity",
    "permsync_core_classifier",
    "permsync_core_vpn",
];

type FilteredRegistry = Layered<EnvFilter, Registry>;

/// Resolve the effective level, `verbose` wins over `log_level`
pub fn effective_level(config: &MonitorConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

/// Default directives: every engine crate at the effective level
pub fn default_directives(config: &MonitorConfig) -> String {
    let level = effective_level(config);
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber described by `config`
///
/// `RUST_LOG` overrides the configured level. Fails if a global subscriber
/// is already installed.
pub fn init_logging(config: &MonitorConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(config)))
        .map_err(|e| PermSyncError::Config(format!("Failed to create log filter: {}", e)))?;

    match &config.log_file {
        Some(log_path) => install(env_filter, file_layer(log_path)?),
        None => install(env_filter, stdout_layer()),
    }
}

fn stdout_layer() -> impl Layer<FilteredRegistry> + Send + Sync + 'static {
    fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::NONE)
        .compact()
}

/// One JSON object per event, written straight to `log_path`
fn file_layer(log_path: &Path) -> Result<impl Layer<FilteredRegistry> + Send + Sync + 'static> {
    let file = File::create(log_path).map_err(|e| {
        PermSyncError::Config(format!(
            "Failed to create log file {}: {}",
            log_path.display(),
            e
        ))
    })?;

    Ok(fmt::layer()
        .with_writer(file)
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .json())
}

fn install<L>(env_filter: EnvFilter, layer: L) -> Result<()>
where
    L: Layer<FilteredRegistry> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init()
        .map_err(|e| PermSyncError::Config(format!("Logging already initialized: {}", e)))
}

/// Install a test-writer subscriber, at most once per process
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let verbose = MonitorConfig {
            verbose: true,
            ..Default::default()
        };
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives(&verbose)));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok(); // Ignore error if already initialized
    });
}
