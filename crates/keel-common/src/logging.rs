//! ---
//! keel_section: "01-core-functionality"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Shared primitives and utilities for the service API."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! Tracing setup shared by every Keel service.
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "KEEL_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

/// Writer guards; dropping them would lose buffered lines.
struct LogGuards {
    _file: WorkerGuard,
    _stdout: WorkerGuard,
}

static GUARDS: OnceCell<LogGuards> = OnceCell::new();

/// Stdout rendering for service logs. The rolling file is always JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
    Compact,
}

/// File name prefix for a service's rolling log.
///
/// An explicit `file_prefix` wins. Otherwise the service name is used with
/// path separators flattened, so `/orders/v2` logs to `orders-v2.log.*`.
pub fn log_file_prefix(service_name: &str, config: &LoggingConfig) -> String {
    if let Some(prefix) = &config.file_prefix {
        return prefix.clone();
    }
    let flattened = service_name.trim_matches('/').replace('/', "-");
    if flattened.is_empty() {
        "keel".to_owned()
    } else {
        flattened
    }
}

/// `KEEL_LOG`, then `RUST_LOG`, then `info`.
fn env_filter() -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("ignoring invalid {LOG_ENV} directive `{directive}`: {err}");
            EnvFilter::new(DEFAULT_DIRECTIVE)
        }),
        Err(_) => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

fn stdout_layer<S>(format: LogFormat, writer: NonBlocking) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(writer);
    match format {
        LogFormat::StructuredJson => layer.with_target(false).json().boxed(),
        LogFormat::Pretty => layer.with_target(true).pretty().boxed(),
        LogFormat::Compact => layer.with_target(true).compact().boxed(),
    }
}

/// Install the global subscriber for `service_name`.
///
/// Creates the log directory, then layers the env filter, the stdout output
/// in the configured format, and a daily rolling JSON file. A subscriber that
/// is already installed is left in place.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!(
            "unable to create log directory {}",
            config.directory.display()
        )
    })?;
    let prefix = log_file_prefix(service_name, config);

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(daily(&config.directory, format!("{prefix}.log")));
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    if GUARDS
        .set(LogGuards {
            _file: file_guard,
            _stdout: stdout_guard,
        })
        .is_err()
    {
        debug!(service = %service_name, "log writers already installed; keeping the first set");
    }

    let file_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer);

    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(stdout_layer(config.format, stdout_writer))
        .with(file_layer)
        .try_init()
        .is_ok();

    info!(
        service = %service_name,
        log_dir = %config.directory.display(),
        log_file = %prefix,
        format = ?config.format,
        installed,
        "tracing initialised"
    );
    Ok(())
}
