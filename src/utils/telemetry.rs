use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{LoggingConfig, MetricsConfig};
use crate::utils::error::AppError;

/// `RUST_LOG` wins over the configured level.
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, AppError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            AppError::Telemetry(format!("invalid log filter '{}': {}", config.level, e))
        }),
    }
}

/// Install the global subscriber: stderr always, plus a daily rolling file
/// when a directory is configured. Keep the guard alive until exit or
/// buffered file output is lost.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, AppError> {
    let filter = build_filter(config)?;

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Telemetry(e.to_string()))?;

    Ok(guard)
}

/// Start the Prometheus scrape endpoint. Must run inside the tokio runtime.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), AppError> {
    if !config.enabled {
        return Ok(());
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| AppError::Telemetry(format!("failed to start metrics exporter: {}", e)))?;

    metrics::describe_counter!("stock_watcher_checks_total", "Completed poll cycles by outcome");
    metrics::describe_gauge!(
        "stock_watcher_in_stock",
        "1 when the last check saw the item in stock"
    );

    tracing::info!("Prometheus metrics listening on {}", addr);
    Ok(())
}
