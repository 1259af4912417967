// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Layered `tracing` subscriber setup: console, rolling file, and an
//! optional OTLP tracing export.

use std::error::Error;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LogConfig, LogFormat, TelemetryConfig};
use crate::telemetry;

type DynLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn more_verbose_level(a: Level, b: Level) -> Level {
    if a >= b {
        a
    } else {
        b
    }
}

fn env_filter_or_level(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

fn make_console_layer(level: Level) -> DynLayer {
    tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(env_filter_or_level(level))
        .boxed()
}

fn make_file_layer(config: &LogConfig) -> Result<(DynLayer, WorkerGuard), Box<dyn Error>> {
    let path = std::path::Path::new(&config.file_path);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
    let filename =
        path.file_name().and_then(|name| name.to_str()).unwrap_or("jamie.log");

    let file_appender = tracing_appender::rolling::never(dir, filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let level: Level = config.file_level.clone().into();
    let filter = env_filter_or_level(level);

    let layer = match config.file_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_filter(filter)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_filter(filter)
            .boxed(),
    };

    Ok((layer, guard))
}

fn telemetry_default_level_for_config(telemetry_config: &TelemetryConfig) -> Level {
    if telemetry_config.tokio_console {
        Level::TRACE
    } else {
        Level::INFO
    }
}

fn should_enable_otel_tracing(telemetry_config: &TelemetryConfig) -> bool {
    telemetry_config.enable
        && telemetry_config.tracing_enable
        && telemetry_config.otlp_traces_endpoint.is_some()
}

/// Initializes the global `tracing` subscriber from `log_config` and
/// `telemetry_config`. Returns a `WorkerGuard` that must be held for the
/// lifetime of the process when file logging is enabled (dropping it
/// flushes and stops the background writer thread).
///
/// # Errors
/// Returns an error if the OTLP tracing layer fails to initialize.
pub fn init_logging(
    log_config: &LogConfig,
    telemetry_config: &TelemetryConfig,
) -> Result<Option<WorkerGuard>, Box<dyn Error>> {
    let mut layers: Vec<DynLayer> = Vec::new();
    let mut guard = None;

    if telemetry_config.tokio_console {
        tracing::warn!("tokio_console is enabled in config but this binary has no tokio-console layer wired up");
    }

    if log_config.file_enable {
        let (layer, file_guard) = make_file_layer(log_config)?;
        layers.push(layer);
        guard = Some(file_guard);
    }

    if log_config.console_enable {
        let level: Level = log_config.console_level.clone().into();
        layers.push(make_console_layer(level));
    } else if !log_config.file_enable {
        tracing::warn!("both console and file logging are disabled; falling back to console at INFO");
        layers.push(make_console_layer(more_verbose_level(
            Level::INFO,
            telemetry_default_level_for_config(telemetry_config),
        )));
    }

    if should_enable_otel_tracing(telemetry_config) {
        let otel_layer = telemetry::init_tracing_with_otlp(telemetry_config)?;
        layers.push(otel_layer.boxed());
    }

    tracing_subscriber::registry().with(layers).init();

    Ok(guard)
}
