//! Tracing subscriber for the remote: an optional stderr sink and an
//! optional rolling file under the config directory.

use crate::domain::settings::{LogRotation, LogSettings};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps the background file writer alive. Buffered records are flushed
/// when this is dropped.
pub struct LoggingGuard {
    _file_writer: Option<WorkerGuard>,
}

pub fn init_logger(settings: &LogSettings, base_dir: &Path) -> anyhow::Result<LoggingGuard> {
    let console_layer = settings.console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(settings.source_locations)
            .with_line_number(settings.source_locations)
    });

    let mut file_writer = None;
    let file_layer = if settings.file {
        let appender = RollingFileAppender::new(
            rotation(settings.rotation),
            base_dir.join(&settings.dir),
            &settings.file_prefix,
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_writer = Some(guard);
        Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_file(settings.source_locations)
                .with_line_number(settings.source_locations),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter(&settings.filter))
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!("Logging to {}", base_dir.join(&settings.dir).display());
    Ok(LoggingGuard {
        _file_writer: file_writer,
    })
}

/// `RUST_LOG` first, then the configured directives, then plain `info`.
fn env_filter(configured: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Minutely => Rotation::MINUTELY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}
