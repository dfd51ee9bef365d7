//! Structured logging setup using tracing, with optional rotating JSON log files.

use crate::config::{FileLoggingConfig, LogFormat, LogRotation, LoggingConfig};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the file writer alive. Dropping it flushes pending log lines.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_logging(config: &LoggingConfig) -> io::Result<LogGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<BoxedLayer> = vec![match config.format {
        LogFormat::Text => fmt::layer().with_writer(io::stdout).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(io::stdout).boxed(),
    }];

    let file_guard = match &config.file {
        Some(file_config) => {
            let (writer, guard) = create_file_writer(file_config)?;
            layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

fn create_file_writer(
    config: &FileLoggingConfig,
) -> io::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    fs::create_dir_all(&config.log_dir)?;

    let rotation = match config.rotation {
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Never => Rotation::NEVER,
    };
    let appender = RollingFileAppender::new(rotation, &config.log_dir, &config.file_prefix);

    Ok(tracing_appender::non_blocking(appender))
}

/// Spawn a background task compressing rotated logs and deleting expired ones.
pub fn spawn_log_maintenance(config: &LoggingConfig) {
    let Some(file_config) = config.file.clone() else {
        return;
    };
    if !file_config.compress && file_config.max_age_days == 0 {
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        // First tick fires immediately; give the appender time to open today's file
        tokio::time::sleep(Duration::from_secs(60)).await;
        loop {
            interval.tick().await;
            maintain_log_dir(&file_config, &active_log_name(&file_config));
        }
    });
}

/// Name of the file the appender is currently writing
fn active_log_name(config: &FileLoggingConfig) -> String {
    let suffix = match config.rotation {
        LogRotation::Daily => chrono::Utc::now().format(".%Y-%m-%d").to_string(),
        LogRotation::Hourly => chrono::Utc::now().format(".%Y-%m-%d-%H").to_string(),
        LogRotation::Never => String::new(),
    };
    format!("{}{}", config.file_prefix, suffix)
}

/// Compress and expire rotated files. `active` is never touched.
fn maintain_log_dir(config: &FileLoggingConfig, active: &str) {
    let entries = match fs::read_dir(&config.log_dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(dir = %config.log_dir, error = %e, "Failed to read log directory");
            return;
        }
    };

    let max_age = Duration::from_secs(config.max_age_days.saturating_mul(24 * 60 * 60));

    for path in entries.flatten().map(|e| e.path()) {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_file() || !filename.starts_with(&config.file_prefix) || filename == active {
            continue;
        }

        if config.max_age_days > 0 && file_age(&path).is_some_and(|age| age > max_age) {
            match fs::remove_file(&path) {
                Ok(()) => tracing::info!(path = %path.display(), "Deleted expired log file"),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to delete log file")
                }
            }
            continue;
        }

        if config.compress && !filename.ends_with(".gz") {
            match compress_file(&path) {
                Ok(gz) => tracing::info!(path = %gz.display(), "Compressed rotated log file"),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to compress log file")
                }
            }
        }
    }
}

fn file_age(path: &Path) -> Option<Duration> {
    let modified = path.metadata().ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

/// Gzip `path` to `path.gz` and remove the original
fn compress_file(path: &Path) -> io::Result<PathBuf> {
    let mut gz_path = path.as_os_str().to_owned();
    gz_path.push(".gz");
    let gz_path = PathBuf::from(gz_path);

    let mut reader = BufReader::new(File::open(path)?);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(&gz_path)?), Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?;

    fs::remove_file(path)?;
    Ok(gz_path)
}
