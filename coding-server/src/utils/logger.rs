//! Logging Infrastructure
//!
//! Structured logging setup for development and production:
//! - Console output (pretty or JSON)
//! - Daily rotating application logs (deleted after 14 days)
//! - Permanent batch logs (target `batch`, never deleted)

use std::fs;
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Application logs older than this are deleted
pub const LOG_RETENTION_DAYS: i64 = 14;

/// Target of the permanent batch log
pub const BATCH_LOG_TARGET: &str = "batch";

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Clean up application log files older than `retention_days`
///
/// Files are named `app.YYYY-MM-DD.log`; anything else is left alone.
/// Returns the number of deleted files.
pub fn cleanup_old_logs(log_dir: &Path, retention_days: i64) -> anyhow::Result<usize> {
    let cutoff = chrono::Local::now().date_naive() - chrono::Duration::days(retention_days);

    let app_log_dir = log_dir.join("app");
    if !app_log_dir.exists() {
        return Ok(0);
    }

    let mut deleted = 0;
    for entry in fs::read_dir(app_log_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(date_part) = name
            .strip_prefix("app.")
            .and_then(|d| d.strip_suffix(".log"))
        else {
            continue;
        };
        if let Ok(date) = chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            && date < cutoff
        {
            fs::remove_file(&path)?;
            deleted += 1;
            tracing::info!(file = %name, "Deleted old log file");
        }
    }

    Ok(deleted)
}

fn daily_appender(dir: &Path, prefix: &str) -> anyhow::Result<RollingFileAppender> {
    Ok(RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(dir)?)
}

fn console_layer<S>(level: &str, json_format: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(EnvFilter::new(level))
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .with_filter(EnvFilter::new(level))
            .boxed()
    }
}

/// One file layer: `keep` decides which targets end up in this file
fn file_layer<S>(
    appender: RollingFileAppender,
    json_format: bool,
    keep: fn(&str) -> bool,
) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let filter = tracing_subscriber::filter::filter_fn(move |meta| keep(meta.target()));
    let writer = std::sync::Mutex::new(appender);
    if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_writer(writer)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(filter)
            .boxed()
    }
}

/// Initialize the logging system with daily rotating logs
///
/// # Arguments
/// * `level` - Log level (e.g., "info", "debug", "warn"); `RUST_LOG` wins when set
/// * `json_format` - Whether to use JSON format (true for production)
/// * `log_dir` - Optional directory for file logging (e.g., Some("./logs"))
///
/// Must be called from inside a tokio runtime when `log_dir` is set
/// (the cleanup task is spawned on it).
pub fn init_logger_with_file(
    level: &str,
    json_format: bool,
    log_dir: Option<&str>,
) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers = vec![console_layer(level, json_format)];

    if let Some(dir) = log_dir {
        let log_dir = Path::new(dir);
        let app_log_dir = log_dir.join("app");
        let batch_log_dir = log_dir.join("batch");
        fs::create_dir_all(&app_log_dir)?;
        fs::create_dir_all(&batch_log_dir)?;

        // Application logs (rotated daily, subject to cleanup)
        layers.push(file_layer(
            daily_appender(&app_log_dir, "app")?,
            json_format,
            |target| target != BATCH_LOG_TARGET,
        ));
        // Batch start/stop records (permanent)
        layers.push(file_layer(
            daily_appender(&batch_log_dir, "batch")?,
            json_format,
            |target| target == BATCH_LOG_TARGET,
        ));

        tokio::spawn(periodic_cleanup(log_dir.to_path_buf()));
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    Ok(())
}

/// Initialize the logging system (console only)
pub fn init_logger(level: &str, json_format: bool) -> anyhow::Result<()> {
    init_logger_with_file(level, json_format, None)
}

/// Periodic cleanup task - runs every hour to clean old logs
async fn periodic_cleanup(log_dir: PathBuf) {
    use tokio::time::{Duration, sleep};

    loop {
        sleep(Duration::from_secs(3600)).await;

        if let Err(e) = cleanup_old_logs(&log_dir, LOG_RETENTION_DAYS) {
            tracing::error!(error = %e, "Failed to cleanup old logs");
        }
    }
}

/// Batch log helper - records batch lifecycle events permanently
///
/// # Examples
/// ```ignore
/// batch_log!(user_id, "batch.start", batch_id);
/// batch_log!(user_id, "batch.stop", batch_id, printed);
/// ```
#[macro_export]
macro_rules! batch_log {
    ($user_id:expr, $action:expr, $batch_id:expr) => {
        tracing::info!(
            target: "batch",
            user_id = $user_id,
            action = $action,
            batch_id = $batch_id,
            timestamp = chrono::Local::now().to_rfc3339(),
            "BATCH"
        );
    };
    ($user_id:expr, $action:expr, $batch_id:expr, $printed:expr) => {
        tracing::info!(
            target: "batch",
            user_id = $user_id,
            action = $action,
            batch_id = $batch_id,
            printed = $printed,
            timestamp = chrono::Local::now().to_rfc3339(),
            "BATCH"
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_old_logs() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        fs::create_dir_all(&app).unwrap();

        let today = chrono::Local::now().date_naive();
        let old = today - chrono::Duration::days(30);
        let recent = today - chrono::Duration::days(2);
        for name in [
            format!("app.{}.log", old.format("%Y-%m-%d")),
            format!("app.{}.log", recent.format("%Y-%m-%d")),
            "notes.txt".to_string(),
        ] {
            fs::write(app.join(name), b"x").unwrap();
        }

        let deleted = cleanup_old_logs(dir.path(), LOG_RETENTION_DAYS).unwrap();
        assert_eq!(deleted, 1);

        let remaining: Vec<_> = fs::read_dir(&app)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(!remaining.contains(&format!("app.{}.log", old.format("%Y-%m-%d"))));
    }

    #[test]
    fn test_cleanup_without_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(dir.path(), LOG_RETENTION_DAYS).unwrap(), 0);
    }
}
