use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result, bail};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::config::{LoggingConfig, LoggingRotation};

const LOG_FILE_PREFIX: &str = "flightsurety.log";
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Keeps the non-blocking writer alive; dropping it flushes pending lines.
pub struct LoggingGuard {
    _worker_guard: WorkerGuard,
    run_id: String,
    log_dir: PathBuf,
}

impl LoggingGuard {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

pub fn init_tracing(logging: &LoggingConfig) -> Result<LoggingGuard> {
    let env_filter = build_env_filter(&logging.filter)?;
    let log_dir = absolute_log_dir(&logging.dir)?;
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create logging directory {}", log_dir.display()))?;

    let purge_report = purge_expired_logs(&log_dir, logging.retention_days, SystemTime::now());
    let (writer, worker_guard) =
        tracing_appender::non_blocking(RollingFileAppender::new(
            rotation_of(&logging.rotation),
            &log_dir,
            LOG_FILE_PREFIX,
        ));

    let json_file = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(true)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(env_filter);
    let stderr_warnings = logging.stderr_warn_enabled.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(json_file)
        .with(stderr_warnings)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    let run_id = Uuid::now_v7().to_string();
    tracing::info!(
        target: "logging",
        run_id = %run_id,
        dir = %log_dir.display(),
        filter = %logging.filter,
        rotation = ?logging.rotation,
        retention_days = logging.retention_days,
        purged = purge_report.removed,
        "logging_initialized"
    );
    for problem in &purge_report.problems {
        tracing::warn!(target: "logging", problem = %problem, "log_retention_problem");
    }

    Ok(LoggingGuard {
        _worker_guard: worker_guard,
        run_id,
        log_dir,
    })
}

fn build_env_filter(filter: &str) -> Result<EnvFilter> {
    if filter.trim().is_empty() {
        bail!("logging.filter cannot be empty");
    }
    EnvFilter::try_new(filter).with_context(|| format!("failed to parse logging.filter '{filter}'"))
}

fn rotation_of(rotation: &LoggingRotation) -> Rotation {
    match rotation {
        LoggingRotation::Daily => Rotation::DAILY,
        LoggingRotation::Hourly => Rotation::HOURLY,
        LoggingRotation::Never => Rotation::NEVER,
    }
}

fn absolute_log_dir(dir: &Path) -> Result<PathBuf> {
    if dir.as_os_str().is_empty() {
        bail!("logging.dir cannot be empty");
    }
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .context("failed to read current working directory for logging.dir")?;
    Ok(cwd.join(dir))
}

#[derive(Debug, Default)]
struct PurgeReport {
    removed: usize,
    problems: Vec<String>,
}

/// Deletes our own rolled files whose mtime is older than the retention
/// window. Anything not carrying the log prefix is left alone.
fn purge_expired_logs(log_dir: &Path, retention_days: usize, now: SystemTime) -> PurgeReport {
    let mut report = PurgeReport::default();
    let window = Duration::from_secs((retention_days as u64).saturating_mul(SECONDS_PER_DAY));
    let cutoff = now.checked_sub(window).unwrap_or(SystemTime::UNIX_EPOCH);

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(err) => {
            report
                .problems
                .push(format!("cannot scan {}: {err}", log_dir.display()));
            return report;
        }
    };

    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(err) => {
                report.problems.push(format!("cannot read directory entry: {err}"));
                continue;
            }
        };
        let is_ours = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
        if !is_ours {
            continue;
        }

        match fs::metadata(&path).and_then(|meta| {
            let modified = meta.modified()?;
            Ok(meta.is_file() && modified <= cutoff)
        }) {
            Ok(false) => {}
            Ok(true) => match fs::remove_file(&path) {
                Ok(()) => report.removed += 1,
                Err(err) => report
                    .problems
                    .push(format!("cannot remove {}: {err}", path.display())),
            },
            Err(err) => report
                .problems
                .push(format!("cannot stat {}: {err}", path.display())),
        }
    }

    report
}
