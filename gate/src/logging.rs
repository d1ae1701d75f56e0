use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::{filter_fn, Targets},
    fmt::{self, time::OffsetTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use authz::AUDIT_TARGET;

/// Keeps the background log writers alive; flushes them when dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

/// Initialize logging to the console and, with a directory, to daily files.
///
/// With `log_dir` set, two files roll daily: `mailgate.<date>.log` with all
/// events except the audit trail, and `mailgate-audit.<date>.log` with only
/// proxy decisions. `RUST_LOG` overrides `default_filter`.
pub fn init_logging(
    log_dir: Option<&Path>,
    default_filter: &str,
) -> Result<LoggingGuard, Box<dyn std::error::Error>> {
    let timer = OffsetTime::local_rfc_3339().unwrap_or_else(|_| {
        // Local offset is unavailable in some multi-threaded environments
        OffsetTime::new(
            time::UtcOffset::UTC,
            time::format_description::well_known::Rfc3339,
        )
    });

    let mut guards = Vec::new();
    let mut file_layers = None;
    if let Some(dir) = log_dir {
        std::fs::create_dir_all(dir)?;

        let (main_writer, main_guard) = tracing_appender::non_blocking(rolling(dir, "mailgate")?);
        let (audit_writer, audit_guard) =
            tracing_appender::non_blocking(rolling(dir, "mailgate-audit")?);
        guards.push(main_guard);
        guards.push(audit_guard);

        let main = fmt::layer()
            .with_writer(main_writer)
            .with_timer(timer.clone())
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(filter_fn(|meta| meta.target() != AUDIT_TARGET));
        let audit = fmt::layer()
            .with_writer(audit_writer)
            .with_timer(timer.clone())
            .with_ansi(false)
            .with_target(false)
            .with_filter(Targets::new().with_target(AUDIT_TARGET, tracing::Level::INFO));
        file_layers = Some(main.and_then(audit));
    }

    tracing_subscriber::registry()
        .with(file_layers)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(timer)
                .with_target(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .try_init()?;

    if let Some(dir) = log_dir {
        tracing::info!("Log files are being written to: {:?}", dir);
    }

    Ok(LoggingGuard { _guards: guards })
}

fn rolling(dir: &Path, prefix: &str) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    Ok(RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(dir)?)
}
