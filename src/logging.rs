//! Logging initialization for hrdesk.
//!
//! Form sessions (TUI) log to `<state>/logs/hrdesk-{datetime}.log` so output
//! never tears the screen; plain commands log to stderr.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Keeps the file writer alive; dropping it flushes buffered lines
pub struct LoggingHandle {
    pub _guard: Option<WorkerGuard>,
    /// Set only when logging to a file
    pub log_file_path: Option<PathBuf>,
}

/// `hrdesk-20240131T093000Z.log`
pub fn log_file_name(now: DateTime<Utc>) -> String {
    format!("hrdesk-{}.log", now.format("%Y%m%dT%H%M%SZ"))
}

/// `RUST_LOG` wins over `--debug`, which wins over the configured level
fn filter_directive(config: &Config, debug_override: bool, rust_log: Option<String>) -> String {
    rust_log.unwrap_or_else(|| {
        if debug_override {
            "debug".to_string()
        } else {
            config.logging.level.clone()
        }
    })
}

pub fn init_logging(config: &Config, is_tui_mode: bool, debug_override: bool) -> Result<LoggingHandle> {
    let directive = filter_directive(config, debug_override, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    if is_tui_mode && config.logging.to_file {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir)?;

        let log_filename = log_file_name(Utc::now());
        let log_file_path = logs_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&logs_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_name_format() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 9, 30, 0).unwrap();
        assert_eq!(log_file_name(now), "hrdesk-20240131T093000Z.log");
    }

    #[test]
    fn test_logs_live_under_state_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.state = temp_dir.path().to_string_lossy().to_string();

        let logs_dir = config.logs_path();
        assert!(logs_dir.ends_with("logs"));
        assert!(logs_dir.starts_with(temp_dir.path()));
    }

    #[test]
    fn test_filter_precedence() {
        let mut config = Config::default();
        config.logging.level = "warn".to_string();

        assert_eq!(filter_directive(&config, false, None), "warn");
        assert_eq!(filter_directive(&config, true, None), "debug");
        assert_eq!(
            filter_directive(&config, true, Some("hrdesk=trace".to_string())),
            "hrdesk=trace"
        );
    }
}
