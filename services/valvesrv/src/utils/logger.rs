//! Tracing initialization with file and console output.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

use crate::error::Result;

/// Initialize the global subscriber.
///
/// Console mode writes to stdout; file mode writes daily-rotated files under
/// `log_dir`. `RUST_LOG` takes precedence over the configured level. A second
/// initialization (tests, embedding) is a silent no-op.
pub fn init_logger(
    log_dir: impl AsRef<Path>,
    service_name: &str,
    level: &str,
    console: bool,
) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{service_name}={level}")));

    if console {
        fmt().with_env_filter(env_filter).try_init().ok();
    } else {
        std::fs::create_dir_all(&log_dir)?;
        let file_appender = RollingFileAppender::new(
            Rotation::DAILY,
            log_dir,
            format!("{service_name}.log"),
        );
        fmt()
            .with_env_filter(env_filter)
            .with_writer(file_appender)
            .with_ansi(false)
            .try_init()
            .ok();
    }

    tracing::info!("Logger initialized for service: {service_name}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_reentrant() {
        let dir = tempfile::tempdir().unwrap();
        assert!(init_logger(dir.path(), "valvesrv", "debug", true).is_ok());
        // Second call must not panic
        assert!(init_logger(dir.path(), "valvesrv", "info", false).is_ok());
    }
}
