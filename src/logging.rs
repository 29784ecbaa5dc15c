use std::path::PathBuf;

use tokio::sync::RwLock;
use tracing::{debug, info, metadata::LevelFilter, trace, Level};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Name of the log file, before the date suffix.
pub const LOG_FILE_NAME: &str = "uart-alu.log";

/// The directives in `var` if it is set and valid, otherwise warnings only.
fn env_filter(var: &str) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn do_init(file_level: Option<(Level, PathBuf)>) {
    let mut message = String::from("Logging with: stderr");

    // The menu owns stdout, and anything chattier than warnings would scribble over it.
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter(EnvFilter::DEFAULT_ENV));

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let maybe_file_layer = if let Some((level, output_dir)) = file_level {
        message += &format!(", file (in dir {output_dir:?})");

        let file_appender = RollingFileAppender::new(Rotation::DAILY, output_dir, LOG_FILE_NAME);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_filter(LevelFilter::from(level));
        Some(file_layer)
    } else {
        None
    };

    registry.with(maybe_file_layer).init();

    debug!(message);
}

/// Initialize tracing.
///
/// Will only initialize once, so tests may call this.
pub async fn init(file_logging: Option<(Level, PathBuf)>) {
    static TRACING_IS_INITIALIZED: RwLock<bool> = RwLock::const_new(false);

    let initialized = { *TRACING_IS_INITIALIZED.read().await };

    if !initialized {
        let mut initialized = TRACING_IS_INITIALIZED.write().await;

        if *initialized {
            return;
        }

        do_init(file_logging);

        *initialized = true;
    }

    info!("Logging initialized");
}

/// Last words before exiting.
pub fn shutdown() {
    trace!("Shutting down");
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn unset_filter_is_warn() {
        std::env::remove_var("UART_ALU_TEST_LOG_UNSET");

        assert_eq!(env_filter("UART_ALU_TEST_LOG_UNSET").to_string(), "warn");
    }

    #[test]
    fn valid_filter_is_used() {
        std::env::set_var("UART_ALU_TEST_LOG_VALID", "debug");

        assert_eq!(env_filter("UART_ALU_TEST_LOG_VALID").to_string(), "debug");
    }

    #[test]
    fn invalid_filter_falls_back_to_warn() {
        std::env::set_var("UART_ALU_TEST_LOG_INVALID", "uart_alu=[{");

        assert_eq!(env_filter("UART_ALU_TEST_LOG_INVALID").to_string(), "warn");
    }
}
