use flexi_logger::{Logger, LoggerHandle, WriteMode};
use once_cell::sync::OnceCell;

use crate::error::{CanvasError, Result};

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    _logger: LoggerHandle,
}

/// Starts the stderr logger at `level`. Repeated calls with the same level
/// are no-ops; a different level after start is rejected.
pub fn init_logging(level: &str) -> Result<()> {
    let normalized = normalize_level(level)?;

    let state = LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState> {
        let logger = Logger::try_with_str(normalized)
            .map_err(|err| CanvasError::Logging(format!("invalid log level `{normalized}`: {err}")))?
            .log_to_stderr()
            .write_mode(WriteMode::Direct)
            .format(flexi_logger::default_format)
            .start()
            .map_err(|err| CanvasError::Logging(format!("failed to start logger: {err}")))?;

        log::debug!(
            "logging started level={} version={}",
            normalized,
            env!("CARGO_PKG_VERSION")
        );

        Ok(LoggingState {
            level: normalized,
            _logger: logger,
        })
    })?;

    if state.level != normalized {
        return Err(CanvasError::Logging(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            state.level, normalized
        )));
    }

    Ok(())
}

/// Active level, if logging was started.
pub fn logging_level() -> Option<&'static str> {
    LOGGING_STATE.get().map(|state| state.level)
}

pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) { "info" } else { "warn" }
}

fn normalize_level(level: &str) -> Result<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => Ok("off"),
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(CanvasError::invalid_argument(format!(
            "unsupported log level `{other}`; expected off|trace|debug|info|warn|error"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_normalize() {
        assert_eq!(normalize_level(" WARNING ").ok(), Some("warn"));
        assert_eq!(normalize_level("Debug").ok(), Some("debug"));
        assert!(normalize_level("verbose").is_err());
    }

    #[test]
    fn init_is_idempotent_and_rejects_switching() {
        // Only this test starts the logger in the test binary.
        init_logging("error").expect("first init");
        init_logging("error").expect("same level again");
        assert_eq!(logging_level(), Some("error"));
        assert!(init_logging("trace").is_err());
    }
}
