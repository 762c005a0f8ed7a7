//! Redaction of row-level values in log output.
//!
//! NHS numbers and patient identifiers only reach the logs when row-level
//! logging has been switched on by the binary.

use std::sync::atomic::{AtomicBool, Ordering};

static LOG_DATA_ENABLED: AtomicBool = AtomicBool::new(false);

/// Placeholder logged in place of row-level values.
pub const REDACTED_VALUE: &str = "[REDACTED]";

pub fn set_log_data(enabled: bool) {
    LOG_DATA_ENABLED.store(enabled, Ordering::Release);
}

pub fn log_data_enabled() -> bool {
    LOG_DATA_ENABLED.load(Ordering::Acquire)
}

/// The value itself when row-level logging is enabled, otherwise [`REDACTED_VALUE`].
pub fn redact_value(value: &str) -> &str {
    if log_data_enabled() {
        value
    } else {
        REDACTED_VALUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_redacted_until_enabled() {
        assert_eq!(redact_value("9434765919"), REDACTED_VALUE);
        set_log_data(true);
        assert_eq!(redact_value("9434765919"), "9434765919");
        set_log_data(false);
        assert_eq!(redact_value("9434765919"), REDACTED_VALUE);
    }
}
