//! Logging for the DeskFS crates
//!
//! Thin layer over `emit`, configured once at startup from the environment.
//!
//! Usage:
//! - Set DESKFS_LOG=off (default) - no logs
//! - Set DESKFS_LOG=info - basic operation logs
//! - Set DESKFS_LOG=debug - detailed diagnostic logs
//!
//! `warn` and `error` are accepted as well. Events go to stderr through
//! `emit_term`, with named properties:
//!
//! ```ignore
//! use diagnostics::*;
//! debug!("read {path}", path: "/user/a.txt");
//! ```

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

pub const LOG_ENV: &str = "DESKFS_LOG";

static INIT: Once = Once::new();

/// Minimum level for a `DESKFS_LOG` value. `None` turns logging off;
/// unknown values fall back to info.
#[must_use]
pub fn parse_level(value: &str) -> Option<emit::Level> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "off" => None,
        "debug" => Some(emit::Level::Debug),
        "warn" => Some(emit::Level::Warn),
        "error" => Some(emit::Level::Error),
        _ => Some(emit::Level::Info),
    }
}

/// Initialize diagnostics based on the DESKFS_LOG environment variable
///
/// This should be called once at application startup. It's safe to call
/// multiple times - subsequent calls will be ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let value = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());
        let Some(level) = parse_level(&value) else {
            return;
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        if !matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "debug" | "info" | "warn" | "error"
        ) {
            emit::warn!("unknown {var} value {value}, using info", var: LOG_ENV, value: value.as_str());
        }

        // The runtime lives for the rest of the process
        std::mem::forget(rt);
    });
}

/// Log basic operations (mounts, migrations, recovered moves)
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (individual reads, writes, cache activity)
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log warning conditions (fail-closed reads, ignored legacy data, deferred moves)
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that stop an operation
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_safe_to_call_multiple_times() {
        init_diagnostics();
        init_diagnostics();
        init_diagnostics();
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("off"), None);
        assert_eq!(parse_level(""), None);
        assert_eq!(parse_level("debug"), Some(emit::Level::Debug));
        assert_eq!(parse_level(" WARN "), Some(emit::Level::Warn));
        assert_eq!(parse_level("loud"), Some(emit::Level::Info));
    }

    #[test]
    fn test_macros_compile() {
        info!("Test message");
        debug!("Debug message with {value}", value: 42);
        warn!("Warning message");
        error!("Error message");
    }

    #[test]
    fn test_failure_reasons_are_plain_properties() {
        // `err` is reserved by emit for `std::error::Error` values
        let failure = std::io::Error::other("disk full");
        warn!("load of {path} failed: {reason}", path: "/user", reason: failure.to_string());
    }
}
