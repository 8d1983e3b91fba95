//! Logging facade, grounded on the teacher's `flux::logging` module (which
//! wraps `slog`/`sloggers`/`serdeconv`). Re-exports the `slog` macros so
//! call sites elsewhere in the workspace only ever depend on this crate.
//!
//! spec §9's "Global log level" design note describes the C source keeping
//! a single process-wide atomic integer, store/load only, no further
//! plumbing required. `init()` reads it once at startup to pick the
//! `sloggers` terminal level; changing it afterwards does not retroactively
//! reconfigure an already-built logger, matching the note's "teardown is
//! not required" framing.

use serdeconv;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use slog::{debug, error, info, o, trace, warn, Logger};

static LOG_LEVEL: AtomicUsize = AtomicUsize::new(Level::Info as usize);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(usize)]
pub enum Level {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        }
    }
}

/// Set the process-wide log level consulted by the next `init()` call.
pub fn set_level(level: Level) {
    LOG_LEVEL.store(level as usize, Ordering::Relaxed);
}

pub fn current_level() -> Level {
    match LOG_LEVEL.load(Ordering::Relaxed) {
        0 => Level::Error,
        1 => Level::Warning,
        2 => Level::Info,
        3 => Level::Debug,
        _ => Level::Trace,
    }
}

/// Discard-everything logger, used as a placeholder before `init()` is
/// called or in tests that don't care about log output.
pub fn discard() -> Logger {
    Logger::root(slog::Discard, o!())
}

/// Build the process-wide root logger from a terminal-destination
/// `sloggers` config, matching the teacher's hardcoded TOML snippet but
/// driven by `current_level()` instead of a fixed string.
pub fn init() -> Logger {
    use sloggers::{Config, LoggerConfig};

    let toml = format!(
        r#"
type = "terminal"
level = "{}"
destination = "stderr"
"#,
        current_level().as_str()
    );

    let config: LoggerConfig = serdeconv::from_toml_str(&toml).expect("built-in logging config must parse");

    config.build_logger().expect("failed to build logger drain")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_roundtrips() {
        set_level(Level::Debug);
        assert_eq!(current_level(), Level::Debug);
        set_level(Level::Info);
        assert_eq!(current_level(), Level::Info);
    }
}
