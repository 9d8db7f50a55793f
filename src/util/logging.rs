//! Structured logging setup for osbridge
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` takes precedence over the configured level when it is set.
//!
//! # Example
//!
//! ```no_run
//! use osbridge::util::logging;
//! use tracing::info;
//!
//! logging::init_from_env();
//! info!("Application started");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Crates that are noisy at debug level
const QUIET_DEPENDENCIES: &[&str] = &["h2=warn", "hyper=warn", "hyper_util=warn", "reqwest=warn"];

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for this crate
    pub level: Level,

    /// JSON lines instead of human-readable output
    pub use_json: bool,

    /// Include the module target (e.g., osbridge::session) in logs
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,

    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with full metadata, for log collectors
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
            include_thread_ids: true,
        }
    }

    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            ..Default::default()
        }
    }
}

/// Parses a log level, falling back to INFO
///
/// ```
/// use osbridge::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("invalid"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn build_filter(level: Level) -> EnvFilter {
    if env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }

    let mut filter = EnvFilter::new(format!("osbridge={}", level));
    for directive in QUIET_DEPENDENCIES {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Installs the global subscriber; later calls are ignored
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_thread_ids(config.include_thread_ids)
                        .with_thread_names(config.include_thread_ids),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_thread_ids(config.include_thread_ids)
                        .with_thread_names(config.include_thread_ids),
                )
                .init();
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

/// Reads `OSBRIDGE_LOG_LEVEL` and `OSBRIDGE_LOG_JSON`
pub fn init_from_env() {
    let level_str = env::var("OSBRIDGE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let use_json = env::var("OSBRIDGE_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    init_logging(LoggingConfig {
        level: parse_level(&level_str),
        use_json,
        ..Default::default()
    });
}

pub fn with_level(level_str: &str) {
    init_logging(LoggingConfig::with_level(parse_level(level_str)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("Debug"), Level::DEBUG);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_presets() {
        let default = LoggingConfig::default();
        assert_eq!(default.level, Level::INFO);
        assert!(!default.use_json);

        let production = LoggingConfig::production();
        assert!(production.use_json);
        assert!(production.include_location);

        assert_eq!(LoggingConfig::development().level, Level::DEBUG);
        assert_eq!(LoggingConfig::with_level(Level::WARN).level, Level::WARN);
    }

    #[test]
    #[serial]
    fn test_filter_mentions_crate_level() {
        let previous = env::var("RUST_LOG").ok();
        env::remove_var("RUST_LOG");

        let filter = build_filter(Level::DEBUG).to_string();
        assert!(filter.contains("osbridge=debug"));
        assert!(filter.contains("reqwest=warn"));

        if let Some(value) = previous {
            env::set_var("RUST_LOG", value);
        }
    }
}
