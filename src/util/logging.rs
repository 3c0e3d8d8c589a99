//! Tracing subscriber setup
//!
//! Logs always go to stderr so that command output on stdout stays clean JSON
//! or text. `RUST_LOG` is honored on top of the configured level.
//!
//! ```no_run
//! use cyclops::util::logging;
//!
//! logging::init_from_env();
//! tracing::info!(lesson_id = "abc", "Extraction started");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{filter::Directive, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Noisy HTTP crates quieted when `RUST_LOG` is unset
const QUIET_TARGETS: &[&str] = &["h2=warn", "hyper=warn", "hyper_util=warn", "reqwest=warn"];

/// Options for [`init_logging`]
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for the `cyclops` target
    pub level: Level,

    /// Emit one JSON object per event
    pub use_json: bool,

    pub include_target: bool,

    /// Include file and line number
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
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

    /// JSON output with source locations, for log shippers
    pub fn structured(level: Level) -> Self {
        Self {
            level,
            use_json: true,
            include_target: true,
            include_location: true,
        }
    }
}

/// Parses a level name, case-insensitive; unknown names fall back to INFO
///
/// ```
/// use cyclops::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("Debug"), Level::DEBUG);
/// assert_eq!(parse_level("loud"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
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
    let mut filter = EnvFilter::from_default_env();

    if let Ok(directive) = format!("cyclops={}", level).parse::<Directive>() {
        filter = filter.add_directive(directive);
    }

    if env::var("RUST_LOG").is_err() {
        for target in QUIET_TARGETS {
            if let Ok(directive) = target.parse::<Directive>() {
                filter = filter.add_directive(directive);
            }
        }
    }

    filter
}

/// Installs the global subscriber; later calls are no-ops
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
                        .with_line_number(config.include_location),
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
                        .with_line_number(config.include_location),
                )
                .init();
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

/// Reads `CYCLOPS_LOG_LEVEL` and `CYCLOPS_LOG_JSON`
pub fn init_from_env() {
    let level = env::var("CYCLOPS_LOG_LEVEL")
        .map(|v| parse_level(&v))
        .unwrap_or(Level::INFO);

    let use_json = env::var("CYCLOPS_LOG_JSON")
        .ok()
        .and_then(|v| v.to_lowercase().parse::<bool>().ok())
        .unwrap_or(false);

    let config = if use_json {
        LoggingConfig::structured(level)
    } else {
        LoggingConfig::with_level(level)
    };

    init_logging(config);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level(" info "), Level::INFO);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
    }

    #[test]
    fn test_parse_level_invalid() {
        assert_eq!(parse_level("invalid"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.use_json);
        assert!(config.include_target);
        assert!(!config.include_location);
    }

    #[test]
    fn test_structured_config() {
        let config = LoggingConfig::structured(Level::WARN);
        assert_eq!(config.level, Level::WARN);
        assert!(config.use_json);
        assert!(config.include_location);
    }

    #[test]
    fn test_quiet_targets_parse() {
        for target in QUIET_TARGETS {
            assert!(target.parse::<Directive>().is_ok(), "{}", target);
        }
    }
}
