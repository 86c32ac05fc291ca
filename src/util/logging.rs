//! Structured logging setup for funcbox
//!
//! Logging uses the `tracing` ecosystem and always writes to stderr so that
//! command output on stdout stays machine readable.
//!
//! # Example
//!
//! ```no_run
//! use funcbox::util::logging;
//!
//! // Level and format from FUNC_LOG_LEVEL / FUNC_LOG_JSON
//! logging::init_from_env();
//!
//! tracing::info!(root = "/tmp/hello", "function created");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Ensures logging is only initialized once
static INIT: Once = Once::new();

/// Noisy dependencies held at warn unless RUST_LOG says otherwise
const QUIET_CRATES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest"];

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for funcbox's own events
    pub level: Level,

    /// Emit one JSON object per event instead of human-readable lines
    pub use_json: bool,

    /// Include the module target (e.g., funcbox::client) in logs
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,

    /// Include thread ID and name in logs
    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: false,
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

    /// Debug level console output with module targets
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
        }
    }

    /// Level from the CLI's `-v`/`-q` flags; an explicit level wins
    pub fn from_flags(level: Option<&str>, verbose: bool, quiet: bool) -> Self {
        let level = match (level, verbose, quiet) {
            (Some(l), _, _) => parse_level(l),
            (None, true, _) => Level::DEBUG,
            (None, false, true) => Level::ERROR,
            (None, false, false) => Level::INFO,
        };
        Self {
            include_target: verbose,
            ..Self::with_level(level)
        }
    }
}

/// Parses a log level, case-insensitively; unknown values fall back to INFO
///
/// ```
/// use funcbox::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("Debug"), Level::DEBUG);
/// assert_eq!(parse_level("bogus"), Level::INFO);
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
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("funcbox={}", level).parse() {
        filter = filter.add_directive(directive);
    }
    if env::var("RUST_LOG").is_err() {
        for krate in QUIET_CRATES {
            if let Ok(directive) = format!("{}=warn", krate).parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

/// Installs the global subscriber. Only the first call has any effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_thread_names(config.include_thread_ids);

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .init();
        } else {
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

/// Initializes logging from `FUNC_LOG_LEVEL` and `FUNC_LOG_JSON`
pub fn init_from_env() {
    let level = parse_level(&env::var("FUNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

    let use_json = env::var("FUNC_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    init_logging(LoggingConfig {
        level,
        use_json,
        ..Default::default()
    });
}
