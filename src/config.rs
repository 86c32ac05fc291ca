//! Configuration management for funcbox
//!
//! Client settings are loaded from environment variables with sensible
//! defaults. Everything here can also be overridden per call or via CLI
//! flags; the environment only supplies the fallbacks.
//!
//! # Environment Variables
//!
//! - `FUNC_REGISTRY`: Registry used to derive image names - default: unset
//! - `FUNC_REPOSITORIES_PATH`: Directory holding extra template repositories -
//!   default: `<config home>/func/repositories`
//! - `FUNC_REPOSITORY`: A single template repository URI replacing all others -
//!   default: unset
//! - `FUNC_BUILDER`: Builder used when a function names none (host|pack|s2i) -
//!   default: "pack"
//! - `FUNC_NAMESPACE`: Namespace for deploy, describe, list and remove - default: unset
//! - `FUNC_VERBOSE`: Verbose output (true|false) - default: "false"
//! - `FUNC_START_TIMEOUT`: Seconds to wait for a locally run function - default: "60"
//! - `FUNC_LOG_LEVEL`: Logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use funcbox::{Client, ClientConfig};
//!
//! let config = ClientConfig::default();
//! config.validate().expect("Invalid configuration");
//! let client = Client::builder().from_config(&config).build();
//! ```

use std::env;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Default values for configuration
const DEFAULT_BUILDER: &str = "pack";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_START_TIMEOUT_SECS: u64 = 60;

/// Builders the client knows default images for
pub const BUILDERS: &[&str] = &["host", "pack", "s2i"];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Builder not one of host, pack or s2i
    #[error("Invalid builder: {0}. Valid options: host, pack, s2i")]
    InvalidBuilder(String),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Client configuration
///
/// `Default::default()` loads from environment variables with fallback
/// defaults.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Registry used to derive image names
    pub registry: String,

    /// Directory holding extensible template repositories
    pub repositories_path: Option<PathBuf>,

    /// Single template repository URI
    pub repository_uri: Option<String>,

    /// Builder used when the function does not name one
    pub builder: String,

    /// Namespace for cluster operations
    pub namespace: Option<String>,

    pub verbose: bool,

    /// Seconds to wait for a locally run function to become ready
    pub start_timeout: u64,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

/// `<config home>/func/repositories`
pub fn default_repositories_path() -> Option<PathBuf> {
    non_empty("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("func").join("repositories"))
}

impl Default for ClientConfig {
    fn default() -> Self {
        let registry = non_empty("FUNC_REGISTRY").unwrap_or_default();

        let repositories_path = non_empty("FUNC_REPOSITORIES_PATH")
            .map(PathBuf::from)
            .or_else(default_repositories_path);

        let repository_uri = non_empty("FUNC_REPOSITORY");

        let builder = non_empty("FUNC_BUILDER")
            .unwrap_or_else(|| DEFAULT_BUILDER.to_string())
            .to_lowercase();

        let namespace = non_empty("FUNC_NAMESPACE");

        let verbose = env::var("FUNC_VERBOSE")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        let start_timeout = env::var("FUNC_START_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_START_TIMEOUT_SECS);

        let log_level = env::var("FUNC_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            registry,
            repositories_path,
            repository_uri,
            builder,
            namespace,
            verbose,
            start_timeout,
            log_level,
        }
    }
}

impl ClientConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unknown builder, a zero start timeout,
    /// a registry with more than three path segments, or an unknown log
    /// level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !BUILDERS.contains(&self.builder.as_str()) {
            return Err(ConfigError::InvalidBuilder(self.builder.clone()));
        }

        if self.start_timeout == 0 {
            return Err(ConfigError::ValidationFailed(
                "Start timeout must be at least 1 second".to_string(),
            ));
        }

        let segments = self
            .registry
            .trim_end_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .count();
        if segments > 3 {
            return Err(ConfigError::ValidationFailed(format!(
                "Registry '{}' has more than three path segments",
                self.registry
            )));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    /// Converts configuration to a display map for output formatting
    pub fn to_display_map(&self) -> std::collections::BTreeMap<String, String> {
        let mut map = std::collections::BTreeMap::new();

        map.insert("registry".to_string(), self.registry.clone());
        if let Some(ref path) = self.repositories_path {
            map.insert("repositories_path".to_string(), path.display().to_string());
        }
        if let Some(ref uri) = self.repository_uri {
            map.insert("repository".to_string(), uri.clone());
        }
        map.insert("builder".to_string(), self.builder.clone());
        if let Some(ref ns) = self.namespace {
            map.insert("namespace".to_string(), ns.clone());
        }
        map.insert("verbose".to_string(), self.verbose.to_string());
        map.insert(
            "start_timeout".to_string(),
            self.start_timeout.to_string(),
        );
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

impl fmt::Display for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Funcbox Configuration:")?;
        writeln!(f, "  Registry: {}", self.registry)?;
        if let Some(ref path) = self.repositories_path {
            writeln!(f, "  Repositories Path: {}", path.display())?;
        }
        if let Some(ref uri) = self.repository_uri {
            writeln!(f, "  Repository: {}", uri)?;
        }
        writeln!(f, "  Builder: {}", self.builder)?;
        if let Some(ref ns) = self.namespace {
            writeln!(f, "  Namespace: {}", ns)?;
        }
        writeln!(f, "  Start Timeout: {}s", self.start_timeout)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = vec![
            EnvGuard::unset("FUNC_REGISTRY"),
            EnvGuard::unset("FUNC_BUILDER"),
            EnvGuard::unset("FUNC_REPOSITORY"),
            EnvGuard::unset("FUNC_START_TIMEOUT"),
            EnvGuard::set("FUNC_LOG_LEVEL", DEFAULT_LOG_LEVEL),
        ];

        let config = ClientConfig::default();

        assert_eq!(config.registry, "");
        assert_eq!(config.builder, DEFAULT_BUILDER);
        assert!(config.repository_uri.is_none());
        assert_eq!(config.start_timeout, DEFAULT_START_TIMEOUT_SECS);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _guards = vec![
            EnvGuard::set("FUNC_REGISTRY", "quay.io/alice"),
            EnvGuard::set("FUNC_BUILDER", "S2I"),
            EnvGuard::set("FUNC_NAMESPACE", "prod"),
            EnvGuard::set("FUNC_REPOSITORIES_PATH", "/srv/repos"),
            EnvGuard::set("FUNC_START_TIMEOUT", "15"),
            EnvGuard::set("FUNC_VERBOSE", "true"),
            EnvGuard::set("FUNC_LOG_LEVEL", "DEBUG"),
        ];

        let config = ClientConfig::default();

        assert_eq!(config.registry, "quay.io/alice");
        assert_eq!(config.builder, "s2i");
        assert_eq!(config.namespace.as_deref(), Some("prod"));
        assert_eq!(config.repositories_path, Some(PathBuf::from("/srv/repos")));
        assert_eq!(config.start_timeout, 15);
        assert!(config.verbose);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_repositories_path_honours_xdg() {
        let _guards = vec![
            EnvGuard::unset("FUNC_REPOSITORIES_PATH"),
            EnvGuard::set("XDG_CONFIG_HOME", "/home/alice/.config"),
        ];
        let config = ClientConfig::default();
        assert_eq!(
            config.repositories_path,
            Some(PathBuf::from("/home/alice/.config/func/repositories"))
        );
    }

    #[test]
    #[serial]
    fn test_validation_rejects_unknown_builder() {
        let config = ClientConfig {
            builder: "docker".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBuilder(_))
        ));
    }

    #[test]
    #[serial]
    fn test_validation_rejects_zero_timeout() {
        let config = ClientConfig {
            start_timeout: 0,
            builder: "pack".to_string(),
            log_level: "info".to_string(),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_validation_rejects_deep_registry() {
        let config = ClientConfig {
            registry: "example.com/a/b/c".to_string(),
            builder: "pack".to_string(),
            start_timeout: 1,
            log_level: "info".to_string(),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_config_display() {
        let config = ClientConfig::default();
        let display = format!("{}", config);
        assert!(display.contains("Funcbox Configuration:"));
        assert!(display.contains("Builder:"));
    }
}
