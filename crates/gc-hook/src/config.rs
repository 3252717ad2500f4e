//! Configuration Module - Hook Tuning Parameters
//!
//! Manages the configuration for the finalizer thread, handle tables and
//! the event logger. Every field has a sensible default.

use crate::logging::LoggerConfig;
use serde::{Deserialize, Serialize};

/// Main configuration for gc-hook
///
/// # Examples
///
/// ```rust
/// use gc_hook::HookConfig;
///
/// // Use default configuration
/// let config = HookConfig::default();
///
/// // Faster finalization with a small handle space
/// let config = HookConfig {
///     finalizer_interval_ms: 10,
///     handle_limit: 1024,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Delay between two collection turns of the background finalizer
    ///
    /// Every turn sweeps the registry for unreachable targets and runs the
    /// callbacks that became due.
    ///
    /// Default: 100ms
    pub finalizer_interval_ms: u64,

    /// Size of the handle id space
    ///
    /// Handles are issued from `[0, handle_limit)`. Once every id is in use
    /// `alloc` fails with `ResourceExhausted`.
    ///
    /// Default: u32::MAX
    pub handle_limit: u32,

    /// Force debug diagnostics on every registration
    ///
    /// Default: false
    pub debug: bool,

    /// Event logger settings
    pub logger: LoggerConfig,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            finalizer_interval_ms: DEFAULT_FINALIZER_INTERVAL_MS,
            handle_limit: u32::MAX,
            debug: false,
            logger: LoggerConfig::default(),
        }
    }
}

impl HookConfig {
    /// Validate configuration
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gc_hook::HookConfig;
    ///
    /// let config = HookConfig {
    ///     handle_limit: 0,  // Invalid!
    ///     ..Default::default()
    /// };
    ///
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.finalizer_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval(
                "finalizer_interval_ms must be > 0".to_string(),
            ));
        }

        if self.finalizer_interval_ms > MAX_FINALIZER_INTERVAL_MS {
            return Err(ConfigError::InvalidInterval(format!(
                "finalizer_interval_ms must be <= {}",
                MAX_FINALIZER_INTERVAL_MS
            )));
        }

        if self.handle_limit == 0 {
            return Err(ConfigError::InvalidHandleLimit(
                "handle_limit must be > 0".to_string(),
            ));
        }

        if self.logger.history == 0 {
            return Err(ConfigError::InvalidHistory(
                "logger.history must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - GC_HOOK_INTERVAL_MS
    /// - GC_HOOK_HANDLE_LIMIT
    /// - GC_HOOK_DEBUG
    ///
    /// ```bash
    /// export GC_HOOK_INTERVAL_MS=20
    /// export GC_HOOK_DEBUG=1
    /// ```
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from a variable lookup, as `from_env` does
    ///
    /// Unparsable values are ignored and leave the default in place.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("GC_HOOK_INTERVAL_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                config.finalizer_interval_ms = ms;
            }
        }

        if let Some(val) = lookup("GC_HOOK_HANDLE_LIMIT") {
            if let Ok(limit) = val.parse::<u32>() {
                config.handle_limit = limit;
            }
        }

        if let Some(val) = lookup("GC_HOOK_DEBUG") {
            config.debug = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }

    /// Finalizer interval as a `Duration`
    pub fn finalizer_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.finalizer_interval_ms)
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid finalizer interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid handle limit: {0}")]
    InvalidHandleLimit(String),

    #[error("Invalid logger history: {0}")]
    InvalidHistory(String),
}

const DEFAULT_FINALIZER_INTERVAL_MS: u64 = 100;
const MAX_FINALIZER_INTERVAL_MS: u64 = 60 * 60 * 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HookConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.debug);
        assert_eq!(config.finalizer_interval_ms, 100);
        assert_eq!(config.handle_limit, u32::MAX);
    }

    #[test]
    fn test_from_vars_parses_overrides() {
        let vars: std::collections::HashMap<&str, &str> = [
            ("GC_HOOK_INTERVAL_MS", "20"),
            ("GC_HOOK_HANDLE_LIMIT", "512"),
            ("GC_HOOK_DEBUG", "TRUE"),
        ]
        .into_iter()
        .collect();

        let config = HookConfig::from_vars(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.finalizer_interval_ms, 20);
        assert_eq!(config.handle_limit, 512);
        assert!(config.debug);
    }

    #[test]
    fn test_from_vars_ignores_garbage() {
        let config = HookConfig::from_vars(|key| match key {
            "GC_HOOK_INTERVAL_MS" => Some("soon".to_string()),
            "GC_HOOK_HANDLE_LIMIT" => Some("-1".to_string()),
            "GC_HOOK_DEBUG" => Some("yes".to_string()),
            _ => None,
        });
        assert_eq!(config.finalizer_interval_ms, 100);
        assert_eq!(config.handle_limit, u32::MAX);
        assert!(!config.debug);
    }

    #[test]
    fn test_invalid_interval() {
        let config = HookConfig {
            finalizer_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidInterval(_))
        ));

        let config = HookConfig {
            finalizer_interval_ms: MAX_FINALIZER_INTERVAL_MS + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_handle_limit() {
        let config = HookConfig {
            handle_limit: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidHandleLimit(_))
        ));
    }

    #[test]
    fn test_invalid_history() {
        let mut config = HookConfig::default();
        config.logger.history = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidHistory(_))
        ));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: HookConfig =
            serde_json::from_str(r#"{ "handle_limit": 16, "debug": true }"#).unwrap();
        assert_eq!(config.handle_limit, 16);
        assert!(config.debug);
        assert_eq!(config.finalizer_interval_ms, 100);
    }
}
