//! # xrsplice-config
//!
//! Configuration management for the xrsplice API layer.
//!
//! Loads configuration from:
//! 1. `<config_dir>/xrsplice/config.toml` (global)
//! 2. The file named by `XRSPLICE_CONFIG` (overrides global)
//! 3. Environment variables (highest priority)

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use tracing::debug;

pub mod logging;
pub mod path;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use logging::{init_logging, Component, LogLevel};

/// Path of an explicit config file, layered over the global one.
pub const ENV_CONFIG_PATH: &str = "XRSPLICE_CONFIG";
/// Overrides `logging.level`.
pub const ENV_LOG_LEVEL: &str = "XRSPLICE_LOG_LEVEL";
/// Overrides `sessions.mode`.
pub const ENV_SESSION_MODE: &str = "XRSPLICE_SESSION_MODE";
/// Comma separated interceptor names, appended to `intercept.disabled`.
pub const ENV_DISABLE_INTERCEPTS: &str = "XRSPLICE_DISABLE_INTERCEPTS";

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| {
    RwLock::new(Config::load().unwrap_or_else(|e| {
        tracing::warn!(component = Component::CONFIG, error = %e, "Falling back to default config");
        Config::default()
    }))
});

/// Get global config (read-only)
pub fn config() -> RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap_or_else(PoisonError::into_inner)
}

/// Reload config from disk and environment
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub sessions: SessionConfig,
    pub intercept: InterceptConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // 1. Global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                config = Self::load_from(&global_path)?;
            }
        }

        // 2. Explicit config file - overrides global
        if let Some(explicit) = Self::explicit_config_path() {
            debug!("Loading config from {:?}", explicit);
            let overrides = Self::load_from(&explicit)?;
            config.merge(overrides);
        }

        // 3. Environment variable overrides
        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Parse a single TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Global config path: `<config_dir>/xrsplice/config.toml`
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("xrsplice").join("config.toml"))
    }

    /// Path named by `XRSPLICE_CONFIG`, if set and non-empty.
    pub fn explicit_config_path() -> Option<PathBuf> {
        std::env::var_os(ENV_CONFIG_PATH)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    /// Merge another config over this one. Values left at their default in
    /// `other` do not override.
    pub fn merge(&mut self, other: Config) {
        let defaults = Config::default();
        if other.logging.level != defaults.logging.level {
            self.logging.level = other.logging.level;
        }
        if other.logging.ansi != defaults.logging.ansi {
            self.logging.ansi = other.logging.ansi;
        }
        if other.sessions.mode != defaults.sessions.mode {
            self.sessions.mode = other.sessions.mode;
        }
        if !other.intercept.disabled.is_empty() {
            self.intercept.disabled = other.intercept.disabled;
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (the process environment
    /// in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level.parse().map_err(|_| ConfigError::Invalid {
                key: ENV_LOG_LEVEL,
                value: level.clone(),
            })?;
        }
        if let Some(mode) = lookup(ENV_SESSION_MODE) {
            self.sessions.mode = mode.parse().map_err(|_| ConfigError::Invalid {
                key: ENV_SESSION_MODE,
                value: mode.clone(),
            })?;
        }
        if let Some(names) = lookup(ENV_DISABLE_INTERCEPTS) {
            for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                if !self.intercept.disabled.iter().any(|d| d == name) {
                    self.intercept.disabled.push(name.to_string());
                }
            }
        }
        Ok(())
    }

    /// Whether a pass-through interceptor has been switched off.
    pub fn is_intercept_disabled(&self, name: &str) -> bool {
        self.intercept.disabled.iter().any(|d| d == name)
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String, ConfigError> {
        Config::default().to_toml()
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level when `XRSPLICE_LOG` is not set
    pub level: LogLevel,
    /// Colored output (off by default, stderr usually belongs to the host app)
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            ansi: false,
        }
    }
}

/// How per-instance state is tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// One registry entry per `XrInstance`
    #[default]
    Multi,
    /// A single shared context; a new instance replaces the previous one
    Single,
}

impl std::str::FromStr for SessionMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "multi" => Ok(Self::Multi),
            "single" => Ok(Self::Single),
            _ => Err(()),
        }
    }
}

/// Session tracking configuration
///
/// The layer reads `mode` once, when its session registry is first used;
/// [`reload`] does not switch an existing registry between modes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: SessionMode,
}

/// Interceptor configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptConfig {
    /// Pass-through interceptors routed straight to the next layer
    pub disabled: Vec<String>,
}
