//! Structured logging utilities for the xrsplice layer.
//!
//! Provides consistent logging with component prefixes and structured fields.
//!
//! # Usage
//!
//! ```ignore
//! use xrsplice_config::*;
//!
//! log_chain_info!("Instance created", instance = 0x1234u64);
//! log_dispatch_debug!("Forwarding lookup", name = "xrPollEvent");
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Once;

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const NEGOTIATE: &'static str = "NEGOTIATE";
    pub const CHAIN: &'static str = "CHAIN";
    pub const RESOLVE: &'static str = "RESOLVE";
    pub const DISPATCH: &'static str = "DISPATCH";
    pub const INTERCEPT: &'static str = "INTERCEPT";
    pub const REGISTRY: &'static str = "REGISTRY";
    pub const CONFIG: &'static str = "CONFIG";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("error") {
            Ok(LogLevel::Error)
        } else if s.eq_ignore_ascii_case("warn") {
            Ok(LogLevel::Warn)
        } else if s.eq_ignore_ascii_case("info") {
            Ok(LogLevel::Info)
        } else if s.eq_ignore_ascii_case("debug") {
            Ok(LogLevel::Debug)
        } else if s.eq_ignore_ascii_case("trace") {
            Ok(LogLevel::Trace)
        } else {
            Err(())
        }
    }
}

// === NEGOTIATE logging macros ===

#[macro_export]
macro_rules! log_negotiate_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = $crate::logging::Component::NEGOTIATE, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_negotiate_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = $crate::logging::Component::NEGOTIATE, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_negotiate_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = $crate::logging::Component::NEGOTIATE, $($key = $value,)* $msg)
    };
}

// === CHAIN logging macros ===

#[macro_export]
macro_rules! log_chain_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = $crate::logging::Component::CHAIN, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_chain_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = $crate::logging::Component::CHAIN, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_chain_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = $crate::logging::Component::CHAIN, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_chain_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = $crate::logging::Component::CHAIN, $($key = $value,)* $msg)
    };
}

// === RESOLVE logging macros ===

#[macro_export]
macro_rules! log_resolve_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = $crate::logging::Component::RESOLVE, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_resolve_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = $crate::logging::Component::RESOLVE, $($key = $value,)* $msg)
    };
}

// === DISPATCH logging macros ===

#[macro_export]
macro_rules! log_dispatch_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = $crate::logging::Component::DISPATCH, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_dispatch_trace {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::trace!(component = $crate::logging::Component::DISPATCH, $($key = $value,)* $msg)
    };
}

// === INTERCEPT logging macros ===

#[macro_export]
macro_rules! log_intercept_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = $crate::logging::Component::INTERCEPT, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_intercept_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = $crate::logging::Component::INTERCEPT, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_intercept_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = $crate::logging::Component::INTERCEPT, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_intercept_trace {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::trace!(component = $crate::logging::Component::INTERCEPT, $($key = $value,)* $msg)
    };
}

// === REGISTRY logging macros ===

#[macro_export]
macro_rules! log_registry_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = $crate::logging::Component::REGISTRY, $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_registry_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = $crate::logging::Component::REGISTRY, $($key = $value,)* $msg)
    };
}

static LOGGING_INIT: Once = Once::new();

/// Initialize logging with the given level filter.
///
/// `XRSPLICE_LOG` (an `EnvFilter` directive) wins over `level`. Only the
/// first call does anything, and a subscriber already installed by the host
/// application is left in place.
pub fn init_logging(level: LogLevel, ansi: bool) {
    use tracing_subscriber::EnvFilter;

    LOGGING_INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_env("XRSPLICE_LOG")
            .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(ansi)
            .with_target(false)
            .try_init();
    });
}
