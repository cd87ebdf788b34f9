//! Composer configuration.
//!
//! Values are layered lowest to highest: [`ComposeConfig::default`], then a
//! TOML file (with the `config` feature), then `WEFT_*` environment variables.
//!
//! | Key | Env | Default |
//! |-----|-----|---------|
//! | `max_scope_depth` | `WEFT_MAX_SCOPE_DEPTH` | 256 |
//! | `slow_tick_warn_ms` | `WEFT_SLOW_TICK_MS` (`off` disables) | unset |
//! | `trace_ticks` | `WEFT_TRACE_TICKS` | `false` |
//! | `binding_capacity` | none | 64 |

#[cfg(feature = "config")]
use std::path::{Path, PathBuf};
use std::time::Duration;

use weft_reactive::RegistryOptions;
use weft_tree::DEFAULT_MAX_DEPTH;

pub const ENV_MAX_SCOPE_DEPTH: &str = "WEFT_MAX_SCOPE_DEPTH";
pub const ENV_SLOW_TICK_MS: &str = "WEFT_SLOW_TICK_MS";
pub const ENV_TRACE_TICKS: &str = "WEFT_TRACE_TICKS";

/// Invalid or unreadable configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[cfg(feature = "config")]
    #[error("failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[cfg(feature = "config")]
    #[error("failed to parse config: {message}")]
    Parse { message: String },
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("{field} {reason}")]
    Invalid { field: &'static str, reason: &'static str },
}

/// Settings for one [`Composer`](crate::Composer).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default, deny_unknown_fields))]
pub struct ComposeConfig {
    /// Entering a scope beyond this depth fails.
    pub max_scope_depth: usize,
    /// Warn when a single tick takes longer than this many milliseconds.
    pub slow_tick_warn_ms: Option<u64>,
    /// Wrap every tick in a debug span.
    pub trace_ticks: bool,
    /// Initial capacity of the binding registry.
    pub binding_capacity: usize,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            max_scope_depth: DEFAULT_MAX_DEPTH,
            slow_tick_warn_ms: None,
            trace_ticks: false,
            binding_capacity: 64,
        }
    }
}

impl ComposeConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Overlay `WEFT_*` variables from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay `WEFT_*` variables read through `lookup`.
    pub fn apply_env_with(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup(ENV_MAX_SCOPE_DEPTH) {
            self.max_scope_depth = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_MAX_SCOPE_DEPTH,
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup(ENV_SLOW_TICK_MS) {
            self.slow_tick_warn_ms = match raw.trim() {
                "" | "off" | "none" => None,
                v => Some(v.parse().map_err(|_| ConfigError::InvalidEnv {
                    key: ENV_SLOW_TICK_MS,
                    value: raw.clone(),
                })?),
            };
        }
        if let Some(raw) = lookup(ENV_TRACE_TICKS) {
            self.trace_ticks = match raw.trim() {
                "1" | "true" | "TRUE" | "yes" | "on" => true,
                "0" | "false" | "FALSE" | "no" | "off" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: ENV_TRACE_TICKS,
                        value: raw.clone(),
                    });
                }
            };
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_scope_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "max_scope_depth",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Parse a TOML document. Missing keys take their defaults.
    #[cfg(feature = "config")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file, then overlay the environment.
    #[cfg(feature = "config")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = Self::from_toml_str(&text)?.apply_env()?;
        tracing::debug!(path = %path.display(), ?config, "loaded compose config");
        Ok(config)
    }

    #[must_use]
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            capacity: self.binding_capacity,
            slow_tick_warn: self.slow_tick_warn_ms.map(Duration::from_millis),
            trace_ticks: self.trace_ticks,
        }
    }
}
