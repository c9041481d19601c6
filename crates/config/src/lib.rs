//! Configuration loading, validation, env substitution, and env overrides.
//!
//! Config files: `mediarelay.toml`, `mediarelay.yaml`, or `mediarelay.json`
//! Searched in `./` then `~/.config/mediarelay/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in all string
//! values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{ConfigurationError, Error, Result},
    loader::{
        apply_env_overrides, config_dir, discover_and_load, find_config_file, load, load_config,
    },
    schema::{
        MetricsConfig, NotifyConfig, ProgressConfig, RelayConfig, RouteConfig, TelegramConfig,
        ThumbnailConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
