use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::RelayConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "mediarelay.toml",
    "mediarelay.yaml",
    "mediarelay.yml",
    "mediarelay.json",
];

/// Load the config from an explicit path, or discover it when `None`, then
/// apply environment overrides.
pub fn load(explicit: Option<&Path>) -> Result<RelayConfig> {
    let mut config = match explicit {
        Some(path) => load_config(path)?,
        None => discover_and_load()?,
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<RelayConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    let config = parse_config(&raw, path)?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./mediarelay.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/mediarelay/mediarelay.{toml,yaml,yml,json}` (user-global)
///
/// Returns `RelayConfig::default()` if no config file is found, so a
/// deployment can be configured through the environment alone. A file that
/// exists but does not parse is an error.
pub fn discover_and_load() -> Result<RelayConfig> {
    match find_config_file() {
        Some(path) => load_config(&path),
        None => {
            debug!("no config file found, using defaults");
            Ok(RelayConfig::default())
        },
    }
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/mediarelay/
    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/mediarelay/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "mediarelay").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<RelayConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let what = || format!("failed to parse {}", path.display());

    match ext {
        "toml" => toml::from_str(raw).with_context(what),
        "yaml" | "yml" => serde_yaml::from_str(raw).with_context(what),
        "json" => serde_json::from_str(raw).with_context(what),
        _ => Err(Error::UnsupportedFormat {
            ext: ext.to_string(),
        }),
    }
}

/// Overlay `MEDIARELAY_*` environment variables onto a loaded config.
pub fn apply_env_overrides(config: &mut RelayConfig) -> Result<()> {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    config: &mut RelayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = get("MEDIARELAY_BOT_TOKEN") {
        config.telegram.token = secrecy::Secret::new(token);
    }
    if let Some(raw) = get("MEDIARELAY_SOURCE_CHANNEL") {
        let id = raw
            .parse()
            .map_err(|e| Error::invalid_value("MEDIARELAY_SOURCE_CHANNEL", e))?;
        config.relay.source_channel = Some(id);
    }
    if let Some(raw) = get("MEDIARELAY_DEST_CHANNEL") {
        let id = raw
            .parse()
            .map_err(|e| Error::invalid_value("MEDIARELAY_DEST_CHANNEL", e))?;
        config.relay.destination_channel = Some(id);
    }
    if let Some(prefix) = get("MEDIARELAY_PREFIX") {
        config.relay.prefix = prefix;
    }
    if let Some(url) = get("MEDIARELAY_THUMBNAIL_URL") {
        config.thumbnail.url = Some(url);
    }
    if let Some(raw) = get("MEDIARELAY_LOG_CHANNEL") {
        let id = raw
            .parse()
            .map_err(|e| Error::invalid_value("MEDIARELAY_LOG_CHANNEL", e))?;
        config.notify.log_channel = Some(id);
    }
    Ok(())
}
