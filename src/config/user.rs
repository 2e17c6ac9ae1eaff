//! User configuration loading for tandem.
//!
//! User config location: $XDG_CONFIG_HOME/tandem/tandem.toml
//! Fallback: the platform config directory (`dirs::config_dir()`).

use std::path::PathBuf;

use thiserror::Error;

use super::settings::TandemSettings;

pub const CONFIG_FILE_NAME: &str = "tandem.toml";

#[derive(Debug, Error)]
pub enum UserConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub type UserConfigResult<T> = Result<T, UserConfigError>;

/// Returns the path to the user configuration file.
///
/// 1. If $XDG_CONFIG_HOME is set: $XDG_CONFIG_HOME/tandem/tandem.toml
/// 2. Otherwise: `<config dir>/tandem/tandem.toml`
///
/// Returns None if no config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    if let Some(xdg_config) = std::env::var("XDG_CONFIG_HOME").ok().filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg_config).join("tandem").join(CONFIG_FILE_NAME));
    }

    dirs::config_dir().map(|dir| dir.join("tandem").join(CONFIG_FILE_NAME))
}

/// Load the user config. `Ok(None)` when no file exists.
pub fn load_user_config() -> UserConfigResult<Option<TandemSettings>> {
    let Some(path) = user_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path).map_err(|source| UserConfigError::Read {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&contents)
        .map(Some)
        .map_err(|source| UserConfigError::Parse { path, source })
}
